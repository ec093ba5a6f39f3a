use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::error::{Result, SupervisorError};

/// File name subservices use for the shared config by convention.
pub const REDIRECTED_FILE_NAME: &str = "socket_config.json";

static INSTALLED: OnceLock<ConfigRedirector> = OnceLock::new();

/// Serves reads of any `socket_config.json` from the provisioned config path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigRedirector {
    target: PathBuf,
}

impl ConfigRedirector {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
        }
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Whether `path` names the conventional config file, whatever its directory.
    pub fn is_redirected(path: &Path) -> bool {
        path.file_name()
            .is_some_and(|name| name == REDIRECTED_FILE_NAME)
    }

    pub fn resolve<'a>(&'a self, requested: &'a Path) -> &'a Path {
        if Self::is_redirected(requested) {
            &self.target
        } else {
            requested
        }
    }

    pub fn read(&self, path: impl AsRef<Path>) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(path.as_ref()))
    }

    pub fn read_to_string(&self, path: impl AsRef<Path>) -> io::Result<String> {
        std::fs::read_to_string(self.resolve(path.as_ref()))
    }
}

/// Install the process-wide redirector.
///
/// Installing again with the same target is a no-op; a different target is
/// rejected because every subservice expects the one shared file.
pub fn install(target: impl Into<PathBuf>) -> Result<&'static ConfigRedirector> {
    let target = target.into();
    let installed = INSTALLED.get_or_init(|| {
        tracing::info!(path = %target.display(), "redirecting {REDIRECTED_FILE_NAME} reads");
        ConfigRedirector::new(target.clone())
    });
    if installed.target == target {
        Ok(installed)
    } else {
        Err(SupervisorError::Redirector(format!(
            "already installed for {}, refusing {}",
            installed.target.display(),
            target.display()
        )))
    }
}

pub fn installed() -> Option<&'static ConfigRedirector> {
    INSTALLED.get()
}

/// Read a file, honoring the process-wide redirect when one is installed.
pub fn read(path: impl AsRef<Path>) -> io::Result<Vec<u8>> {
    match installed() {
        Some(redirector) => redirector.read(path),
        None => std::fs::read(path),
    }
}

pub fn read_to_string(path: impl AsRef<Path>) -> io::Result<String> {
    match installed() {
        Some(redirector) => redirector.read_to_string(path),
        None => std::fs::read_to_string(path),
    }
}
