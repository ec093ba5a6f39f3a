use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{Result, SupervisorError};
use crate::models::RuntimeConfig;

/// Make sure a runtime config exists at `path` and return what is on disk.
///
/// A missing file is created from `defaults` through a temp file in the same
/// directory, persisted without clobbering. An existing file is never
/// rewritten, so operator edits are kept across launches.
pub fn ensure(path: &Path, defaults: &RuntimeConfig) -> Result<RuntimeConfig> {
    if path.exists() {
        tracing::debug!(path = %path.display(), "runtime config already present");
    } else {
        write_defaults(path, defaults)?;
    }
    load(path)
}

/// Read and parse the runtime config at `path`.
pub fn load(path: &Path) -> Result<RuntimeConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        SupervisorError::Provisioning(format!("failed to read {}: {e}", path.display()))
    })?;
    serde_json::from_str(&contents).map_err(|e| {
        SupervisorError::Provisioning(format!("failed to parse {}: {e}", path.display()))
    })
}

fn write_defaults(path: &Path, defaults: &RuntimeConfig) -> Result<()> {
    let dir = parent_dir(path);
    std::fs::create_dir_all(&dir).map_err(|e| {
        SupervisorError::Provisioning(format!("failed to create {}: {e}", dir.display()))
    })?;

    let json = serde_json::to_string_pretty(defaults)?;
    let mut staged = NamedTempFile::new_in(&dir).map_err(|e| {
        SupervisorError::Provisioning(format!("failed to stage config in {}: {e}", dir.display()))
    })?;
    staged
        .write_all(json.as_bytes())
        .and_then(|()| staged.as_file().sync_all())
        .map_err(|e| SupervisorError::Provisioning(format!("failed to write staged config: {e}")))?;

    match staged.persist_noclobber(path) {
        Ok(_) => {
            tracing::info!(path = %path.display(), "wrote default runtime config");
            Ok(())
        }
        // Another process created it between the existence check and now.
        Err(e) if e.error.kind() == ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(SupervisorError::Provisioning(format!(
            "failed to write {}: {}",
            path.display(),
            e.error
        ))),
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
