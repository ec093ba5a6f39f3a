use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::Result;
use crate::models::{ReadinessMode, RuntimeConfig, ServiceDescriptor, StartupOutcome};

use super::ports::{self, PortAllocator};
use super::redirector::ConfigRedirector;

/// Everything an entry point gets when it is started.
#[derive(Debug, Clone)]
pub struct LaunchContext {
    pub service: ServiceDescriptor,
    pub port: u16,
    pub config: Arc<RuntimeConfig>,
    pub redirector: ConfigRedirector,
}

impl LaunchContext {
    /// Path of the provisioned shared config.
    pub fn config_path(&self) -> &Path {
        self.redirector.target()
    }
}

/// How an entry point reports that it is accepting connections.
#[derive(Debug)]
pub enum Readiness {
    /// No signal; the launcher waits the settle delay and assumes success.
    Unsignaled,
    Signal(oneshot::Receiver<std::result::Result<(), String>>),
}

impl Readiness {
    pub fn channel() -> (ReadySender, Readiness) {
        let (tx, rx) = oneshot::channel();
        (ReadySender(tx), Readiness::Signal(rx))
    }
}

/// Sending half of a readiness signal.
#[derive(Debug)]
pub struct ReadySender(oneshot::Sender<std::result::Result<(), String>>);

impl ReadySender {
    pub fn ready(self) {
        let _ = self.0.send(Ok(()));
    }

    pub fn failed(self, message: impl Into<String>) {
        let _ = self.0.send(Err(message.into()));
    }
}

/// Start routine of a subservice.
///
/// Called exactly once, synchronously. The subservice reads its port from
/// its environment variable (or the context) and begins listening on its own.
pub trait EntryPoint: Send + Sync {
    fn start(&self, ctx: &LaunchContext) -> Result<Readiness>;
}

impl<F> EntryPoint for F
where
    F: Fn(&LaunchContext) -> Result<Readiness> + Send + Sync,
{
    fn start(&self, ctx: &LaunchContext) -> Result<Readiness> {
        self(ctx)
    }
}

/// A descriptor paired with the entry point that starts it.
pub struct Subservice {
    pub descriptor: ServiceDescriptor,
    entry_point: Box<dyn EntryPoint>,
}

impl Subservice {
    pub fn new(descriptor: ServiceDescriptor, entry_point: impl EntryPoint + 'static) -> Self {
        Self {
            descriptor,
            entry_point: Box::new(entry_point),
        }
    }

    pub fn from_fn<F>(descriptor: ServiceDescriptor, start: F) -> Self
    where
        F: Fn(&LaunchContext) -> Result<Readiness> + Send + Sync + 'static,
    {
        Self::new(descriptor, start)
    }
}

impl std::fmt::Debug for Subservice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subservice")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct ServiceLauncher {
    settle_delay: Duration,
    readiness_timeout: Duration,
    publish_env: bool,
}

impl ServiceLauncher {
    pub fn new(settle_delay: Duration, readiness_timeout: Duration) -> Self {
        Self {
            settle_delay,
            readiness_timeout,
            publish_env: true,
        }
    }

    /// Whether to write each allocated port into the process environment.
    pub fn publishing_env(mut self, publish: bool) -> Self {
        self.publish_env = publish;
        self
    }

    /// Start one subservice and wait until it is judged up or failed.
    ///
    /// Never returns an error: every failure becomes a failed outcome so the
    /// other launches are unaffected.
    pub async fn launch(
        &self,
        subservice: &Subservice,
        allocator: &PortAllocator,
        config: &Arc<RuntimeConfig>,
        redirector: &ConfigRedirector,
    ) -> StartupOutcome {
        let d = subservice.descriptor;
        let port = allocator.port_for(&d);

        let Ok(bind_port) = u16::try_from(port) else {
            return failed(
                &d,
                port,
                ReadinessMode::NotReached,
                format!(
                    "port {port} (base {} + {}) is outside the valid range",
                    allocator.base_port(),
                    d.port_offset
                ),
            );
        };

        if self.publish_env {
            ports::publish(d.env_var, port);
        }
        tracing::info!(service = d.name, port, "Starting {} server on port {port}...", d.name);

        let ctx = LaunchContext {
            service: d,
            port: bind_port,
            config: Arc::clone(config),
            redirector: redirector.clone(),
        };

        let invoked = panic::catch_unwind(AssertUnwindSafe(|| subservice.entry_point.start(&ctx)));
        let readiness = match invoked {
            Ok(Ok(readiness)) => readiness,
            Ok(Err(e)) => return failed(&d, port, ReadinessMode::NotReached, e.to_string()),
            Err(payload) => {
                return failed(
                    &d,
                    port,
                    ReadinessMode::NotReached,
                    format!("entry point panicked: {}", panic_message(payload.as_ref())),
                )
            }
        };

        match readiness {
            Readiness::Unsignaled => {
                tokio::time::sleep(self.settle_delay).await;
                started(&d, port, ReadinessMode::SettleDelay)
            }
            Readiness::Signal(rx) => match tokio::time::timeout(self.readiness_timeout, rx).await {
                Ok(Ok(Ok(()))) => started(&d, port, ReadinessMode::Signaled),
                Ok(Ok(Err(message))) => failed(&d, port, ReadinessMode::Signaled, message),
                Ok(Err(_)) => failed(
                    &d,
                    port,
                    ReadinessMode::Signaled,
                    "readiness signal dropped before the service reported",
                ),
                Err(_) => failed(
                    &d,
                    port,
                    ReadinessMode::Signaled,
                    format!("not ready within {:?}", self.readiness_timeout),
                ),
            },
        }
    }
}

fn started(d: &ServiceDescriptor, port: u32, readiness: ReadinessMode) -> StartupOutcome {
    tracing::info!(service = d.name, port, "{} server started on port {port}", d.name);
    StartupOutcome::success(d.name, port, d.route, readiness)
}

fn failed(
    d: &ServiceDescriptor,
    port: u32,
    readiness: ReadinessMode,
    message: impl Into<String>,
) -> StartupOutcome {
    let message = message.into();
    tracing::error!(service = d.name, port, error = %message, "{} server failed to start", d.name);
    StartupOutcome::failure(d.name, port, d.route, readiness, message)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        *s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
