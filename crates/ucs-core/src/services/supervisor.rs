use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;

use crate::error::{Result, SupervisorError};
use crate::models::{
    RuntimeConfig, StartupOutcome, StartupReport, SupervisorSettings, SupervisorState,
};

use super::launcher::{ServiceLauncher, Subservice};
use super::ports::PortAllocator;
use super::provisioner;
use super::redirector::{self, ConfigRedirector};
use super::shutdown::TerminationSignal;

/// How a supervisor run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorExit {
    /// A termination request arrived; exit cleanly.
    Shutdown(TerminationSignal),
    StartupFailed,
}

impl SupervisorExit {
    /// Process exit status for this ending.
    pub fn code(self) -> u8 {
        match self {
            Self::Shutdown(_) => 0,
            Self::StartupFailed => 1,
        }
    }
}

/// Owns the lifecycle of the subservices: provisions the shared config,
/// launches every subservice concurrently, and judges the startup.
#[derive(Debug)]
pub struct Supervisor {
    settings: SupervisorSettings,
    subservices: Vec<Subservice>,
    state: SupervisorState,
    config: Option<Arc<RuntimeConfig>>,
}

impl Supervisor {
    pub fn new(settings: SupervisorSettings, subservices: Vec<Subservice>) -> Self {
        Self {
            settings,
            subservices,
            state: SupervisorState::Idle,
            config: None,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// The provisioned config, once provisioning has succeeded.
    pub fn runtime_config(&self) -> Option<&RuntimeConfig> {
        self.config.as_deref()
    }

    /// Provision, launch, and judge. Only provisioning problems are errors;
    /// a failed launch is reported through the returned report's state.
    pub async fn start(&mut self) -> Result<StartupReport> {
        if self.state != SupervisorState::Idle {
            return Err(SupervisorError::Config(format!(
                "supervisor already started (state {:?})",
                self.state
            )));
        }

        self.state = SupervisorState::Provisioning;
        let (config, redirector) = match self.provision() {
            Ok(provisioned) => provisioned,
            Err(e) => {
                self.state = SupervisorState::Failed;
                return Err(e);
            }
        };
        self.config = Some(Arc::clone(&config));

        self.state = SupervisorState::Launching;
        let ports = PortAllocator::new(self.settings.base_port);
        let descriptors: Vec<_> = self.subservices.iter().map(|s| s.descriptor).collect();
        for allocation in ports.allocate(&descriptors) {
            tracing::debug!(
                service = %allocation.name,
                env_var = %allocation.env_var,
                port = allocation.port,
                "allocated port"
            );
        }
        let launcher = ServiceLauncher::new(self.settings.settle_delay, self.settings.readiness_timeout)
            .publishing_env(self.settings.process_hooks);
        let outcomes: Vec<StartupOutcome> = join_all(
            self.subservices
                .iter()
                .map(|s| launcher.launch(s, &ports, &config, &redirector)),
        )
        .await;

        let report = self.judge(&config, outcomes);
        self.state = report.state;
        Ok(report)
    }

    /// Start, then wait for `shutdown`. A termination request during startup
    /// ends the run as well; nothing is drained either way.
    pub async fn run<F>(mut self, shutdown: F) -> SupervisorExit
    where
        F: Future<Output = TerminationSignal>,
    {
        tokio::pin!(shutdown);

        let started = tokio::select! {
            result = self.start() => result,
            signal = &mut shutdown => return shutting_down(signal),
        };

        match started.and_then(|report| ensure_running(&report)) {
            Ok(()) => shutting_down(shutdown.await),
            Err(e) => {
                tracing::error!(error = %e, "Failed to start servers");
                SupervisorExit::StartupFailed
            }
        }
    }

    fn provision(&self) -> Result<(Arc<RuntimeConfig>, ConfigRedirector)> {
        // Children run in their own working directories, so hand them an absolute path.
        let path = std::path::absolute(&self.settings.config_path).map_err(|e| {
            SupervisorError::Provisioning(format!(
                "failed to resolve {}: {e}",
                self.settings.config_path.display()
            ))
        })?;
        let defaults = RuntimeConfig::defaults(&self.settings.host);
        let config = provisioner::ensure(&path, &defaults)?;
        tracing::info!(
            path = %path.display(),
            port = %config.port,
            host = %config.host,
            host_ws = %config.host_ws,
            ssl = config.ssl,
            "Configuration loaded"
        );

        let redirector = if self.settings.process_hooks {
            redirector::install(path)?.clone()
        } else {
            ConfigRedirector::new(path)
        };
        Ok((Arc::new(config), redirector))
    }

    fn judge(&self, config: &RuntimeConfig, outcomes: Vec<StartupOutcome>) -> StartupReport {
        let succeeded = outcomes.iter().filter(|o| o.succeeded).count();
        let accepted = self.settings.policy.accepts(succeeded, outcomes.len());

        let endpoints: Vec<String> = outcomes
            .iter()
            .filter(|o| o.succeeded)
            .map(|o| config.websocket_url(o.port, &o.route))
            .collect();

        for outcome in outcomes.iter().filter(|o| !o.succeeded) {
            let error = outcome.error.as_deref().unwrap_or("unknown error");
            if accepted {
                tracing::warn!(service = %outcome.name, port = outcome.port, error, "subservice is down, continuing ({})", self.settings.policy);
            } else {
                tracing::error!(service = %outcome.name, port = outcome.port, error, "subservice failed to start");
            }
        }

        let state = if accepted {
            if succeeded == outcomes.len() {
                tracing::info!("All servers started successfully!");
            } else {
                tracing::info!(succeeded, total = outcomes.len(), "Servers started with failures");
            }
            for (outcome, endpoint) in outcomes.iter().filter(|o| o.succeeded).zip(&endpoints) {
                tracing::info!(service = %outcome.name, "{}: {endpoint}", outcome.name);
            }
            SupervisorState::Running
        } else {
            SupervisorState::Failed
        };

        StartupReport {
            state,
            outcomes,
            endpoints,
        }
    }
}

fn ensure_running(report: &StartupReport) -> Result<()> {
    if report.is_running() {
        Ok(())
    } else {
        Err(SupervisorError::AggregateFailure(report.failed_services()))
    }
}

fn shutting_down(signal: TerminationSignal) -> SupervisorExit {
    tracing::info!(%signal, "{signal} received, shutting down");
    SupervisorExit::Shutdown(signal)
}
