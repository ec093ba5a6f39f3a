use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::state::SupervisorState;

/// How a launch was judged complete.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ReadinessMode {
    /// The entry point gave no signal; success was assumed after the settle delay.
    SettleDelay,
    /// The entry point reported readiness (or failure) itself.
    Signaled,
    /// The launch failed before any wait began.
    NotReached,
}

/// Result of launching one subservice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StartupOutcome {
    pub name: String,
    pub port: u32,
    pub route: String,
    pub succeeded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub readiness: ReadinessMode,
    pub finished_at: DateTime<Utc>,
}

impl StartupOutcome {
    pub fn success(name: &str, port: u32, route: &str, readiness: ReadinessMode) -> Self {
        Self {
            name: name.to_string(),
            port,
            route: route.to_string(),
            succeeded: true,
            error: None,
            readiness,
            finished_at: Utc::now(),
        }
    }

    pub fn failure(
        name: &str,
        port: u32,
        route: &str,
        readiness: ReadinessMode,
        error: impl Into<String>,
    ) -> Self {
        Self {
            name: name.to_string(),
            port,
            route: route.to_string(),
            succeeded: false,
            error: Some(error.into()),
            readiness,
            finished_at: Utc::now(),
        }
    }
}

/// Everything the supervisor learned during startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartupReport {
    pub state: SupervisorState,
    pub outcomes: Vec<StartupOutcome>,
    /// Public websocket addresses of the subservices that started.
    pub endpoints: Vec<String>,
}

impl StartupReport {
    pub fn is_running(&self) -> bool {
        self.state == SupervisorState::Running
    }

    pub fn failed_services(&self) -> Vec<String> {
        self.outcomes
            .iter()
            .filter(|o| !o.succeeded)
            .map(|o| o.name.clone())
            .collect()
    }

    pub fn outcome(&self, name: &str) -> Option<&StartupOutcome> {
        self.outcomes.iter().find(|o| o.name == name)
    }
}
