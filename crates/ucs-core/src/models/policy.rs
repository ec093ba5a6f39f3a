use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SupervisorError;

/// How launch outcomes are combined into one startup verdict.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StartupPolicy {
    /// Any failed subservice fails the whole startup.
    #[default]
    AllOrNothing,
    /// Startup succeeds while at least one subservice is up.
    BestEffort,
}

impl StartupPolicy {
    pub fn accepts(self, succeeded: usize, total: usize) -> bool {
        match self {
            Self::AllOrNothing => total > 0 && succeeded == total,
            Self::BestEffort => succeeded > 0,
        }
    }
}

impl FromStr for StartupPolicy {
    type Err = SupervisorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all-or-nothing" => Ok(Self::AllOrNothing),
            "best-effort" => Ok(Self::BestEffort),
            other => Err(SupervisorError::Config(format!(
                "unknown startup policy '{other}' (expected all-or-nothing or best-effort)"
            ))),
        }
    }
}

impl fmt::Display for StartupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllOrNothing => f.write_str("all-or-nothing"),
            Self::BestEffort => f.write_str("best-effort"),
        }
    }
}
