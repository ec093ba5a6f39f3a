use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SupervisorError};

use super::policy::StartupPolicy;
use super::runtime_config::DEFAULT_HOST;

pub const DEFAULT_CONFIG_PATH: &str = "./socket_config.json";
pub const DEFAULT_BASE_PORT: u16 = 10000;
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_READINESS_TIMEOUT: Duration = Duration::from_secs(30);

/// Supervisor settings, resolved from the environment at startup.
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub config_path: PathBuf,
    pub host: String,
    pub base_port: u16,
    pub policy: StartupPolicy,
    pub settle_delay: Duration,
    pub readiness_timeout: Duration,
    /// Install the global read redirect and publish port variables into the
    /// process environment. Off when several supervisors share one process.
    pub process_hooks: bool,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_PATH),
            host: DEFAULT_HOST.to_string(),
            base_port: DEFAULT_BASE_PORT,
            policy: StartupPolicy::default(),
            settle_delay: DEFAULT_SETTLE_DELAY,
            readiness_timeout: DEFAULT_READINESS_TIMEOUT,
            process_hooks: true,
        }
    }
}

impl SupervisorSettings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut settings = Self::default();

        if let Some(path) = get("SOCKET_CONFIG_PATH") {
            settings.config_path = PathBuf::from(path);
        }
        if let Some(host) = get("HOST") {
            settings.host = host;
        }
        if let Some(port) = get("PORT") {
            settings.base_port = parse_number("PORT", &port)?;
        }
        if let Some(policy) = get("STARTUP_POLICY") {
            settings.policy = policy.parse()?;
        }
        if let Some(ms) = get("SETTLE_DELAY_MS") {
            settings.settle_delay = Duration::from_millis(parse_number("SETTLE_DELAY_MS", &ms)?);
        }
        if let Some(secs) = get("READINESS_TIMEOUT_SECS") {
            settings.readiness_timeout =
                Duration::from_secs(parse_number("READINESS_TIMEOUT_SECS", &secs)?);
        }

        Ok(settings)
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| SupervisorError::Config(format!("{key} must be a number, got '{value}'")))
}
