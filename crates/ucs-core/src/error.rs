#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("config provisioning failed: {0}")]
    Provisioning(String),

    #[error("subservice '{service}' failed to launch: {message}")]
    Launch { service: String, message: String },

    #[error("startup failed for: {}", .0.join(", "))]
    AggregateFailure(Vec<String>),

    #[error("config redirector: {0}")]
    Redirector(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SupervisorError {
    pub fn launch(service: &str, message: impl Into<String>) -> Self {
        Self::Launch {
            service: service.to_string(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, SupervisorError>;
