use serde::{Deserialize, Serialize};

/// Supervisor lifecycle: `Idle -> Provisioning -> Launching -> Running | Failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SupervisorState {
    Idle,
    Provisioning,
    Launching,
    Running,
    Failed,
}

impl SupervisorState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Running | Self::Failed)
    }
}
