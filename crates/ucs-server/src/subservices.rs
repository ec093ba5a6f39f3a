use std::path::PathBuf;

use ucs_core::models::{ServiceDescriptor, ARCADE, CASINO, SLOTS};
use ucs_core::services::launcher::Subservice;
use ucs_core::services::process::ProcessEntryPoint;
use ucs_core::Result;

/// Command variable and default command line of each game backend.
const COMMANDS: [(ServiceDescriptor, &str, &str); 3] = [
    (SLOTS, "SLOTS_COMMAND", "node Slots.js"),
    (CASINO, "SERVER_COMMAND", "node Server.js"),
    (ARCADE, "ARCADE_COMMAND", "node Arcade.js"),
];

pub fn from_env() -> Result<Vec<Subservice>> {
    from_lookup(|key| std::env::var(key).ok())
}

/// Build the three process-backed subservices from a variable source.
pub fn from_lookup<F>(lookup: F) -> Result<Vec<Subservice>>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let working_dir = get("SUBSERVICE_DIR").map_or_else(|| PathBuf::from("."), PathBuf::from);

    COMMANDS
        .into_iter()
        .map(|(descriptor, var, default)| {
            let line = get(var).unwrap_or_else(|| default.to_string());
            let entry = ProcessEntryPoint::from_command_line(&line)?.current_dir(&working_dir);
            tracing::debug!(service = descriptor.name, command = %entry.command_line(), "configured subservice");
            Ok(Subservice::new(descriptor, entry))
        })
        .collect()
}
