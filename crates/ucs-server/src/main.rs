mod observability;
mod subservices;

use std::path::PathBuf;
use std::process::ExitCode;

use ucs_core::models::SupervisorSettings;
use ucs_core::services::shutdown;
use ucs_core::services::supervisor::Supervisor;

const USAGE: &str = "\
Usage: unified-casino-server [--log-file <path>]

Launches the slots, casino and arcade backends on PORT, PORT+34 and PORT+43.

Environment:
  PORT                     base port (default 10000)
  HOST                     public hostname (default argentaplay.com)
  SOCKET_CONFIG_PATH       shared config file (default ./socket_config.json)
  STARTUP_POLICY           all-or-nothing | best-effort
  SETTLE_DELAY_MS          settle delay for unsignaled entry points (default 1000)
  READINESS_TIMEOUT_SECS   readiness wait bound (default 30)
  SLOTS_COMMAND, SERVER_COMMAND, ARCADE_COMMAND
                           backend command lines (default node <Game>.js)
  SUBSERVICE_DIR           backend working directory (default .)
  RUST_LOG, UCS_LOG_FORMAT logging filter and format (json)";

#[tokio::main(flavor = "current_thread")]
async fn main() -> color_eyre::Result<ExitCode> {
    color_eyre::install()?;

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{USAGE}");
        return Ok(ExitCode::SUCCESS);
    }
    let log_file = args
        .iter()
        .position(|a| a == "--log-file")
        .and_then(|i| args.get(i + 1))
        .map(PathBuf::from);

    let _guard = observability::init(log_file.as_deref());

    tracing::info!("Starting Unified Casino WebSocket Server...");
    let settings = SupervisorSettings::from_env()?;
    tracing::info!(
        base_port = settings.base_port,
        policy = %settings.policy,
        config_path = %settings.config_path.display(),
        "supervisor settings"
    );

    let supervisor = Supervisor::new(settings, subservices::from_env()?);
    let exit = supervisor.run(shutdown::wait_for_termination()).await;

    Ok(ExitCode::from(exit.code()))
}
