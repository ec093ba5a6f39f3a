use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, Command};

use crate::error::{Result, SupervisorError};

use super::launcher::{EntryPoint, LaunchContext, Readiness, ReadySender};
use super::redirector::REDIRECTED_FILE_NAME;

const PROBE_INTERVAL: Duration = Duration::from_millis(100);
const EXIT_GRACE: Duration = Duration::from_millis(250);

/// Runs a subservice as a child process, e.g. `node Slots.js`.
///
/// The child receives its port variable and `SOCKET_CONFIG_PATH`, finds a
/// `socket_config.json` in its working directory that resolves to the shared
/// config, has its output forwarded into the supervisor's log, and is
/// reported ready once its port accepts TCP connections on localhost and it
/// has stayed alive for a short grace period after that.
#[derive(Debug, Clone)]
pub struct ProcessEntryPoint {
    program: String,
    args: Vec<String>,
    working_dir: PathBuf,
    probe_interval: Duration,
    exit_grace: Duration,
}

impl ProcessEntryPoint {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            working_dir: PathBuf::from("."),
            probe_interval: PROBE_INTERVAL,
            exit_grace: EXIT_GRACE,
        }
    }

    /// Split a whitespace-separated command line into program and arguments.
    pub fn from_command_line(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| SupervisorError::Config("empty subservice command".into()))?;
        Ok(Self::new(program, parts.collect()))
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    /// How long the child must survive after its port answers.
    pub fn exit_grace(mut self, grace: Duration) -> Self {
        self.exit_grace = grace;
        self
    }

    pub fn command_line(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl EntryPoint for ProcessEntryPoint {
    fn start(&self, ctx: &LaunchContext) -> Result<Readiness> {
        let name = ctx.service.name;

        ensure_port_free(name, ctx.port)?;
        let config_path = std::path::absolute(ctx.config_path()).map_err(|e| {
            SupervisorError::launch(name, format!("failed to resolve config path: {e}"))
        })?;
        link_shared_config(name, &self.working_dir, &config_path)?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(&self.working_dir)
            .env(ctx.service.env_var, ctx.port.to_string())
            .env("SOCKET_CONFIG_PATH", &config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            SupervisorError::launch(name, format!("failed to spawn '{}': {e}", self.command_line()))
        })?;
        tracing::debug!(service = name, pid = child.id(), command = %self.command_line(), "spawned subservice");

        if let Some(stdout) = child.stdout.take() {
            forward_output(stdout, name, false);
        }
        if let Some(stderr) = child.stderr.take() {
            forward_output(stderr, name, true);
        }

        let (ready, readiness) = Readiness::channel();
        tokio::spawn(monitor(child, name, ctx.port, self.probe_interval, self.exit_grace, ready));
        Ok(readiness)
    }
}

/// A listener that is already there would answer the readiness probe in the
/// child's place.
fn ensure_port_free(service: &'static str, port: u16) -> Result<()> {
    match std::net::TcpListener::bind(("127.0.0.1", port)) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == ErrorKind::AddrInUse => Err(SupervisorError::launch(
            service,
            format!("port {port} is already in use"),
        )),
        // e.g. privileged ports; let the child report its own bind error
        Err(e) => {
            tracing::debug!(service, port, error = %e, "could not pre-check port");
            Ok(())
        }
    }
}

/// Make `<working_dir>/socket_config.json` resolve to `target`.
///
/// A missing entry or a stale symlink is (re)pointed at `target`. A regular
/// file with other contents is left alone and fails the launch.
fn link_shared_config(service: &'static str, working_dir: &Path, target: &Path) -> Result<()> {
    let conventional = std::path::absolute(working_dir.join(REDIRECTED_FILE_NAME)).map_err(|e| {
        SupervisorError::launch(service, format!("failed to resolve working directory: {e}"))
    })?;
    if conventional == target {
        return Ok(());
    }

    match std::fs::symlink_metadata(&conventional) {
        Ok(meta) if meta.file_type().is_symlink() => {
            if std::fs::canonicalize(&conventional).ok() == std::fs::canonicalize(target).ok() {
                return Ok(());
            }
            std::fs::remove_file(&conventional).map_err(|e| {
                SupervisorError::launch(
                    service,
                    format!("failed to replace stale link {}: {e}", conventional.display()),
                )
            })?;
        }
        Ok(_) => {
            if std::fs::canonicalize(&conventional).ok() == std::fs::canonicalize(target).ok() {
                return Ok(());
            }
            return Err(SupervisorError::launch(
                service,
                format!(
                    "{} exists and is not the shared config {}; remove it or point SOCKET_CONFIG_PATH at it",
                    conventional.display(),
                    target.display()
                ),
            ));
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => {
            return Err(SupervisorError::launch(
                service,
                format!("failed to inspect {}: {e}", conventional.display()),
            ))
        }
    }

    symlink_file(target, &conventional).map_err(|e| {
        SupervisorError::launch(
            service,
            format!("failed to link {} to {}: {e}", conventional.display(), target.display()),
        )
    })?;
    tracing::debug!(service, link = %conventional.display(), path = %target.display(), "linked shared config");
    Ok(())
}

#[cfg(unix)]
fn symlink_file(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_file(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::windows::fs::symlink_file(target, link)
}

fn forward_output<R>(stream: R, service: &'static str, is_stderr: bool)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if is_stderr {
                tracing::warn!(service, "{line}");
            } else {
                tracing::info!(service, "{line}");
            }
        }
    });
}

/// Report readiness once the port answers and the child survives the grace
/// period, or failure if the child exits first. Owns the child afterwards, so
/// it lives (and is killed on drop) with this task.
async fn monitor(
    mut child: Child,
    service: &'static str,
    port: u16,
    interval: Duration,
    grace: Duration,
    ready: ReadySender,
) {
    let listening = async {
        wait_for_port(port, interval).await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        status = child.wait() => {
            let message = match status {
                Ok(status) => format!("exited before accepting connections ({status})"),
                Err(e) => format!("failed to wait on child: {e}"),
            };
            ready.failed(message);
            return;
        }
        () = listening => ready.ready(),
    }

    match child.wait().await {
        Ok(status) => tracing::warn!(service, %status, "subservice exited"),
        Err(e) => tracing::error!(service, error = %e, "failed to wait on subservice"),
    }
}

async fn wait_for_port(port: u16, interval: Duration) {
    loop {
        if TcpStream::connect(("127.0.0.1", port)).await.is_ok() {
            return;
        }
        tokio::time::sleep(interval).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::models::{RuntimeConfig, SLOTS};
    use crate::services::redirector::ConfigRedirector;

    fn context(port: u16) -> LaunchContext {
        context_with_config(port, "socket_config.json")
    }

    fn context_with_config(port: u16, config: impl Into<PathBuf>) -> LaunchContext {
        LaunchContext {
            service: SLOTS,
            port,
            config: Arc::new(RuntimeConfig::default()),
            redirector: ConfigRedirector::new(config),
        }
    }

    /// A port nothing is listening on right now.
    fn free_port() -> u16 {
        std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port()
    }

    async fn signal(readiness: Readiness) -> std::result::Result<(), String> {
        match readiness {
            Readiness::Signal(rx) => rx.await.unwrap_or_else(|_| Err("dropped".into())),
            Readiness::Unsignaled => panic!("process entry points always signal"),
        }
    }

    #[test]
    fn command_line_is_split_on_whitespace() {
        let entry = ProcessEntryPoint::from_command_line("  node  --max-old-space-size=512 Slots.js ").unwrap();
        assert_eq!(entry.program, "node");
        assert_eq!(entry.args, vec!["--max-old-space-size=512", "Slots.js"]);
        assert_eq!(entry.command_line(), "node --max-old-space-size=512 Slots.js");
    }

    #[test]
    fn empty_command_line_is_rejected() {
        assert!(matches!(
            ProcessEntryPoint::from_command_line("   "),
            Err(SupervisorError::Config(_))
        ));
    }

    #[tokio::test]
    async fn missing_program_is_a_launch_error() {
        let entry = ProcessEntryPoint::new("ucs-definitely-not-installed", vec![]);
        let result = entry.start(&context(free_port()));
        assert!(matches!(result, Err(SupervisorError::Launch { .. })));
    }

    #[tokio::test]
    async fn occupied_port_fails_before_spawning() {
        let squatter = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = squatter.local_addr().unwrap().port();
        let entry = ProcessEntryPoint::new("ucs-definitely-not-installed", vec![]);

        match entry.start(&context(port)) {
            Err(SupervisorError::Launch { message, .. }) => {
                assert!(message.contains("already in use"), "{message}")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn early_exit_reports_failure() {
        let entry = ProcessEntryPoint::new("sh", vec!["-c".into(), "exit 3".into()]);
        let readiness = entry.start(&context(free_port())).unwrap();

        let error = signal(readiness).await.unwrap_err();
        assert!(error.contains("exited before accepting connections"), "{error}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn listening_port_reports_ready() {
        let port = free_port();
        let entry = ProcessEntryPoint::new("sh", vec!["-c".into(), "sleep 5".into()])
            .probe_interval(Duration::from_millis(10))
            .exit_grace(Duration::from_millis(10));

        let readiness = entry.start(&context(port)).unwrap();
        // Stands in for the child binding its port.
        let _listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await.unwrap();

        assert_eq!(signal(readiness).await, Ok(()));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exit_within_grace_after_port_answers_is_a_failure() {
        let port = free_port();
        let entry = ProcessEntryPoint::new("sh", vec!["-c".into(), "sleep 0.2; exit 1".into()])
            .probe_interval(Duration::from_millis(10))
            .exit_grace(Duration::from_secs(5));

        let readiness = entry.start(&context(port)).unwrap();
        let _listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await.unwrap();

        let error = signal(readiness).await.unwrap_err();
        assert!(error.contains("exited before accepting connections"), "{error}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn child_in_other_directory_reads_shared_config() {
        let dir = tempfile::tempdir_in(".").unwrap();
        assert!(dir.path().is_relative());
        let config = dir.path().join("conf").join("socket_config.json");
        std::fs::create_dir_all(config.parent().unwrap()).unwrap();
        std::fs::write(&config, r#"{"host":"shared.test"}"#).unwrap();
        let games = dir.path().join("games");
        std::fs::create_dir_all(&games).unwrap();

        let script = "printf '%s\\n' \"$SLOTS_PORT\"; cat \"$SOCKET_CONFIG_PATH\"; echo; cat socket_config.json; echo; printf '%s' \"$SOCKET_CONFIG_PATH\" > seen_path.txt";
        let entry = ProcessEntryPoint::new("sh", vec!["-c".into(), format!("{{ {script}; }} > env.txt")])
            .current_dir(&games);
        let port = free_port();

        let readiness = entry.start(&context_with_config(port, &config)).unwrap();
        let _ = signal(readiness).await;

        let written = std::fs::read_to_string(games.join("env.txt")).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(
            lines,
            vec![port.to_string().as_str(), r#"{"host":"shared.test"}"#, r#"{"host":"shared.test"}"#]
        );
        let seen = PathBuf::from(std::fs::read_to_string(games.join("seen_path.txt")).unwrap());
        assert!(seen.is_absolute(), "{}", seen.display());
    }

    #[cfg(unix)]
    #[test]
    fn stale_link_is_repointed() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.json");
        let target = dir.path().join("shared.json");
        std::fs::write(&old, "old").unwrap();
        std::fs::write(&target, "shared").unwrap();
        let games = dir.path().join("games");
        std::fs::create_dir_all(&games).unwrap();
        std::os::unix::fs::symlink(&old, games.join(REDIRECTED_FILE_NAME)).unwrap();

        link_shared_config("slots", &games, &target).unwrap();

        assert_eq!(
            std::fs::read_to_string(games.join(REDIRECTED_FILE_NAME)).unwrap(),
            "shared"
        );
    }

    #[test]
    fn foreign_config_file_is_not_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("shared.json");
        std::fs::write(&target, "shared").unwrap();
        let games = dir.path().join("games");
        std::fs::create_dir_all(&games).unwrap();
        std::fs::write(games.join(REDIRECTED_FILE_NAME), "local").unwrap();

        let result = link_shared_config("slots", &games, &target);

        assert!(matches!(result, Err(SupervisorError::Launch { .. })));
        assert_eq!(
            std::fs::read_to_string(games.join(REDIRECTED_FILE_NAME)).unwrap(),
            "local"
        );
    }

    #[test]
    fn config_already_in_working_directory_is_used_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join(REDIRECTED_FILE_NAME);
        std::fs::write(&target, "shared").unwrap();

        link_shared_config("slots", dir.path(), &target).unwrap();

        assert!(!std::fs::symlink_metadata(&target).unwrap().file_type().is_symlink());
    }
}
