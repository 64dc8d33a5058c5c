//! pomo Daemon - single Pomodoro timer with persisted state
//!
//! Owns the timer, keeps it in a JSON data file and serves clients over a
//! Unix socket.
//!
//! # Usage
//!
//! ```bash
//! pomod start                 # foreground
//! pomod start -d              # background, logs to <state dir>/pomo/pomod.log
//! pomod start --ephemeral     # nothing is written to disk
//! pomod status                # PID, socket, data file and the live timer
//! pomod stop
//!
//! POMO_SOCKET=/run/pomo.sock POMO_DATA=/var/lib/pomo.json pomod start
//! RUST_LOG=pomod=debug pomod start
//! ```
//!
//! SIGTERM and SIGINT shut the daemon down gracefully: the socket file is
//! removed and the PID file released.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use pomo_client::daemon::{is_process_running, pid_file_path, read_pid};
use pomo_client::render::render_state;
use pomo_client::{ClientConfig, PomoClient};
use pomo_core::SystemClock;
use pomod::config::DaemonConfig;
use pomod::persistence::Persistence;
use pomod::server::DaemonServer;
use pomod::store::{JsonFileStore, KeyValueStore, MemoryStore};
use pomod::timer::spawn_timer;

/// How long `pomod stop` waits for the daemon to exit.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// pomo daemon - Pomodoro timer service
#[derive(Parser)]
#[command(name = "pomod", version, about)]
struct Args {
    /// Config file (defaults to <config dir>/pomo/pomod.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the daemon
    Start {
        /// Fork to the background
        #[arg(short = 'd', long)]
        daemon: bool,

        /// Keep timer state, settings and history in memory only
        #[arg(long)]
        ephemeral: bool,
    },
    /// Stop the running daemon
    Stop,
    /// Show the daemon and its timer
    Status,
}

// ============================================================================
// PID File
// ============================================================================

/// Holds the PID file for as long as the daemon runs.
struct PidFile {
    path: PathBuf,
}

impl PidFile {
    fn create() -> Result<Self> {
        let path = pid_file_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create state directory")?;
        }
        let mut file = File::create(&path).context("Failed to create PID file")?;
        write!(file, "{}", process::id()).context("Failed to write PID")?;
        Ok(Self { path })
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// PID of a live daemon. A PID file left behind by a dead process is removed.
fn live_daemon_pid() -> Option<u32> {
    let pid = read_pid()?;
    if is_process_running(pid) {
        return Some(pid);
    }
    let _ = fs::remove_file(pid_file_path());
    None
}

// ============================================================================
// Commands
// ============================================================================

fn main() -> Result<()> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => {
            let mut config = DaemonConfig::from_file(path)?;
            config.apply_env(|key| std::env::var(key).ok());
            config
        }
        None => DaemonConfig::load().context("Failed to load daemon config")?,
    };

    match args.command.unwrap_or(Command::Start {
        daemon: false,
        ephemeral: false,
    }) {
        Command::Start { daemon, ephemeral } => {
            if let Some(pid) = live_daemon_pid() {
                bail!("Daemon is already running (PID {pid}); use 'pomod stop' first");
            }
            if daemon {
                daemonize()?;
            }
            let _pid_file = PidFile::create()?;
            run_daemon(config, ephemeral)
        }
        Command::Stop => stop(&config.socket_path),
        Command::Status => status(&config),
    }
}

fn stop(socket_path: &Path) -> Result<()> {
    let Some(pid) = live_daemon_pid() else {
        println!("Daemon is not running.");
        return Ok(());
    };

    println!("Stopping daemon (PID {pid})...");
    let raw_pid = i32::try_from(pid).context("PID out of range")?;
    if unsafe { libc::kill(raw_pid, libc::SIGTERM) } != 0 {
        bail!("Failed to send SIGTERM to process {pid}");
    }

    // The server removes its socket during shutdown, so wait for both
    let deadline = Instant::now() + STOP_TIMEOUT;
    while Instant::now() < deadline {
        if !is_process_running(pid) && !socket_path.exists() {
            println!("Daemon stopped.");
            return Ok(());
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    bail!("Daemon did not stop within {} seconds", STOP_TIMEOUT.as_secs())
}

fn status(config: &DaemonConfig) -> Result<()> {
    let Some(pid) = live_daemon_pid() else {
        println!("Daemon is not running.");
        process::exit(1);
    };

    println!("Daemon: running (PID {pid})");
    println!("Socket: {}", config.socket_path.display());
    println!("Data:   {}", config.data_file.display());

    match query_timer(config.socket_path.clone()) {
        Ok(line) => println!("Timer:  {line}"),
        Err(e) => println!("Timer:  unavailable ({e})"),
    }
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn query_timer(socket_path: PathBuf) -> Result<String> {
    let config = ClientConfig {
        socket_path,
        client_id: Some("pomod-status".to_string()),
        ..ClientConfig::default()
    };
    let mut client = PomoClient::connect(&config).await?;
    let view = client.state().await?;
    client.disconnect().await?;
    Ok(render_state(&view))
}

fn daemonize() -> Result<()> {
    let log_path = dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("pomo")
        .join("pomod.log");
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("Failed to create log directory")?;
    }

    let stdout = File::create(&log_path).context("Failed to create log file")?;
    let stderr = stdout.try_clone().context("Failed to share log file with stderr")?;

    daemonize::Daemonize::new()
        .working_directory("/")
        .stdout(stdout)
        .stderr(stderr)
        .start()
        .context("Failed to daemonize")?;
    Ok(())
}

// ============================================================================
// Daemon
// ============================================================================

#[tokio::main]
async fn run_daemon(config: DaemonConfig, ephemeral: bool) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("pomod=info".parse()?)
                .add_directive("pomo_core=info".parse()?)
                .add_directive("pomo_protocol=info".parse()?),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        tick_ms = config.tick_interval_ms,
        "pomo daemon starting"
    );

    let cancel_token = CancellationToken::new();
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to watch SIGTERM")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to watch SIGINT")?;
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        info!(signal = name, "Shutting down");
        shutdown_token.cancel();
    });

    let store = open_store(&config, ephemeral).await?;
    let timer = spawn_timer(
        Persistence::new(store),
        Arc::new(SystemClock),
        config.timer_options(),
    );

    let server = DaemonServer::new(config.socket_path.clone(), timer, cancel_token);
    info!(socket = %config.socket_path.display(), "Serving clients");

    if let Err(e) = server.run().await {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("pomo daemon stopped");
    Ok(())
}

async fn open_store(config: &DaemonConfig, ephemeral: bool) -> Result<Arc<dyn KeyValueStore>> {
    if ephemeral {
        warn!("Ephemeral mode: timer state, settings and history are not saved");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let store = JsonFileStore::open(&config.data_file)
        .await
        .with_context(|| format!("Failed to open data file {}", config.data_file.display()))?;
    info!(data_file = %config.data_file.display(), "Data file opened");
    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_start_flags_parse() {
        let args = Args::try_parse_from(["pomod", "start", "-d", "--ephemeral"]).unwrap();
        assert!(matches!(
            args.command,
            Some(Command::Start {
                daemon: true,
                ephemeral: true
            })
        ));
    }

    #[test]
    fn test_config_flag_is_global() {
        let args = Args::try_parse_from(["pomod", "status", "--config", "/etc/pomod.toml"]).unwrap();
        assert_eq!(args.config, Some(PathBuf::from("/etc/pomod.toml")));
        assert!(matches!(args.command, Some(Command::Status)));
    }

    #[test]
    fn test_no_subcommand_means_start() {
        let args = Args::try_parse_from(["pomod"]).unwrap();
        assert!(args.command.is_none());
    }
}
