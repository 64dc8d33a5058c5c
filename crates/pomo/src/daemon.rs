//! Daemon management for the pomo CLI.
//!
//! Provides utilities for checking if the daemon is running and
//! starting it automatically if needed.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use tracing::{debug, info};

/// Returns the path to the daemon PID file.
pub fn pid_file_path() -> PathBuf {
    dirs::state_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("pomo")
        .join("pomod.pid")
}

/// Reads the PID from the PID file, if it exists.
pub fn read_pid() -> Option<u32> {
    read_pid_from(&pid_file_path())
}

fn read_pid_from(path: &Path) -> Option<u32> {
    let mut file = File::open(path).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

/// Checks if a process with the given PID is running.
pub fn is_process_running(pid: u32) -> bool {
    PathBuf::from(format!("/proc/{}", pid)).exists()
}

/// Checks if the daemon is currently running.
pub fn is_daemon_running() -> bool {
    read_pid().is_some_and(is_process_running)
}

/// Starts the daemon in the background.
///
/// Spawns `pomod start -d` as a detached process.
fn spawn_daemon() -> std::io::Result<()> {
    // Prefer a pomod next to the current binary
    let pomod_path = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.join("pomod")))
        .filter(|p| p.exists())
        .unwrap_or_else(|| PathBuf::from("pomod"));

    debug!(path = %pomod_path.display(), "Starting daemon");

    Command::new(&pomod_path)
        .args(["start", "-d"])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()?;

    Ok(())
}

/// Ensures the daemon is running, starting it if necessary.
///
/// Waits until the daemon's socket accepts connections, up to 3 seconds.
pub async fn ensure_daemon_running(socket_path: &Path) -> Result<(), String> {
    if is_daemon_running() && socket_path.exists() {
        debug!("Daemon already running");
        return Ok(());
    }

    info!("Daemon not running, starting it...");

    if let Err(e) = spawn_daemon() {
        return Err(format!("Failed to start daemon: {}", e));
    }

    for i in 0..30 {
        tokio::time::sleep(Duration::from_millis(100)).await;

        if tokio::net::UnixStream::connect(socket_path).await.is_ok() {
            info!(attempts = i + 1, "Daemon started successfully");
            return Ok(());
        }
    }

    Err("Daemon failed to start within 3 seconds".to_string())
}
