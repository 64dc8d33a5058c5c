//! pomo CLI - control the Pomodoro timer daemon
//!
//! Every subcommand opens one connection to `pomod`, performs the
//! handshake, sends its command and prints the answer.
//!
//! # Usage
//!
//! ```text
//! pomo status                 # Current phase, time left and badge
//! pomo start                  # Start or resume the timer
//! pomo pause                  # Pause the timer
//! pomo reset                  # Back to a fresh work phase
//! pomo stats                  # Daily, weekly and monthly charts
//! pomo config                 # Show settings
//! pomo config --work 50       # Change settings
//! pomo check                  # Run the day-change check now
//! pomo watch                  # Follow timer updates until Ctrl+C
//! ```

use std::io::Write;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use pomo_client::daemon::ensure_daemon_running;
use pomo_client::render::{render_push, render_settings, render_state, render_stats, wants_bell};
use pomo_client::{ClientConfig, PomoClient};
use pomo_core::SettingsUpdate;

// ============================================================================
// CLI Arguments
// ============================================================================

/// pomo - Pomodoro timer
#[derive(Parser, Debug)]
#[command(name = "pomo")]
#[command(about = "Control the pomo timer daemon")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Start the daemon if it is not running
    #[arg(long, global = true)]
    autostart: bool,

    /// Print answers as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the timer (default)
    Status,
    /// Start or resume the timer
    Start,
    /// Pause the running timer
    Pause,
    /// Stop the timer and return to a fresh work phase
    Reset,
    /// Show completed pomodoros per day, week and month
    Stats,
    /// Show or change settings
    Config {
        /// Work phase length in minutes (1-60)
        #[arg(long)]
        work: Option<String>,

        /// Break phase length in minutes (1-60)
        #[arg(long = "break")]
        break_minutes: Option<String>,

        /// Play a sound when a phase ends
        #[arg(long, action = ArgAction::Set)]
        sound: Option<bool>,

        /// Show a notification when a phase ends
        #[arg(long, action = ArgAction::Set)]
        notification: Option<bool>,

        /// Start the next phase automatically
        #[arg(long, action = ArgAction::Set)]
        auto_switch: Option<bool>,
    },
    /// Run the day-change check immediately
    Check,
    /// Measure the round trip to the daemon
    Ping,
    /// Follow timer updates until interrupted
    Watch,
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let args = Args::parse();
    let config = ClientConfig::from_env();

    if args.autostart {
        ensure_daemon_running(&config.socket_path)
            .await
            .map_err(anyhow::Error::msg)?;
    }

    let mut client = PomoClient::connect(&config).await.with_context(|| {
        format!(
            "Could not reach pomod at {} (is it running? try 'pomod start -d')",
            config.socket_path.display()
        )
    })?;
    debug!(client_id = client.client_id(), "Connected");

    let command = args.command.unwrap_or(Command::Status);
    match command {
        Command::Status => {
            let view = client.state().await?;
            print_answer(args.json, &view, render_state)?;
        }
        Command::Start => {
            client.start().await?;
            let view = client.state().await?;
            print_answer(args.json, &view, render_state)?;
        }
        Command::Pause => {
            client.pause().await?;
            let view = client.state().await?;
            print_answer(args.json, &view, render_state)?;
        }
        Command::Reset => {
            client.reset().await?;
            let view = client.state().await?;
            print_answer(args.json, &view, render_state)?;
        }
        Command::Stats => {
            let stats = client.stats().await?;
            print_answer(args.json, &stats, render_stats)?;
        }
        Command::Config {
            work,
            break_minutes,
            sound,
            notification,
            auto_switch,
        } => {
            let update = SettingsUpdate {
                work_minutes: work.map(Value::String),
                break_minutes: break_minutes.map(Value::String),
                sound_enabled: sound,
                notification_enabled: notification,
                auto_switch_enabled: auto_switch,
            };
            let settings = if update == SettingsUpdate::default() {
                client.settings().await?
            } else {
                client.configure(update).await?
            };
            print_answer(args.json, &settings, render_settings)?;
        }
        Command::Check => {
            client.check_and_reset().await?;
            let view = client.state().await?;
            print_answer(args.json, &view, render_state)?;
        }
        Command::Ping => {
            let rtt = client.ping().await?;
            println!("pong in {:.1} ms", rtt.as_secs_f64() * 1000.0);
        }
        Command::Watch => {
            watch(client, args.json).await?;
            return Ok(());
        }
    }

    client.disconnect().await?;
    Ok(())
}

/// Prints `value` as JSON or through its text renderer.
fn print_answer<T: Serialize>(json: bool, value: &T, render: impl Fn(&T) -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", render(value));
    }
    Ok(())
}

async fn watch(mut client: PomoClient, json: bool) -> Result<()> {
    let initial = client.subscribe().await?;
    print_answer(json, &initial, render_state)?;

    loop {
        let msg = tokio::select! {
            msg = client.next_message() => msg?,
            _ = tokio::signal::ctrl_c() => break,
        };

        let Some(msg) = msg else {
            eprintln!("Daemon closed the connection");
            return Ok(());
        };

        if json {
            println!("{}", serde_json::to_string(&msg)?);
        } else if let Some(line) = render_push(&msg) {
            let mut stdout = std::io::stdout().lock();
            if wants_bell(&msg) {
                write!(stdout, "\x07")?;
            }
            writeln!(stdout, "{line}")?;
            stdout.flush()?;
        }
    }

    client.disconnect().await?;
    Ok(())
}

/// Logs go to stderr, quiet unless `RUST_LOG` asks for more.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
