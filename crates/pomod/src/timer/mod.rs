//! The single Pomodoro timer, using the Actor pattern.
//!
//! The timer actor is the only writer of timer state. Client commands, the
//! per-second countdown driver, and the daily-boundary task all talk to it
//! through one mpsc channel, so every transition is serialized.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐                    ┌─────────────────┐     ┌──────────────────┐
//! │  ConnectionHandler│──TimerCommand────▶│                 │────▶│ broadcast channel │
//! └──────────────────┘                    │   TimerActor    │     └─────────┬────────┘
//! ┌──────────────────┐                    │                 │               │
//! │ CountdownDriver  │──Tick{generation}─▶│ load ▶ step ▶   │          TimerEvent
//! │  (one at a time) │◀───────ack─────────│ save ▶ publish  │               ▼
//! └──────────────────┘                    │                 │       subscribed clients
//! ┌──────────────────┐                    │                 │
//! │ daily check task │──CheckAndReset────▶│                 │
//! └──────────────────┘                    └────────┬────────┘
//!                                                  │
//!                                                  ▼
//!                                           Persistence (store)
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All operations in this module follow the panic-free policy:
//! - No `.unwrap()` or `.expect()` in production code
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use pomo_core::Clock;

use crate::persistence::Persistence;

mod actor;
mod commands;
mod driver;
mod handle;

pub use actor::TimerActor;
pub use commands::{TimerCommand, TimerError, TimerEvent};
pub use handle::TimerHandle;

/// Channel buffer sizes
const COMMAND_BUFFER: usize = 100;
const EVENT_BUFFER: usize = 100;

/// Shortest accepted daily-check period.
const MIN_DAILY_CHECK: Duration = Duration::from_secs(1);

/// Timing knobs for the timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerOptions {
    /// Countdown tick period. One tick removes one second of remaining time.
    pub tick_interval: Duration,

    /// How often the daily counter is re-checked for a day change.
    pub daily_check_interval: Duration,
}

impl Default for TimerOptions {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            daily_check_interval: Duration::from_secs(60),
        }
    }
}

/// Spawn the timer actor and return a handle for interaction.
///
/// This function:
/// 1. Creates command and event channels
/// 2. Spawns the TimerActor (which restores persisted state first)
/// 3. Spawns the periodic daily-boundary check
/// 4. Returns a TimerHandle for client use
///
/// The actor stops once every `TimerHandle` is dropped; the background tasks
/// hold only weak senders and stop with it.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use pomo_core::SystemClock;
/// use pomod::persistence::Persistence;
/// use pomod::store::MemoryStore;
/// use pomod::timer::{spawn_timer, TimerOptions};
///
/// #[tokio::main]
/// async fn main() {
///     let persistence = Persistence::new(Arc::new(MemoryStore::new()));
///     let handle = spawn_timer(persistence, Arc::new(SystemClock), TimerOptions::default());
///
///     let view = handle.start().await;
/// }
/// ```
pub fn spawn_timer(
    persistence: Persistence,
    clock: Arc<dyn Clock>,
    options: TimerOptions,
) -> TimerHandle {
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, _) = broadcast::channel(EVENT_BUFFER);

    let actor = TimerActor::new(
        cmd_rx,
        cmd_tx.downgrade(),
        event_tx.clone(),
        persistence,
        clock,
        options.tick_interval,
    );
    tokio::spawn(actor.run());

    spawn_daily_check_task(cmd_tx.downgrade(), options.daily_check_interval);

    TimerHandle::new(cmd_tx, event_tx)
}

/// Spawn a background task that periodically re-checks the daily counter.
///
/// The actor already runs this check on startup, so the first periodic check
/// happens one full period later.
fn spawn_daily_check_task(sender: mpsc::WeakSender<TimerCommand>, period: Duration) {
    let period = period.max(MIN_DAILY_CHECK);

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let Some(sender) = sender.upgrade() else {
                debug!("Daily check task stopping: timer actor gone");
                break;
            };

            // Fire-and-forget
            if sender
                .send(TimerCommand::CheckAndReset { respond_to: None })
                .await
                .is_err()
            {
                debug!("Daily check task stopping: timer channel closed");
                break;
            }
        }
    });
}
