//! The countdown driver: a periodic task that feeds ticks to the actor.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::commands::TimerCommand;

/// Shortest accepted tick period.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// One countdown driver, identified by its generation.
///
/// The driver only holds a weak sender, so it never keeps the actor alive.
/// It sends one `Tick` per period and waits for the actor's acknowledgement
/// before waiting for the next period: ticks never overlap, and ticks that
/// fall behind are delayed rather than bursted.
pub(super) struct CountdownDriver {
    pub(super) generation: u64,
    pub(super) sender: mpsc::WeakSender<TimerCommand>,
    pub(super) period: Duration,
    pub(super) cancel: CancellationToken,
}

impl CountdownDriver {
    pub(super) async fn run(self) {
        let period = self.period.max(MIN_PERIOD);
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let Some(sender) = self.sender.upgrade() else {
                break;
            };

            let (done_tx, done_rx) = oneshot::channel();
            let tick = TimerCommand::Tick {
                generation: self.generation,
                done: done_tx,
            };
            if sender.send(tick).await.is_err() {
                break;
            }
            drop(sender);

            if done_rx.await.is_err() {
                break;
            }
        }

        debug!(generation = self.generation, "Countdown driver exited");
    }
}
