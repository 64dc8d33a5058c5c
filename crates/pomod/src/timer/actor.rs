//! Timer actor - owns the timer snapshot and processes commands.
//!
//! The TimerActor is the single owner of the timer in the system. Commands
//! and countdown ticks arrive on one mpsc channel and are handled strictly one
//! after another, which is what keeps a `pause` from racing a completing tick.
//!
//! Each handler follows the same shape:
//!
//! ```text
//!   load()  ──▶  pure transition on TimerSnapshot  ──▶  save()  ──▶  publish
//! ```
//!
//! A failed load falls back to the last-known in-memory state. A failed save
//! is logged and the in-memory result stays authoritative (and is not
//! overwritten by the stale store) until a later save succeeds.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Reply and publish failures are ignored; a missing listener is not an error

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use pomo_core::{
    aggregate, format_date, Clock, DailyCounter, History, RunState, SettingsUpdate,
    StartOutcome, Statistics, TickOutcome, TimerSettings, TimerSnapshot, TimerView,
};

use super::commands::{TimerCommand, TimerEvent};
use super::driver::CountdownDriver;
use crate::persistence::{Persistence, PersistenceError};

/// The driver currently allowed to advance the countdown.
struct ActiveDriver {
    generation: u64,
    cancel: CancellationToken,
}

/// The timer actor.
///
/// # Ownership
///
/// The actor owns the last-known `TimerSnapshot`, settings and daily counter,
/// and the active countdown driver (at most one). The completion ledger is
/// only ever read from and appended to the store.
pub struct TimerActor {
    receiver: mpsc::Receiver<TimerCommand>,

    /// Handed to countdown drivers; weak so drivers never keep the actor alive.
    tick_sender: mpsc::WeakSender<TimerCommand>,

    event_publisher: broadcast::Sender<TimerEvent>,

    persistence: Persistence,
    clock: Arc<dyn Clock>,
    tick_interval: Duration,

    snapshot: TimerSnapshot,
    settings: TimerSettings,
    counter: DailyCounter,

    /// True while the in-memory snapshot is newer than the stored one.
    snapshot_unsynced: bool,
    /// True while the in-memory settings are newer than the stored ones.
    settings_unsynced: bool,

    driver: Option<ActiveDriver>,
    generation: u64,
}

impl TimerActor {
    pub fn new(
        receiver: mpsc::Receiver<TimerCommand>,
        tick_sender: mpsc::WeakSender<TimerCommand>,
        event_publisher: broadcast::Sender<TimerEvent>,
        persistence: Persistence,
        clock: Arc<dyn Clock>,
        tick_interval: Duration,
    ) -> Self {
        let settings = TimerSettings::default();
        Self {
            receiver,
            tick_sender,
            event_publisher,
            persistence,
            clock,
            tick_interval,
            snapshot: TimerSnapshot::new(&settings.durations),
            settings,
            counter: DailyCounter::default(),
            snapshot_unsynced: false,
            settings_unsynced: false,
            driver: None,
            generation: 0,
        }
    }

    /// Runs the actor: restores persisted state, then processes commands
    /// until every strong sender is dropped.
    pub async fn run(mut self) {
        info!("Timer actor starting");
        self.restore().await;

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd).await;
        }

        self.stop_driver();
        info!(
            phase = %self.snapshot.phase,
            run_state = %self.snapshot.run_state,
            seconds_remaining = self.snapshot.seconds_remaining,
            "Timer actor stopped"
        );
    }

    async fn handle_command(&mut self, cmd: TimerCommand) {
        match cmd {
            TimerCommand::Start { respond_to } => {
                let view = self.handle_start().await;
                let _ = respond_to.send(view);
            }
            TimerCommand::Pause { respond_to } => {
                let view = self.handle_pause().await;
                let _ = respond_to.send(view);
            }
            TimerCommand::Reset { respond_to } => {
                let view = self.handle_reset().await;
                let _ = respond_to.send(view);
            }
            TimerCommand::GetState { respond_to } => {
                self.load().await;
                let _ = respond_to.send(self.view());
            }
            TimerCommand::GetStats { respond_to } => {
                let stats = self.handle_get_stats().await;
                let _ = respond_to.send(stats);
            }
            TimerCommand::CheckAndReset { respond_to } => {
                let count = self.check_daily().await;
                if let Some(tx) = respond_to {
                    let _ = tx.send(count);
                }
            }
            TimerCommand::Configure { update, respond_to } => {
                let settings = self.handle_configure(update).await;
                let _ = respond_to.send(settings);
            }
            TimerCommand::GetSettings { respond_to } => {
                self.load().await;
                let _ = respond_to.send(self.settings);
            }
            TimerCommand::Tick { generation, done } => {
                self.handle_tick(generation).await;
                let _ = done.send(());
            }
        }
    }

    // ========================================================================
    // Startup
    // ========================================================================

    /// Restores state after a (re)start.
    ///
    /// A driver never survives the process, so a persisted `Running` timer
    /// comes back `Stopped` with its phase and remaining time intact.
    async fn restore(&mut self) {
        match self.persistence.load_settings().await {
            Ok(settings) => self.settings = settings,
            Err(e) => warn!(error = %e, "Failed to load settings, using defaults"),
        }

        self.snapshot = match self.persistence.load_snapshot().await {
            Ok(Some(mut snapshot)) => {
                if snapshot.recover_after_restart() {
                    info!(
                        phase = %snapshot.phase,
                        seconds_remaining = snapshot.seconds_remaining,
                        "Timer was running before restart, now stopped"
                    );
                }
                snapshot
            }
            Ok(None) => {
                info!("No persisted timer, starting with a fresh work interval");
                TimerSnapshot::new(&self.settings.durations)
            }
            Err(e) => {
                warn!(error = %e, "Persisted timer is unreadable, starting fresh");
                TimerSnapshot::new(&self.settings.durations)
            }
        };

        self.save().await;
        self.check_daily().await;
    }

    // ========================================================================
    // Load / Save Boundary
    // ========================================================================

    /// Refreshes settings and snapshot from the store, keeping the in-memory
    /// values on any failure.
    async fn load(&mut self) {
        if let Err(e) = self.try_load().await {
            warn!(error = %e, "Failed to load timer state, using last known");
        }
    }

    /// Like `load`, but reports a failure instead of absorbing it.
    async fn try_load(&mut self) -> Result<(), PersistenceError> {
        if !self.settings_unsynced {
            self.settings = self.persistence.load_settings().await?;
        }

        if !self.snapshot_unsynced {
            if let Some(snapshot) = self.persistence.load_snapshot().await? {
                self.adopt(snapshot);
            }
        }

        Ok(())
    }

    /// Takes a stored snapshot as current, keeping run-state and driver in
    /// agreement.
    fn adopt(&mut self, mut snapshot: TimerSnapshot) {
        if snapshot.is_running() && self.driver.is_none() {
            snapshot.recover_after_restart();
        } else if !snapshot.is_running() && self.driver.is_some() {
            self.stop_driver();
        }
        self.snapshot = snapshot;
    }

    async fn save(&mut self) {
        self.snapshot.last_persisted_at = Some(self.clock.now());

        match self.persistence.save_snapshot(&self.snapshot).await {
            Ok(()) => self.snapshot_unsynced = false,
            Err(e) => {
                error!(error = %e, "Failed to persist timer snapshot");
                self.snapshot_unsynced = true;
            }
        }
    }

    async fn save_settings(&mut self) {
        match self.persistence.save_settings(&self.settings).await {
            Ok(()) => self.settings_unsynced = false,
            Err(e) => {
                error!(error = %e, "Failed to persist settings");
                self.settings_unsynced = true;
            }
        }
    }

    // ========================================================================
    // Command Handlers
    // ========================================================================

    async fn handle_start(&mut self) -> TimerView {
        self.load().await;

        let outcome = self.snapshot.start(&self.settings.durations);
        match outcome {
            StartOutcome::AlreadyRunning => debug!("Start ignored: timer already running"),
            StartOutcome::Resumed => info!(
                phase = %self.snapshot.phase,
                seconds_remaining = self.snapshot.seconds_remaining,
                "Timer resumed"
            ),
            StartOutcome::Started { reloaded } => info!(
                phase = %self.snapshot.phase,
                seconds_remaining = self.snapshot.seconds_remaining,
                reloaded,
                "Timer started"
            ),
        }

        if outcome.needs_driver() || self.driver.is_none() {
            self.start_driver();
        }

        if outcome.needs_driver() {
            self.save().await;
            self.publish_update();
        }

        self.view()
    }

    async fn handle_pause(&mut self) -> TimerView {
        self.load().await;

        if self.snapshot.pause() {
            self.stop_driver();
            info!(
                seconds_remaining = self.snapshot.seconds_remaining,
                "Timer paused"
            );
            self.save().await;
            self.publish_update();
        } else {
            debug!(run_state = %self.snapshot.run_state, "Pause ignored: timer not running");
        }

        self.view()
    }

    async fn handle_reset(&mut self) -> TimerView {
        self.load().await;

        self.stop_driver();
        self.snapshot.reset(&self.settings.durations);
        info!("Timer reset");

        self.save().await;
        self.publish_update();

        self.view()
    }

    async fn handle_get_stats(&mut self) -> Statistics {
        let history = match self.persistence.load_history().await {
            Ok(history) => history,
            Err(e) => {
                warn!(error = %e, "Failed to load completion history, reporting empty statistics");
                History::new()
            }
        };

        aggregate(history.records(), self.clock.today())
    }

    async fn handle_configure(&mut self, update: SettingsUpdate) -> TimerSettings {
        self.load().await;

        let change = self.settings.apply(&update);
        self.save_settings().await;

        info!(
            work_minutes = self.settings.durations.work_minutes,
            break_minutes = self.settings.durations.break_minutes,
            sound = self.settings.sound_enabled,
            notification = self.settings.notification_enabled,
            auto_switch = self.settings.auto_switch_enabled,
            "Settings updated"
        );

        // Only the current phase's duration matters, and a live countdown is
        // left alone.
        if change.affects(self.snapshot.phase) && !self.snapshot.is_running() {
            self.snapshot.reset(&self.settings.durations);
            self.save().await;
            self.publish_update();
        }

        self.settings
    }

    // ========================================================================
    // Countdown
    // ========================================================================

    async fn handle_tick(&mut self, generation: u64) {
        let current = self.driver.as_ref().map(|d| d.generation);
        if current != Some(generation) {
            debug!(generation, current = ?current, "Ignoring tick from stale driver");
            return;
        }

        if let Err(e) = self.try_load().await {
            self.halt(e).await;
            return;
        }

        match self.snapshot.tick() {
            TickOutcome::Idle => {
                debug!(run_state = %self.snapshot.run_state, "Tick while not running, stopping driver");
                self.stop_driver();
            }
            TickOutcome::Counting { .. } => {
                self.save().await;
                self.publish_update();
            }
            TickOutcome::Elapsed => self.complete_phase().await,
        }
    }

    /// Finishes the current phase: records work completions, flips the
    /// phase, and starts the next one when auto-switch is on.
    async fn complete_phase(&mut self) {
        self.stop_driver();

        let durations = self.settings.durations;
        let completion = self.snapshot.complete_phase(&durations);

        if completion.counts_toward_history() {
            self.record_completion().await;
        }

        info!(
            completed = %completion.completed,
            next = %completion.next,
            auto_switch = self.settings.auto_switch_enabled,
            "Phase completed"
        );

        self.publish(TimerEvent::PhaseCompleted {
            completion,
            play_sound: self.settings.sound_enabled,
            show_notification: self.settings.notification_enabled,
        });

        if self.settings.auto_switch_enabled {
            self.snapshot.start(&durations);
            self.start_driver();
        }

        self.save().await;
        self.publish_update();
    }

    async fn record_completion(&mut self) {
        let today = self.clock.today();

        let mut history = match self.persistence.load_history().await {
            Ok(history) => history,
            Err(e) => {
                // Appending to an empty ledger would overwrite the real one.
                error!(error = %e, "Failed to load completion history, completion not recorded");
                return;
            }
        };

        history.append(today);
        if let Err(e) = self.persistence.save_history(&history).await {
            error!(error = %e, "Failed to persist completion history");
        }

        self.refresh_counter(&history).await;
    }

    /// Stops the countdown after a failed tick and leaves the timer paused.
    async fn halt(&mut self, cause: PersistenceError) {
        self.stop_driver();
        self.snapshot.run_state = RunState::Paused;

        error!(
            error = %cause,
            seconds_remaining = self.snapshot.seconds_remaining,
            "Countdown tick failed, timer paused"
        );

        self.save().await;
        self.publish(TimerEvent::Halted {
            reason: cause.to_string(),
        });
        self.publish_update();
    }

    fn start_driver(&mut self) {
        self.stop_driver();

        self.generation += 1;
        let cancel = CancellationToken::new();
        let driver = CountdownDriver {
            generation: self.generation,
            sender: self.tick_sender.clone(),
            period: self.tick_interval,
            cancel: cancel.clone(),
        };
        tokio::spawn(driver.run());

        debug!(generation = self.generation, "Countdown driver started");
        self.driver = Some(ActiveDriver {
            generation: self.generation,
            cancel,
        });
    }

    fn stop_driver(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.cancel.cancel();
            debug!(generation = driver.generation, "Countdown driver stopped");
        }
    }

    // ========================================================================
    // Daily Counter
    // ========================================================================

    /// Re-derives today's count from the ledger and returns it.
    async fn check_daily(&mut self) -> u32 {
        match self.persistence.load_history().await {
            Ok(history) => self.refresh_counter(&history).await,
            Err(e) => {
                warn!(error = %e, "Failed to load completion history, daily counter unchanged");
                self.counter.completed_pomodoros
            }
        }
    }

    async fn refresh_counter(&mut self, history: &History) -> u32 {
        let today = self.clock.today();

        let mut counter = match self.persistence.load_counter().await {
            Ok(counter) => counter,
            Err(e) => {
                warn!(error = %e, "Failed to load daily counter, using last known");
                self.counter
            }
        };

        let check = counter.check_and_reset(history, today);
        self.counter = counter;

        if check.new_day {
            info!(
                date = %format_date(today),
                count = check.count,
                "Daily counter rolled over"
            );
        }

        if check.changed {
            if let Err(e) = self.persistence.save_counter(&counter).await {
                error!(error = %e, "Failed to persist daily counter");
            }
            self.publish(TimerEvent::CompletedCountChanged { count: check.count });
        }

        check.count
    }

    // ========================================================================
    // Publishing
    // ========================================================================

    fn view(&self) -> TimerView {
        TimerView::new(&self.snapshot, self.counter.completed_pomodoros)
    }

    fn publish_update(&self) {
        self.publish(TimerEvent::Updated(self.view()));
    }

    fn publish(&self, event: TimerEvent) {
        if self.event_publisher.send(event).is_err() {
            debug!("No subscribers listening for timer events");
        }
    }

    #[cfg(test)]
    fn driver_generation(&self) -> Option<u64> {
        self.driver.as_ref().map(|d| d.generation)
    }
}
