//! Timer actor commands, errors, and events.
//!
//! - `TimerCommand`: messages processed one at a time by the `TimerActor`
//! - `TimerError`: errors surfaced through the `TimerHandle`
//! - `TimerEvent`: pushes published to subscribers

use pomo_core::{PhaseCompletion, SettingsUpdate, Statistics, TimerSettings, TimerView};
use thiserror::Error;
use tokio::sync::oneshot;

// ============================================================================
// Timer Commands
// ============================================================================

/// Commands sent to the timer actor.
///
/// Request commands carry a oneshot channel for the reply. Because the actor
/// handles one command at a time, a command that arrives while a tick is
/// being processed waits for that tick to finish.
#[derive(Debug)]
pub enum TimerCommand {
    /// Start or resume. Idempotent while running.
    Start {
        respond_to: oneshot::Sender<TimerView>,
    },

    /// Pause a running countdown; no-op otherwise.
    Pause {
        respond_to: oneshot::Sender<TimerView>,
    },

    /// Stop and reload a full work interval.
    Reset {
        respond_to: oneshot::Sender<TimerView>,
    },

    GetState {
        respond_to: oneshot::Sender<TimerView>,
    },

    /// Aggregate the completion ledger as of today.
    GetStats {
        respond_to: oneshot::Sender<Statistics>,
    },

    /// Re-derive today's completion count from the ledger.
    ///
    /// The periodic daily-boundary task sends this without a reply channel.
    CheckAndReset {
        respond_to: Option<oneshot::Sender<u32>>,
    },

    /// Apply a partial settings change.
    Configure {
        update: SettingsUpdate,
        respond_to: oneshot::Sender<TimerSettings>,
    },

    GetSettings {
        respond_to: oneshot::Sender<TimerSettings>,
    },

    /// One second elapsed, from the countdown driver of `generation`.
    ///
    /// `done` is completed once the tick (including its write) has been
    /// processed; the driver waits for it before scheduling the next tick.
    Tick {
        generation: u64,
        done: oneshot::Sender<()>,
    },
}

// ============================================================================
// Timer Errors
// ============================================================================

#[derive(Debug, Clone, Error)]
pub enum TimerError {
    /// The actor is gone (daemon shutting down).
    #[error("timer channel closed")]
    ChannelClosed,
}

// ============================================================================
// Timer Events
// ============================================================================

/// Events published by the timer actor.
///
/// Publishing never fails a command: with no subscriber listening the event
/// is simply dropped.
#[derive(Debug, Clone)]
pub enum TimerEvent {
    /// State changed (tick or transition).
    Updated(TimerView),

    /// Today's completion count changed.
    CompletedCountChanged { count: u32 },

    /// A countdown reached zero and the phase flipped.
    PhaseCompleted {
        completion: PhaseCompletion,
        play_sound: bool,
        show_notification: bool,
    },

    /// A tick failed; the timer was paused and needs a new `start`.
    Halted { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_error_display() {
        assert_eq!(TimerError::ChannelClosed.to_string(), "timer channel closed");
    }

    #[tokio::test]
    async fn test_dropped_reply_is_observable() {
        let (tx, rx) = oneshot::channel::<TimerView>();
        drop(tx);
        assert!(rx.await.is_err());
    }
}
