//! Client interface for interacting with the TimerActor.
//!
//! The `TimerHandle` is cheap to clone and can be shared across connection
//! tasks. Every method maps a closed channel to `TimerError::ChannelClosed`.

use tokio::sync::{broadcast, mpsc, oneshot};

use pomo_core::{SettingsUpdate, Statistics, TimerSettings, TimerView};

use super::commands::{TimerCommand, TimerError, TimerEvent};

/// Handle for interacting with the timer actor.
#[derive(Clone)]
pub struct TimerHandle {
    sender: mpsc::Sender<TimerCommand>,
    event_sender: broadcast::Sender<TimerEvent>,
}

impl TimerHandle {
    pub fn new(
        sender: mpsc::Sender<TimerCommand>,
        event_sender: broadcast::Sender<TimerEvent>,
    ) -> Self {
        Self {
            sender,
            event_sender,
        }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> TimerCommand,
    ) -> Result<T, TimerError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(build(tx))
            .await
            .map_err(|_| TimerError::ChannelClosed)?;

        rx.await.map_err(|_| TimerError::ChannelClosed)
    }

    /// Starts or resumes the countdown.
    pub async fn start(&self) -> Result<TimerView, TimerError> {
        self.request(|respond_to| TimerCommand::Start { respond_to }).await
    }

    pub async fn pause(&self) -> Result<TimerView, TimerError> {
        self.request(|respond_to| TimerCommand::Pause { respond_to }).await
    }

    pub async fn reset(&self) -> Result<TimerView, TimerError> {
        self.request(|respond_to| TimerCommand::Reset { respond_to }).await
    }

    pub async fn get_state(&self) -> Result<TimerView, TimerError> {
        self.request(|respond_to| TimerCommand::GetState { respond_to }).await
    }

    pub async fn get_stats(&self) -> Result<Statistics, TimerError> {
        self.request(|respond_to| TimerCommand::GetStats { respond_to }).await
    }

    /// Recomputes today's counter and returns it.
    pub async fn check_and_reset(&self) -> Result<u32, TimerError> {
        self.request(|tx| TimerCommand::CheckAndReset {
            respond_to: Some(tx),
        })
        .await
    }

    /// Applies a settings change and returns the effective settings.
    pub async fn configure(&self, update: SettingsUpdate) -> Result<TimerSettings, TimerError> {
        self.request(|respond_to| TimerCommand::Configure { update, respond_to })
            .await
    }

    pub async fn get_settings(&self) -> Result<TimerSettings, TimerError> {
        self.request(|respond_to| TimerCommand::GetSettings { respond_to })
            .await
    }

    /// Subscribes to timer events.
    ///
    /// This does not talk to the actor.
    pub fn subscribe(&self) -> broadcast::Receiver<TimerEvent> {
        self.event_sender.subscribe()
    }

    /// Returns `true` while the command channel is open.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
