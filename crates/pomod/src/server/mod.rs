//! Unix socket server for the pomo daemon.
//!
//! The server:
//! - Listens on a Unix socket for client connections
//! - Spawns a ConnectionHandler for each client
//! - Forwards timer events to subscribed clients
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   DaemonServer  │
//! │                 │
//! │  UnixListener   │
//! └───────┬─────────┘
//!         │ accept()
//!         ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │ConnectionHandler│────▶│   TimerHandle   │
//! │   (per client)  │     │                 │
//! └─────────────────┘     └────────┬────────┘
//!                                  │ TimerEvent
//!                                  ▼
//! ┌─────────────────┐     ┌─────────────────┐
//! │   subscribers   │◀────│   broadcaster   │
//! └─────────────────┘     └─────────────────┘
//! ```
//!
//! A failed push drops that subscriber; it never affects the timer.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Server errors are logged and allow continued operation

mod connection;

pub use connection::{ConnectionError, ConnectionHandler, Subscriber, SubscriberWriter, SubscribersMap};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::UnixListener;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use pomo_protocol::DaemonMessage;

use crate::timer::{TimerEvent, TimerHandle};

/// Default socket path
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/pomo.sock";

/// Maximum number of concurrent subscribers
pub const MAX_SUBSCRIBERS: usize = 10;

/// Error code attached to the push sent when a countdown tick fails.
pub const TICK_FAILED_CODE: &str = "tick_failed";

/// Unix socket server for the pomo daemon.
pub struct DaemonServer {
    /// Path to the Unix socket
    socket_path: PathBuf,

    timer: TimerHandle,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,

    /// Connection counter for generating client IDs
    connection_counter: AtomicU64,

    /// Active subscribers (keyed by client_id)
    subscribers: SubscribersMap,
}

impl DaemonServer {
    pub fn new(
        socket_path: impl Into<PathBuf>,
        timer: TimerHandle,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            socket_path: socket_path.into(),
            timer,
            cancel_token,
            connection_counter: AtomicU64::new(0),
            subscribers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Creates a server with the default socket path.
    pub fn with_default_path(timer: TimerHandle, cancel_token: CancellationToken) -> Self {
        Self::new(DEFAULT_SOCKET_PATH, timer, cancel_token)
    }

    /// Returns the socket path.
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Runs the server.
    ///
    /// Listens for connections until the cancellation token is triggered.
    /// This method does not return until shutdown.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listener = self.bind()?;

        info!(
            socket = %self.socket_path.display(),
            "Daemon server listening"
        );

        self.spawn_event_broadcaster();

        loop {
            tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break;
                }

                result = listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let conn_num = self.connection_counter.fetch_add(1, Ordering::Relaxed);
                            self.handle_connection(stream, conn_num);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                        }
                    }
                }
            }
        }

        self.cleanup().await;
        Ok(())
    }

    /// Replaces any stale socket file and binds the listener.
    fn bind(&self) -> Result<UnixListener, ServerError> {
        let setup_err = |e: std::io::Error| ServerError::SocketSetup {
            path: self.socket_path.clone(),
            error: e.to_string(),
        };

        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path).map_err(setup_err)?;
        }

        if let Some(parent) = self.socket_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(setup_err)?;
            }
        }

        UnixListener::bind(&self.socket_path).map_err(setup_err)
    }

    /// Handles a new client connection by spawning a handler task.
    fn handle_connection(&self, stream: tokio::net::UnixStream, connection_number: u64) {
        let (reader, writer) = stream.into_split();
        let timer = self.timer.clone();
        let subscribers = Arc::clone(&self.subscribers);

        tokio::spawn(async move {
            let handler = ConnectionHandler::new(
                reader,
                writer,
                timer,
                Arc::clone(&subscribers),
                connection_number,
            );

            let client_id = handler.run().await;

            if let Some(id) = client_id {
                let mut subs = subscribers.write().await;
                if subs.remove(&id).is_some() {
                    debug!(client_id = %id, "Removed disconnected subscriber");
                }
            }
        });
    }

    /// Spawns the event broadcaster task.
    ///
    /// This task receives timer events and pushes them to all subscribed
    /// clients.
    fn spawn_event_broadcaster(&self) {
        let mut event_rx = self.timer.subscribe();
        let subscribers = Arc::clone(&self.subscribers);
        let cancel_token = self.cancel_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("Event broadcaster shutting down");
                        break;
                    }

                    result = event_rx.recv() => {
                        match result {
                            Ok(event) => {
                                broadcast_event(&subscribers, &event).await;
                            }
                            Err(broadcast::error::RecvError::Lagged(n)) => {
                                warn!(skipped = n, "Event broadcaster lagged, skipped events");
                            }
                            Err(broadcast::error::RecvError::Closed) => {
                                debug!("Event channel closed");
                                break;
                            }
                        }
                    }
                }
            }
        });
    }

    /// Returns the number of active subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Performs cleanup on shutdown.
    async fn cleanup(&self) {
        self.subscribers.write().await.clear();

        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(
                    socket = %self.socket_path.display(),
                    error = %e,
                    "Failed to remove socket file"
                );
            }
        }

        info!("Server cleanup complete");
    }
}

/// Maps a timer event to the push sent to subscribers.
pub fn push_for_event(event: &TimerEvent) -> DaemonMessage {
    match event {
        TimerEvent::Updated(view) => DaemonMessage::TimerUpdate(view.clone()),
        TimerEvent::CompletedCountChanged { count } => {
            DaemonMessage::CompletedPomodorosUpdate { count: *count }
        }
        TimerEvent::PhaseCompleted {
            completion,
            play_sound,
            show_notification,
        } => DaemonMessage::PhaseCompleted {
            completed: completion.completed,
            next: completion.next,
            play_sound: *play_sound,
            show_notification: *show_notification,
        },
        TimerEvent::Halted { reason } => DaemonMessage::error_with_code(reason, TICK_FAILED_CODE),
    }
}

/// Broadcasts an event to all subscribed clients.
async fn broadcast_event(subscribers: &SubscribersMap, event: &TimerEvent) {
    let msg = push_for_event(event);

    let json = match serde_json::to_string(&msg) {
        Ok(j) => j,
        Err(e) => {
            error!(error = %e, "Failed to serialize event");
            return;
        }
    };

    let subs = subscribers.read().await;
    let mut failed_clients = Vec::new();

    for (client_id, sub) in subs.iter() {
        if let Err(e) = connection::write_line(&sub.writer, &json).await {
            debug!(
                client_id = %client_id,
                error = %e,
                "Failed to send event to subscriber"
            );
            failed_clients.push(client_id.clone());
        }
    }

    // Remove failed clients (need to drop read lock first)
    drop(subs);

    if !failed_clients.is_empty() {
        let mut subs = subscribers.write().await;
        for client_id in failed_clients {
            subs.remove(&client_id);
            debug!(client_id = %client_id, "Removed failed subscriber");
        }
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to setup socket at {path}: {error}")]
    SocketSetup { path: PathBuf, error: String },

    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pomo_core::{DurationConfig, Phase, PhaseCompletion, TimerSnapshot, TimerView};

    #[test]
    fn test_default_socket_path() {
        assert_eq!(DEFAULT_SOCKET_PATH, "/tmp/pomo.sock");
    }

    #[test]
    fn test_server_error_display() {
        let err = ServerError::SocketSetup {
            path: PathBuf::from("/tmp/test.sock"),
            error: "permission denied".to_string(),
        };
        assert!(err.to_string().contains("/tmp/test.sock"));
        assert!(err.to_string().contains("permission denied"));
    }

    #[test]
    fn test_events_map_to_pushes() {
        let view = TimerView::new(&TimerSnapshot::new(&DurationConfig::default()), 2);
        assert!(matches!(
            push_for_event(&TimerEvent::Updated(view)),
            DaemonMessage::TimerUpdate(v) if v.completed_pomodoros == 2
        ));

        assert_eq!(
            push_for_event(&TimerEvent::CompletedCountChanged { count: 4 }),
            DaemonMessage::CompletedPomodorosUpdate { count: 4 }
        );

        let push = push_for_event(&TimerEvent::PhaseCompleted {
            completion: PhaseCompletion {
                completed: Phase::Work,
                next: Phase::Break,
            },
            play_sound: true,
            show_notification: false,
        });
        assert_eq!(
            push,
            DaemonMessage::PhaseCompleted {
                completed: Phase::Work,
                next: Phase::Break,
                play_sound: true,
                show_notification: false,
            }
        );
        assert!(push.is_push());
    }

    #[test]
    fn test_halt_maps_to_coded_error() {
        let push = push_for_event(&TimerEvent::Halted {
            reason: "stored runState is invalid".to_string(),
        });
        assert_eq!(
            push,
            DaemonMessage::error_with_code("stored runState is invalid", "tick_failed")
        );
    }
}
