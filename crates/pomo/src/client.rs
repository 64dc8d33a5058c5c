//! Daemon connection client.
//!
//! `PomoClient` holds one connection to `pomod`. It performs the handshake on
//! connect, then offers one method per command. Request methods skip any
//! pushes that arrive in between (a subscribed connection receives those at
//! any time) and turn `error` answers into `ClientError::Daemon`.
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()` outside tests.

use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::UnixStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use pomo_core::{SettingsUpdate, Statistics, TimerSettings, TimerView};
use pomo_protocol::{ClientMessage, DaemonMessage, ProtocolVersion};

use crate::error::{ClientError, Result};

/// Default socket path, shared with the daemon.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/pomo.sock";

/// Environment variable overriding the socket path.
pub const SOCKET_ENV: &str = "POMO_SOCKET";

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the daemon client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Path to the Unix socket where the daemon listens.
    pub socket_path: PathBuf,

    /// Upper bound on waiting for the answer to one request.
    pub request_timeout: Duration,

    /// Client id announced in the handshake; the daemon assigns one if unset.
    pub client_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            request_timeout: Duration::from_secs(5),
            client_id: None,
        }
    }
}

impl ClientConfig {
    /// Default config with `POMO_SOCKET` applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(socket) = std::env::var(SOCKET_ENV).ok().filter(|s| !s.is_empty()) {
            config.socket_path = PathBuf::from(socket);
        }
        config
    }
}

// ============================================================================
// Pomo Client
// ============================================================================

/// A connected, handshaken client.
pub struct PomoClient {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    client_id: String,
    request_timeout: Duration,
    next_seq: u64,
}

impl PomoClient {
    /// Connects to the daemon and completes the handshake.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        debug!(socket_path = %config.socket_path.display(), "Connecting to daemon");

        let stream = UnixStream::connect(&config.socket_path)
            .await
            .map_err(|e| ClientError::DaemonConnection {
                socket: config.socket_path.display().to_string(),
                reason: e.to_string(),
            })?;

        let (reader, writer) = stream.into_split();
        let mut client = Self {
            reader: BufReader::new(reader),
            writer,
            client_id: String::new(),
            request_timeout: config.request_timeout,
            next_seq: 0,
        };

        client.handshake(config.client_id.clone()).await?;
        Ok(client)
    }

    async fn handshake(&mut self, client_id: Option<String>) -> Result<()> {
        self.send(&ClientMessage::connect(client_id)).await?;

        match self.recv_within().await? {
            DaemonMessage::Connected {
                protocol_version,
                client_id,
            } => {
                if !ProtocolVersion::CURRENT.is_compatible_with(&protocol_version) {
                    return Err(ClientError::VersionMismatch {
                        client_version: ProtocolVersion::CURRENT.to_string(),
                        daemon_version: protocol_version.to_string(),
                    });
                }
                info!(client_id, protocol_version = %protocol_version, "Handshake complete");
                self.client_id = client_id;
                Ok(())
            }
            DaemonMessage::Rejected {
                reason,
                protocol_version,
            } => {
                if protocol_version.is_compatible_with(&ProtocolVersion::CURRENT) {
                    Err(ClientError::Rejected(reason))
                } else {
                    Err(ClientError::VersionMismatch {
                        client_version: ProtocolVersion::CURRENT.to_string(),
                        daemon_version: protocol_version.to_string(),
                    })
                }
            }
            other => Err(unexpected("connect", &other)),
        }
    }

    /// The id the daemon knows this connection by.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Starts or resumes the timer.
    pub async fn start(&mut self) -> Result<()> {
        self.expect_ack(ClientMessage::start_timer()).await
    }

    pub async fn pause(&mut self) -> Result<()> {
        self.expect_ack(ClientMessage::pause_timer()).await
    }

    pub async fn reset(&mut self) -> Result<()> {
        self.expect_ack(ClientMessage::reset_timer()).await
    }

    /// Asks the daemon to re-derive today's counter.
    pub async fn check_and_reset(&mut self) -> Result<()> {
        self.expect_ack(ClientMessage::check_and_reset()).await
    }

    pub async fn state(&mut self) -> Result<TimerView> {
        match self.request(ClientMessage::get_state()).await? {
            DaemonMessage::State(view) => Ok(view),
            other => Err(unexpected("getState", &other)),
        }
    }

    pub async fn stats(&mut self) -> Result<Statistics> {
        match self.request(ClientMessage::get_stats()).await? {
            DaemonMessage::Stats(stats) => Ok(stats),
            other => Err(unexpected("getStats", &other)),
        }
    }

    pub async fn settings(&mut self) -> Result<TimerSettings> {
        match self.request(ClientMessage::get_settings()).await? {
            DaemonMessage::Settings(settings) => Ok(settings),
            other => Err(unexpected("getSettings", &other)),
        }
    }

    /// Applies a settings change and returns the effective settings.
    pub async fn configure(&mut self, update: SettingsUpdate) -> Result<TimerSettings> {
        match self.request(ClientMessage::configure(update)).await? {
            DaemonMessage::Settings(settings) => Ok(settings),
            other => Err(unexpected("configure", &other)),
        }
    }

    /// Round-trips a ping, returning the time it took.
    pub async fn ping(&mut self) -> Result<Duration> {
        self.next_seq = self.next_seq.wrapping_add(1);
        let seq = self.next_seq;
        let started = tokio::time::Instant::now();

        match self.request(ClientMessage::ping(seq)).await? {
            DaemonMessage::Pong { seq: got } if got == seq => Ok(started.elapsed()),
            other => Err(unexpected("ping", &other)),
        }
    }

    // ========================================================================
    // Subscription
    // ========================================================================

    /// Subscribes to pushes and returns the current state.
    pub async fn subscribe(&mut self) -> Result<TimerView> {
        match self.request(ClientMessage::subscribe()).await? {
            DaemonMessage::State(view) => Ok(view),
            other => Err(unexpected("subscribe", &other)),
        }
    }

    /// Waits for the next message from the daemon, without a timeout.
    ///
    /// Returns `Ok(None)` when the daemon closes the connection.
    pub async fn next_message(&mut self) -> Result<Option<DaemonMessage>> {
        match self.recv().await {
            Ok(msg) => Ok(Some(msg)),
            Err(ClientError::Closed) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Tells the daemon this connection is done.
    pub async fn disconnect(mut self) -> Result<()> {
        self.send(&ClientMessage::disconnect()).await
    }

    // ========================================================================
    // Wire
    // ========================================================================

    async fn expect_ack(&mut self, msg: ClientMessage) -> Result<()> {
        let command = msg.message.name();
        match self.request(msg).await? {
            DaemonMessage::Ack { command: acked } if acked == command => Ok(()),
            other => Err(unexpected(command, &other)),
        }
    }

    /// Sends a request and returns its answer.
    async fn request(&mut self, msg: ClientMessage) -> Result<DaemonMessage> {
        self.send(&msg).await?;

        loop {
            match self.recv_within().await? {
                push if push.is_push() => {
                    debug!(message = ?push, "Skipping push while waiting for answer");
                }
                DaemonMessage::Error { message, code } => {
                    return Err(ClientError::Daemon { message, code });
                }
                answer => return Ok(answer),
            }
        }
    }

    async fn send(&mut self, message: &ClientMessage) -> Result<()> {
        let json = serde_json::to_string(message)?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        debug!(message_type = message.message.name(), "Sent message to daemon");
        Ok(())
    }

    async fn recv_within(&mut self) -> Result<DaemonMessage> {
        timeout(self.request_timeout, self.recv())
            .await
            .map_err(|_| ClientError::Timeout)?
    }

    async fn recv(&mut self) -> Result<DaemonMessage> {
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line).await? == 0 {
                return Err(ClientError::Closed);
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            match serde_json::from_str(trimmed) {
                Ok(msg) => return Ok(msg),
                Err(e) => {
                    // A newer daemon may send message types this client does not know
                    warn!(error = %e, line = %trimmed, "Ignoring unreadable message");
                }
            }
        }
    }
}

fn unexpected(command: &str, got: &DaemonMessage) -> ClientError {
    ClientError::ProtocolError(format!("unexpected answer to {command}: {got:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pomo_core::{DurationConfig, TimerSnapshot};
    use pomo_protocol::MessageType;
    use tokio::net::UnixListener;

    /// A scripted daemon: answers each request line with the next reply.
    async fn fake_daemon(
        listener: UnixListener,
        replies: Vec<Vec<DaemonMessage>>,
    ) -> Vec<ClientMessage> {
        let (stream, _) = listener.accept().await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);
        let mut received = Vec::new();

        for batch in replies {
            let mut line = String::new();
            if reader.read_line(&mut line).await.unwrap() == 0 {
                break;
            }
            received.push(serde_json::from_str(line.trim()).unwrap());

            for reply in batch {
                let json = serde_json::to_string(&reply).unwrap();
                writer.write_all(json.as_bytes()).await.unwrap();
                writer.write_all(b"\n").await.unwrap();
            }
        }
        received
    }

    fn test_config(dir: &tempfile::TempDir) -> (ClientConfig, UnixListener) {
        let socket_path = dir.path().join("pomo.sock");
        let listener = UnixListener::bind(&socket_path).unwrap();
        let config = ClientConfig {
            socket_path,
            ..ClientConfig::default()
        };
        (config, listener)
    }

    fn view() -> TimerView {
        TimerView::new(&TimerSnapshot::new(&DurationConfig::default()), 3)
    }

    #[tokio::test]
    async fn test_connect_and_request_skip_pushes() {
        let dir = tempfile::tempdir().unwrap();
        let (config, listener) = test_config(&dir);

        let daemon = tokio::spawn(fake_daemon(
            listener,
            vec![
                vec![DaemonMessage::connected("client-0".to_string())],
                vec![
                    DaemonMessage::TimerUpdate(view()),
                    DaemonMessage::CompletedPomodorosUpdate { count: 3 },
                    DaemonMessage::State(view()),
                ],
            ],
        ));

        let mut client = PomoClient::connect(&config).await.unwrap();
        assert_eq!(client.client_id(), "client-0");

        let state = client.state().await.unwrap();
        assert_eq!(state.completed_pomodoros, 3);

        let received = daemon.await.unwrap();
        assert!(matches!(received[0].message, MessageType::Connect { .. }));
        assert!(matches!(received[1].message, MessageType::GetState));
    }

    #[tokio::test]
    async fn test_error_answer_becomes_daemon_error() {
        let dir = tempfile::tempdir().unwrap();
        let (config, listener) = test_config(&dir);

        tokio::spawn(fake_daemon(
            listener,
            vec![
                vec![DaemonMessage::connected("c".to_string())],
                vec![DaemonMessage::error_with_code("boom", "tick_failed")],
            ],
        ));

        let mut client = PomoClient::connect(&config).await.unwrap();
        match client.start().await {
            Err(ClientError::Daemon { message, code }) => {
                assert_eq!(message, "boom");
                assert_eq!(code.as_deref(), Some("tick_failed"));
            }
            other => panic!("expected daemon error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_mismatched_ack_is_protocol_error() {
        let dir = tempfile::tempdir().unwrap();
        let (config, listener) = test_config(&dir);

        tokio::spawn(fake_daemon(
            listener,
            vec![
                vec![DaemonMessage::connected("c".to_string())],
                vec![DaemonMessage::ack("resetTimer")],
            ],
        ));

        let mut client = PomoClient::connect(&config).await.unwrap();
        assert!(matches!(
            client.pause().await,
            Err(ClientError::ProtocolError(_))
        ));
    }

    #[tokio::test]
    async fn test_rejected_handshake() {
        let dir = tempfile::tempdir().unwrap();
        let (config, listener) = test_config(&dir);

        tokio::spawn(fake_daemon(
            listener,
            vec![vec![DaemonMessage::rejected("go away")]],
        ));

        match PomoClient::connect(&config).await {
            Err(ClientError::Rejected(reason)) => assert_eq!(reason, "go away"),
            Err(e) => panic!("expected rejection, got {e}"),
            Ok(_) => panic!("expected rejection"),
        }
    }

    #[tokio::test]
    async fn test_missing_socket_is_connection_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig {
            socket_path: dir.path().join("absent.sock"),
            ..ClientConfig::default()
        };

        match PomoClient::connect(&config).await {
            Err(e) => assert!(e.is_connection_error()),
            Ok(_) => panic!("expected connection failure"),
        }
    }

    #[tokio::test]
    async fn test_closed_connection_ends_stream() {
        let dir = tempfile::tempdir().unwrap();
        let (config, listener) = test_config(&dir);

        let daemon = tokio::spawn(fake_daemon(
            listener,
            vec![vec![DaemonMessage::connected("c".to_string())]],
        ));

        let mut client = PomoClient::connect(&config).await.unwrap();
        daemon.await.unwrap();

        assert!(client.next_message().await.unwrap().is_none());
    }
}
