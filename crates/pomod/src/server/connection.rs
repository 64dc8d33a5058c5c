//! Connection handler for individual client connections.
//!
//! Each client connection gets its own `ConnectionHandler` that:
//! - Performs protocol version negotiation
//! - Parses incoming messages
//! - Routes commands to the timer actor
//! - Registers the client for pushes when it subscribes
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations use `?`, pattern matching, or `unwrap_or`
//! - Connection errors are logged and result in graceful disconnect

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use pomo_protocol::{ClientMessage, DaemonMessage, MessageType, ProtocolVersion};

use super::MAX_SUBSCRIBERS;
use crate::timer::{TimerError, TimerHandle};

/// Type alias for subscriber writer handle
pub type SubscriberWriter = Arc<Mutex<BufWriter<OwnedWriteHalf>>>;

/// A client receiving timer pushes.
pub struct Subscriber {
    pub writer: SubscriberWriter,
}

/// Type alias for the subscribers map
pub type SubscribersMap = Arc<RwLock<HashMap<String, Subscriber>>>;

/// Maximum message size (1 MB)
const MAX_MESSAGE_SIZE: usize = 1_048_576;

/// Read timeout for idle connections (5 minutes)
const READ_TIMEOUT: Duration = Duration::from_secs(300);

/// Write timeout (10 seconds)
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Unique identifier for this connection
type ClientId = String;

/// Connection handler for a single client.
pub struct ConnectionHandler {
    /// Buffered reader for incoming messages
    reader: BufReader<OwnedReadHalf>,

    /// Buffered writer for outgoing messages (shared with the broadcaster)
    writer: SubscriberWriter,

    timer: TimerHandle,

    /// Shared subscribers map for event broadcasting
    subscribers: SubscribersMap,

    /// Unique client identifier (assigned after handshake)
    client_id: Option<ClientId>,

    subscribed: bool,

    connection_number: u64,
}

impl ConnectionHandler {
    pub fn new(
        reader: OwnedReadHalf,
        writer: OwnedWriteHalf,
        timer: TimerHandle,
        subscribers: SubscribersMap,
        connection_number: u64,
    ) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer: Arc::new(Mutex::new(BufWriter::new(writer))),
            timer,
            subscribers,
            client_id: None,
            subscribed: false,
            connection_number,
        }
    }

    /// Runs the connection handler.
    ///
    /// Performs the handshake, then processes messages until the connection
    /// closes. Returns the client ID so the server can drop its subscription.
    pub async fn run(mut self) -> Option<ClientId> {
        debug!(connection = self.connection_number, "New client connected");

        match self.handle_handshake().await {
            Ok(()) => {
                info!(
                    client_id = ?self.client_id,
                    "Client handshake completed"
                );
            }
            Err(e) => {
                warn!(
                    connection = self.connection_number,
                    error = %e,
                    "Handshake failed"
                );
                return None;
            }
        }

        let client_id = self.client_id.clone();

        if let Err(e) = self.process_messages().await {
            debug!(
                client_id = ?self.client_id,
                error = %e,
                "Connection closed"
            );
        }

        info!(client_id = ?self.client_id, "Client disconnected");
        client_id
    }

    /// Handles the initial protocol handshake.
    ///
    /// Expects a `Connect` message from the client, validates the protocol
    /// version, and responds with `Connected` or `Rejected`.
    async fn handle_handshake(&mut self) -> Result<(), ConnectionError> {
        let msg = match timeout(READ_TIMEOUT, self.read_message()).await {
            Ok(result) => result?,
            Err(_) => return Err(ConnectionError::Timeout),
        };

        let client_version = msg.protocol_version;
        if !client_version.is_compatible_with(&ProtocolVersion::CURRENT) {
            warn!(
                client_version = %client_version,
                server_version = %ProtocolVersion::CURRENT,
                "Protocol version mismatch"
            );

            self.send_message(DaemonMessage::rejected(&format!(
                "Protocol version {} not compatible with server version {}",
                client_version,
                ProtocolVersion::CURRENT
            )))
            .await?;

            return Err(ConnectionError::VersionMismatch {
                client: client_version,
                server: ProtocolVersion::CURRENT,
            });
        }

        match msg.message {
            MessageType::Connect { client_id } => {
                let assigned_id = client_id
                    .filter(|id| !id.is_empty())
                    .unwrap_or_else(|| format!("client-{}", self.connection_number));

                self.client_id = Some(assigned_id.clone());
                self.send_message(DaemonMessage::connected(assigned_id))
                    .await?;

                Ok(())
            }
            other => {
                self.send_message(DaemonMessage::rejected(
                    "Expected connect message for handshake",
                ))
                .await?;

                Err(ConnectionError::UnexpectedMessage(other.name().to_string()))
            }
        }
    }

    /// Main message processing loop.
    async fn process_messages(&mut self) -> Result<(), ConnectionError> {
        loop {
            let msg = match timeout(READ_TIMEOUT, self.read_message()).await {
                Ok(Ok(msg)) => msg,
                Ok(Err(ConnectionError::Eof)) => {
                    debug!(client_id = ?self.client_id, "Client sent EOF");
                    return Ok(());
                }
                Ok(Err(e @ ConnectionError::ParseError(_))) => {
                    // A malformed line does not end the session
                    warn!(client_id = ?self.client_id, error = %e, "Ignoring malformed message");
                    self.send_message(DaemonMessage::error_with_code(&e.to_string(), "parse_error"))
                        .await?;
                    continue;
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    debug!(client_id = ?self.client_id, "Connection timed out");
                    return Err(ConnectionError::Timeout);
                }
            };

            match self.handle_message(msg).await {
                Ok(()) => {}
                Err(ConnectionError::Eof) => return Ok(()),
                Err(e @ ConnectionError::Timer(_)) => {
                    error!(
                        client_id = ?self.client_id,
                        error = %e,
                        "Error handling message"
                    );
                    let _ = self
                        .send_message(DaemonMessage::error(&e.to_string()))
                        .await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Handles a single client message.
    async fn handle_message(&mut self, msg: ClientMessage) -> Result<(), ConnectionError> {
        let command = msg.message.name();
        debug!(client_id = ?self.client_id, command, "Handling command");

        match msg.message {
            MessageType::Connect { .. } => {
                self.send_message(DaemonMessage::error("Already connected"))
                    .await?;
            }

            MessageType::StartTimer => {
                self.timer.start().await?;
                self.send_message(DaemonMessage::ack(command)).await?;
            }

            MessageType::PauseTimer => {
                self.timer.pause().await?;
                self.send_message(DaemonMessage::ack(command)).await?;
            }

            MessageType::ResetTimer => {
                self.timer.reset().await?;
                self.send_message(DaemonMessage::ack(command)).await?;
            }

            MessageType::GetState => {
                let view = self.timer.get_state().await?;
                self.send_message(DaemonMessage::State(view)).await?;
            }

            MessageType::GetStats => {
                let stats = self.timer.get_stats().await?;
                self.send_message(DaemonMessage::Stats(stats)).await?;
            }

            MessageType::CheckAndReset => {
                let count = self.timer.check_and_reset().await?;
                debug!(client_id = ?self.client_id, count, "Daily counter checked");
                self.send_message(DaemonMessage::ack(command)).await?;
            }

            MessageType::Configure { settings } => {
                let effective = self.timer.configure(settings).await?;
                self.send_message(DaemonMessage::Settings(effective)).await?;
            }

            MessageType::GetSettings => {
                let settings = self.timer.get_settings().await?;
                self.send_message(DaemonMessage::Settings(settings)).await?;
            }

            MessageType::Subscribe => self.handle_subscribe().await?,

            MessageType::Unsubscribe => {
                if let Some(ref client_id) = self.client_id {
                    self.subscribers.write().await.remove(client_id);
                }
                self.subscribed = false;

                debug!(client_id = ?self.client_id, "Client unsubscribed from updates");
                self.send_message(DaemonMessage::ack(command)).await?;
            }

            MessageType::Ping { seq } => {
                self.send_message(DaemonMessage::pong(seq)).await?;
            }

            MessageType::Disconnect => {
                debug!(client_id = ?self.client_id, "Client requested disconnect");
                return Err(ConnectionError::Eof);
            }
        }

        Ok(())
    }

    /// Registers this client for pushes and sends the current state.
    async fn handle_subscribe(&mut self) -> Result<(), ConnectionError> {
        let Some(client_id) = self.client_id.clone() else {
            self.send_message(DaemonMessage::error("Must connect before subscribing"))
                .await?;
            return Ok(());
        };

        {
            let mut subs = self.subscribers.write().await;

            if subs.len() >= MAX_SUBSCRIBERS && !subs.contains_key(&client_id) {
                drop(subs);
                self.send_message(DaemonMessage::error_with_code(
                    &format!("Too many subscribers (max: {MAX_SUBSCRIBERS})"),
                    "too_many_subscribers",
                ))
                .await?;
                return Ok(());
            }

            subs.insert(
                client_id.clone(),
                Subscriber {
                    writer: Arc::clone(&self.writer),
                },
            );
        }

        self.subscribed = true;
        debug!(client_id = %client_id, "Client subscribed to updates");

        let view = self.timer.get_state().await?;
        self.send_message(DaemonMessage::State(view)).await
    }

    /// Reads a single message from the client.
    async fn read_message(&mut self) -> Result<ClientMessage, ConnectionError> {
        let mut line = String::new();

        let bytes_read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|e| ConnectionError::Io(e.to_string()))?;

        if bytes_read == 0 {
            return Err(ConnectionError::Eof);
        }

        if line.len() > MAX_MESSAGE_SIZE {
            return Err(ConnectionError::MessageTooLarge {
                size: line.len(),
                max: MAX_MESSAGE_SIZE,
            });
        }

        let msg: ClientMessage = serde_json::from_str(&line)
            .map_err(|e| ConnectionError::ParseError(e.to_string()))?;

        debug!(
            client_id = ?self.client_id,
            message_type = msg.message.name(),
            "Received message"
        );

        Ok(msg)
    }

    async fn send_message(&self, msg: DaemonMessage) -> Result<(), ConnectionError> {
        let json =
            serde_json::to_string(&msg).map_err(|e| ConnectionError::ParseError(e.to_string()))?;
        write_line(&self.writer, &json).await
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Returns the client ID (if connected).
    pub fn client_id(&self) -> Option<&str> {
        self.client_id.as_deref()
    }
}

/// Writes one newline-terminated JSON line, bounded by the write timeout.
pub(crate) async fn write_line(writer: &SubscriberWriter, json: &str) -> Result<(), ConnectionError> {
    let mut writer = writer.lock().await;

    match timeout(WRITE_TIMEOUT, async {
        writer.write_all(json.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
        Ok::<(), std::io::Error>(())
    })
    .await
    {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ConnectionError::Io(e.to_string())),
        Err(_) => Err(ConnectionError::WriteTimeout),
    }
}

/// Errors that can occur during connection handling.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("Protocol version mismatch: client {client}, server {server}")]
    VersionMismatch {
        client: ProtocolVersion,
        server: ProtocolVersion,
    },

    #[error("Unexpected message: {0}")]
    UnexpectedMessage(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Connection closed")]
    Eof,

    #[error("Read timeout")]
    Timeout,

    #[error("Write timeout")]
    WriteTimeout,

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Timer error: {0}")]
    Timer(String),
}

impl From<TimerError> for ConnectionError {
    fn from(e: TimerError) -> Self {
        Self::Timer(e.to_string())
    }
}
