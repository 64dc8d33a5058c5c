//! Protocol message types for daemon communication.

use crate::version::ProtocolVersion;
use pomo_core::{Phase, SettingsUpdate, Statistics, TimerSettings, TimerView};
use serde::{Deserialize, Serialize};

/// Commands a client can send to the daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MessageType {
    /// Handshake; must be the first message on a connection.
    Connect {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
    },

    /// Start or resume the countdown.
    StartTimer,

    /// Pause a running countdown.
    PauseTimer,

    /// Back to a stopped, full-length work interval.
    ResetTimer,

    /// Request the current timer view.
    GetState,

    /// Request daily/weekly/monthly statistics.
    GetStats,

    /// Re-derive today's completion counter from the ledger.
    CheckAndReset,

    /// Change durations and feature flags. Absent fields are left as they are.
    Configure { settings: SettingsUpdate },

    /// Request the effective settings.
    GetSettings,

    /// Receive timer pushes on this connection.
    Subscribe,

    Unsubscribe,

    Ping { seq: u64 },

    /// Client disconnecting gracefully.
    Disconnect,
}

impl MessageType {
    /// The wire name of this message (its `type` tag).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::StartTimer => "startTimer",
            Self::PauseTimer => "pauseTimer",
            Self::ResetTimer => "resetTimer",
            Self::GetState => "getState",
            Self::GetStats => "getStats",
            Self::CheckAndReset => "checkAndReset",
            Self::Configure { .. } => "configure",
            Self::GetSettings => "getSettings",
            Self::Subscribe => "subscribe",
            Self::Unsubscribe => "unsubscribe",
            Self::Ping { .. } => "ping",
            Self::Disconnect => "disconnect",
        }
    }
}

/// Messages sent from client to daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMessage {
    pub protocol_version: ProtocolVersion,

    #[serde(flatten)]
    pub message: MessageType,
}

impl ClientMessage {
    /// Wraps a command with the current protocol version.
    pub fn new(message: MessageType) -> Self {
        Self {
            protocol_version: ProtocolVersion::CURRENT,
            message,
        }
    }

    pub fn connect(client_id: Option<String>) -> Self {
        Self::new(MessageType::Connect { client_id })
    }

    pub fn start_timer() -> Self {
        Self::new(MessageType::StartTimer)
    }

    pub fn pause_timer() -> Self {
        Self::new(MessageType::PauseTimer)
    }

    pub fn reset_timer() -> Self {
        Self::new(MessageType::ResetTimer)
    }

    pub fn get_state() -> Self {
        Self::new(MessageType::GetState)
    }

    pub fn get_stats() -> Self {
        Self::new(MessageType::GetStats)
    }

    pub fn check_and_reset() -> Self {
        Self::new(MessageType::CheckAndReset)
    }

    pub fn configure(settings: SettingsUpdate) -> Self {
        Self::new(MessageType::Configure { settings })
    }

    pub fn get_settings() -> Self {
        Self::new(MessageType::GetSettings)
    }

    pub fn subscribe() -> Self {
        Self::new(MessageType::Subscribe)
    }

    pub fn unsubscribe() -> Self {
        Self::new(MessageType::Unsubscribe)
    }

    pub fn ping(seq: u64) -> Self {
        Self::new(MessageType::Ping { seq })
    }

    pub fn disconnect() -> Self {
        Self::new(MessageType::Disconnect)
    }
}

/// Messages sent from daemon to clients.
///
/// `Connected` through `Error` answer a request; `TimerUpdate`,
/// `CompletedPomodorosUpdate` and `PhaseCompleted` are pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DaemonMessage {
    /// Connection accepted.
    Connected {
        protocol_version: ProtocolVersion,
        client_id: String,
    },

    /// Connection rejected (version mismatch, no handshake, ...).
    Rejected {
        reason: String,
        protocol_version: ProtocolVersion,
    },

    /// A command without a payload result was applied.
    Ack { command: String },

    /// Answer to `getState`.
    State(TimerView),

    /// Answer to `getStats`.
    Stats(Statistics),

    /// Answer to `getSettings` and `configure`.
    Settings(TimerSettings),

    Pong { seq: u64 },

    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<String>,
    },

    /// Pushed on every tick and transition.
    TimerUpdate(TimerView),

    /// Pushed when today's completion count changes.
    CompletedPomodorosUpdate { count: u32 },

    /// Pushed when a countdown reaches zero. Clients play the sound and show
    /// the notification when the flags ask for it.
    PhaseCompleted {
        completed: Phase,
        next: Phase,
        play_sound: bool,
        show_notification: bool,
    },
}

impl DaemonMessage {
    pub fn connected(client_id: String) -> Self {
        Self::Connected {
            protocol_version: ProtocolVersion::CURRENT,
            client_id,
        }
    }

    pub fn rejected(reason: &str) -> Self {
        Self::Rejected {
            reason: reason.to_string(),
            protocol_version: ProtocolVersion::CURRENT,
        }
    }

    pub fn ack(command: &str) -> Self {
        Self::Ack {
            command: command.to_string(),
        }
    }

    pub fn pong(seq: u64) -> Self {
        Self::Pong { seq }
    }

    pub fn error(message: &str) -> Self {
        Self::Error {
            message: message.to_string(),
            code: None,
        }
    }

    pub fn error_with_code(message: &str, code: &str) -> Self {
        Self::Error {
            message: message.to_string(),
            code: Some(code.to_string()),
        }
    }

    /// True for unsolicited pushes, false for request answers.
    pub fn is_push(&self) -> bool {
        matches!(
            self,
            Self::TimerUpdate(_) | Self::CompletedPomodorosUpdate { .. } | Self::PhaseCompleted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pomo_core::{DurationConfig, TimerSnapshot};
    use serde_json::json;

    #[test]
    fn test_command_tags_use_command_names() {
        let json = serde_json::to_value(ClientMessage::start_timer()).unwrap();
        assert_eq!(json["type"], "startTimer");
        assert_eq!(json["protocolVersion"], json!({"major": 1, "minor": 0}));

        for message in [
            MessageType::PauseTimer,
            MessageType::ResetTimer,
            MessageType::GetState,
            MessageType::GetStats,
            MessageType::CheckAndReset,
        ] {
            let json = serde_json::to_value(ClientMessage::new(message.clone())).unwrap();
            assert_eq!(json["type"], message.name());
        }
    }

    #[test]
    fn test_configure_parses_raw_durations() {
        let raw = r#"{"protocolVersion":{"major":1,"minor":0},"type":"configure","settings":{"workMinutes":"abc","soundEnabled":false}}"#;
        let parsed: ClientMessage = serde_json::from_str(raw).unwrap();

        match parsed.message {
            MessageType::Configure { settings } => {
                assert_eq!(settings.work_minutes, Some(json!("abc")));
                assert_eq!(settings.break_minutes, None);
                assert_eq!(settings.sound_enabled, Some(false));
            }
            other => panic!("Expected Configure, got {other:?}"),
        }
    }

    #[test]
    fn test_connect_field_is_camel_case() {
        let json = serde_json::to_string(&ClientMessage::connect(Some("cli".to_string()))).unwrap();
        assert!(json.contains("\"type\":\"connect\""));
        assert!(json.contains("\"clientId\":\"cli\""));
    }

    #[test]
    fn test_state_flattens_view() {
        let snapshot = TimerSnapshot::new(&DurationConfig::default());
        let msg = DaemonMessage::State(TimerView::new(&snapshot, 2));
        let json = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["type"], "state");
        assert_eq!(json["secondsRemaining"], 1500);
        assert_eq!(json["runState"], "stopped");
        assert_eq!(json["phase"], "work");
        assert_eq!(json["completedPomodoros"], 2);

        let back: DaemonMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_phase_completed_push() {
        let msg = DaemonMessage::PhaseCompleted {
            completed: Phase::Work,
            next: Phase::Break,
            play_sound: true,
            show_notification: false,
        };
        assert!(msg.is_push());
        assert!(!DaemonMessage::ack("startTimer").is_push());

        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "phaseCompleted");
        assert_eq!(json["playSound"], true);
        assert_eq!(json["showNotification"], false);
    }

    #[test]
    fn test_completed_count_push() {
        let json = serde_json::to_string(&DaemonMessage::CompletedPomodorosUpdate { count: 4 }).unwrap();
        assert!(json.contains("\"type\":\"completedPomodorosUpdate\""));
        assert!(json.contains("\"count\":4"));
    }

    #[test]
    fn test_settings_response_roundtrip() {
        let msg = DaemonMessage::Settings(TimerSettings::default());
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"workMinutes\":25"));
        let back: DaemonMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
    }
}
