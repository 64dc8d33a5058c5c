//! pomo Protocol - Wire protocol for daemon communication
//!
//! Line-delimited JSON between `pomo` clients and the `pomod` daemon. Clients
//! send `ClientMessage`s (commands); the daemon answers each with exactly one
//! `DaemonMessage` and, for subscribers, pushes timer events unsolicited.

pub mod message;
pub mod version;

pub use message::{ClientMessage, DaemonMessage, MessageType};
pub use version::{ProtocolVersion, VersionError};
