//! pomo client library.
//!
//! Talks to the `pomod` daemon over its Unix socket:
//! - `client` - connection, handshake and one method per command
//! - `daemon` - PID file lookup and daemon autostart
//! - `render` - terminal text for state, settings and statistics
//! - `error` - `ClientError`

pub mod client;
pub mod daemon;
pub mod error;
pub mod render;

pub use client::{ClientConfig, PomoClient, DEFAULT_SOCKET_PATH, SOCKET_ENV};
pub use error::{ClientError, Result};
