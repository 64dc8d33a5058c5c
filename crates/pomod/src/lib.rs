//! pomo Daemon - Timer owner, persistence and broadcast server
//!
//! This crate provides the core infrastructure for the pomo daemon:
//! - `timer` - the single timer actor, its countdown driver and daily check
//! - `persistence` - typed load/save of timer state over a key-value store
//! - `store` - key-value store backends (JSON file, in-memory)
//! - `server` - Unix socket server for client connections
//! - `config` - daemon configuration (file + environment)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        pomod daemon                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │  DaemonServer   │────▶│        TimerActor           │   │
//! │  │ (Unix Socket)   │     │   (single timer owner)      │   │
//! │  └────────┬────────┘     └───────┬──────────────┬──────┘   │
//! │           │                      │              │          │
//! │           │ connections          │ events       │ load/save│
//! │           ▼                      ▼              ▼          │
//! │  ┌─────────────────┐  ┌──────────────────┐ ┌────────────┐  │
//! │  │ConnectionHandler│  │ broadcast::Sender│ │ Persistence│  │
//! │  │  (per client)   │  │ (to subscribers) │ │  (store)   │  │
//! │  └─────────────────┘  └──────────────────┘ └────────────┘  │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod config;
pub mod persistence;
pub mod server;
pub mod store;
pub mod timer;
