//! Durable key-value storage behind the timer.
//!
//! The store is shared storage, not an owner: the timer actor reads what it
//! needs at the start of each command and writes the result back at the end.
//! Nothing above this module holds a private copy across commands.
//!
//! Two backends are provided:
//! - `MemoryStore` - process-local, used by tests and `--ephemeral` runs
//! - `JsonFileStore` - a JSON object on disk, replaced atomically on each write

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

/// Values read from a store, keyed by the requested key.
///
/// Keys that are not present in the store are absent from the map.
pub type StoreValues = HashMap<String, Value>;

/// Asynchronous, string-keyed JSON value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads the given keys. Missing keys are simply left out of the result.
    async fn get(&self, keys: &[&str]) -> Result<StoreValues, StoreError>;

    /// Writes all entries as one operation: either every entry is stored or
    /// none is.
    async fn set_many(&self, entries: Map<String, Value>) -> Result<(), StoreError>;
}

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("store file {path} is not a JSON object: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("failed to encode store contents: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}
