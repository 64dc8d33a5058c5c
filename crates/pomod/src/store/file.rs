//! JSON file store.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{KeyValueStore, StoreError, StoreValues};

/// A `KeyValueStore` persisted as a single JSON object.
///
/// Reads are served from an in-memory mirror. Every write serializes the
/// whole object to a sibling temp file and renames it over the original, so
/// the file on disk is always either the old or the new version.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    data: Mutex<Map<String, Value>>,
}

impl JsonFileStore {
    /// Opens the store at `path`, creating an empty one if the file does not
    /// exist yet.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();

        let data = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => Map::new(),
            Ok(contents) => parse_object(&path, &contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No store file yet, starting empty");
                Map::new()
            }
            Err(source) => return Err(StoreError::Io { path, source }),
        };

        debug!(path = %path.display(), keys = data.len(), "Opened JSON store");

        Ok(Self {
            path,
            data: Mutex::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Atomically replaces the file with `data`.
    async fn flush(&self, data: &Map<String, Value>) -> Result<(), StoreError> {
        let io_err = |source: std::io::Error| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let contents = serde_json::to_vec_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");

        tokio::fs::write(&tmp, contents).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;

        Ok(())
    }
}

fn parse_object(path: &Path, contents: &str) -> Result<Map<String, Value>, StoreError> {
    match serde_json::from_str::<Value>(contents) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: format!("top-level value is {}", json_kind(&other)),
        }),
        Err(e) => Err(StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn get(&self, keys: &[&str]) -> Result<StoreValues, StoreError> {
        let data = self.data.lock().await;
        Ok(keys
            .iter()
            .filter_map(|key| data.get(*key).map(|value| (key.to_string(), value.clone())))
            .collect())
    }

    async fn set_many(&self, entries: Map<String, Value>) -> Result<(), StoreError> {
        let mut data = self.data.lock().await;

        // Commit to the mirror only once the file write succeeded.
        let mut next = data.clone();
        next.extend(entries);
        self.flush(&next).await?;
        *data = next;

        Ok(())
    }
}
