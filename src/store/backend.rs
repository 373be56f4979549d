//! Storage backends for content collections.
//!
//! A backend persists one JSON document per collection name. It knows nothing
//! about records; [`super::Collection`] does the read-modify-write.

use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::{StoreError, StoreResult};

pub trait Backend: Send + Sync {
    /// Read the whole document for `collection`, `None` if nothing was stored yet.
    fn load(&self, collection: &str) -> StoreResult<Option<Value>>;

    /// Replace the whole document for `collection`.
    fn save(&self, collection: &str, data: &Value) -> StoreResult<()>;
}

/// One `<collection>.json` file per collection under a data directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, collection: &str) -> PathBuf {
        self.root.join(format!("{}.json", collection))
    }

    fn io_err(collection: &str, source: std::io::Error) -> StoreError {
        StoreError::Io {
            collection: collection.to_string(),
            source,
        }
    }
}

impl Backend for FileBackend {
    fn load(&self, collection: &str) -> StoreResult<Option<Value>> {
        let path = self.path_for(collection);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::io_err(collection, e)),
        };
        if content.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|source| StoreError::Serialization {
                collection: collection.to_string(),
                source,
            })
    }

    fn save(&self, collection: &str, data: &Value) -> StoreResult<()> {
        std::fs::create_dir_all(&self.root).map_err(|e| Self::io_err(collection, e))?;

        let content =
            serde_json::to_string_pretty(data).map_err(|source| StoreError::Serialization {
                collection: collection.to_string(),
                source,
            })?;

        // Write beside the target and rename so readers never see a torn file.
        let path = self.path_for(collection);
        let tmp = self.root.join(format!(".{}.json.tmp", collection));
        std::fs::write(&tmp, content).map_err(|e| Self::io_err(collection, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| Self::io_err(collection, e))?;

        tracing::debug!(collection, path = %path.display(), "collection persisted");
        Ok(())
    }
}

/// Process-local backend, used by tests and as a scratch store.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    documents: RwLock<HashMap<String, Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    fn load(&self, collection: &str) -> StoreResult<Option<Value>> {
        let documents = self.documents.read().unwrap_or_else(|e| e.into_inner());
        Ok(documents.get(collection).cloned())
    }

    fn save(&self, collection: &str, data: &Value) -> StoreResult<()> {
        let mut documents = self.documents.write().unwrap_or_else(|e| e.into_inner());
        documents.insert(collection.to_string(), data.clone());
        Ok(())
    }
}
