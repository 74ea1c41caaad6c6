//! Process-wide schema content cache

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{watch, RwLock};

/// Maps a schema URI to the content of its last successful fetch.
///
/// Only successful fetches are stored; a miss means "not fetched yet" and a
/// failed fetch leaves the cache untouched so a later call can retry. Entries
/// are never invalidated, only overwritten. Every insert bumps a version
/// counter that observers can follow through [`SchemaCache::subscribe`].
#[derive(Debug)]
pub struct SchemaCache {
    entries: RwLock<HashMap<String, Arc<Value>>>,
    version: watch::Sender<u64>,
}

impl SchemaCache {
    /// Create a new empty cache
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            entries: RwLock::new(HashMap::new()),
            version,
        }
    }

    /// Look up the cached content of `uri`
    pub async fn get(&self, uri: &str) -> Option<Arc<Value>> {
        self.entries.read().await.get(uri).cloned()
    }

    /// Store the content fetched for `uri`
    pub async fn insert(&self, uri: String, schema: Arc<Value>) {
        self.entries.write().await.insert(uri, schema);
        self.version.send_modify(|version| *version += 1);
    }

    /// Number of cached schemas
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the cache holds no schema
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Current version; increases on every insert
    pub fn version(&self) -> u64 {
        *self.version.borrow()
    }

    /// Receive a notification whenever the cache changes
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.version.subscribe()
    }
}

impl Default for SchemaCache {
    fn default() -> Self {
        Self::new()
    }
}
