//! Schema fetching with cache reuse and per-URI failure isolation

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinSet;

use super::cache::SchemaCache;
use super::resolver::uri_scheme;

/// Errors raised while fetching a single schema
#[derive(Error, Debug)]
pub enum SchemaFetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("schema is not valid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("unsupported schema URI: {0}")]
    UnsupportedScheme(String),

    #[error("fetch task failed: {0}")]
    Join(String),
}

/// Outcome of fetching one schema URI
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaEntry {
    /// Content from the cache or a successful fetch
    Fetched(Arc<Value>),
    /// The fetch was attempted and failed
    Failed(String),
}

impl SchemaEntry {
    pub fn schema(&self) -> Option<&Value> {
        match self {
            SchemaEntry::Fetched(schema) => Some(schema),
            SchemaEntry::Failed(_) => None,
        }
    }
}

/// Retrieves schema content by URI
#[tower_lsp::async_trait]
pub trait SchemaFetcher: Send + Sync {
    async fn fetch(&self, uri: &str) -> Result<Value, SchemaFetchError>;
}

/// Fetches `http(s)` schemas over the network and `file` schemas from disk
#[derive(Debug, Clone)]
pub struct HttpSchemaFetcher {
    client: reqwest::Client,
}

impl HttpSchemaFetcher {
    /// Create a fetcher whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self, SchemaFetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("td-lsp/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[tower_lsp::async_trait]
impl SchemaFetcher for HttpSchemaFetcher {
    async fn fetch(&self, uri: &str) -> Result<Value, SchemaFetchError> {
        match uri_scheme(uri) {
            Some("http") | Some("https") => {
                let response = self.client.get(uri).send().await?.error_for_status()?;
                Ok(response.json::<Value>().await?)
            }
            Some("file") => {
                let path = uri.trim_start_matches("file://");
                let text = tokio::fs::read_to_string(path).await?;
                Ok(serde_json::from_str(&text)?)
            }
            _ => Err(SchemaFetchError::UnsupportedScheme(uri.to_string())),
        }
    }
}

/// Fetch every URI in `uris`, reusing cached content.
///
/// Misses are fetched concurrently. Successful fetches populate the cache;
/// failures only appear in the returned map, so one bad URI neither blocks
/// the others nor poisons the cache.
pub async fn fetch_all(
    cache: &SchemaCache,
    fetcher: Arc<dyn SchemaFetcher>,
    uris: &BTreeSet<String>,
) -> BTreeMap<String, SchemaEntry> {
    let mut schemas = BTreeMap::new();
    let mut pending = JoinSet::new();

    for uri in uris {
        if let Some(schema) = cache.get(uri).await {
            schemas.insert(uri.clone(), SchemaEntry::Fetched(schema));
            continue;
        }

        let fetcher = Arc::clone(&fetcher);
        let uri = uri.clone();
        pending.spawn(async move {
            let result = fetcher.fetch(&uri).await;
            (uri, result)
        });
    }

    while let Some(joined) = pending.join_next().await {
        match joined {
            Ok((uri, Ok(schema))) => {
                tracing::debug!("Fetched schema {}", uri);
                let schema = Arc::new(schema);
                cache.insert(uri.clone(), Arc::clone(&schema)).await;
                schemas.insert(uri, SchemaEntry::Fetched(schema));
            }
            Ok((uri, Err(err))) => {
                tracing::warn!("Failed to fetch schema {}: {}", uri, err);
                schemas.insert(uri, SchemaEntry::Failed(err.to_string()));
            }
            Err(err) => {
                // The URI is lost with the task; anything still missing below is marked failed.
                tracing::warn!("Schema fetch task failed: {}", err);
            }
        }
    }

    for uri in uris {
        if !schemas.contains_key(uri) {
            let err = SchemaFetchError::Join(format!("no result for {uri}"));
            schemas.insert(uri.clone(), SchemaEntry::Failed(err.to_string()));
        }
    }

    schemas
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves canned schemas and counts fetches per URI
    #[derive(Default)]
    struct StubFetcher {
        schemas: HashMap<String, Value>,
        calls: Mutex<Vec<String>>,
    }

    #[tower_lsp::async_trait]
    impl SchemaFetcher for StubFetcher {
        async fn fetch(&self, uri: &str) -> Result<Value, SchemaFetchError> {
            self.calls.lock().unwrap().push(uri.to_string());
            self.schemas
                .get(uri)
                .cloned()
                .ok_or_else(|| SchemaFetchError::UnsupportedScheme(uri.to_string()))
        }
    }

    fn uris(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|u| u.to_string()).collect()
    }

    #[tokio::test]
    async fn test_partial_failure() {
        let mut stub = StubFetcher::default();
        stub.schemas.insert("good".to_string(), json!({"title": "good"}));
        let fetcher: Arc<dyn SchemaFetcher> = Arc::new(stub);
        let cache = SchemaCache::new();

        let result = fetch_all(&cache, fetcher, &uris(&["good", "bad"])).await;

        assert_eq!(result.len(), 2);
        assert_eq!(result["good"].schema(), Some(&json!({"title": "good"})));
        assert!(matches!(result["bad"], SchemaEntry::Failed(_)));
        assert!(cache.get("good").await.is_some());
        assert!(cache.get("bad").await.is_none());
    }

    #[tokio::test]
    async fn test_cache_hit_skips_fetch() {
        let stub = Arc::new(StubFetcher::default());
        let cache = SchemaCache::new();
        cache.insert("cached".to_string(), Arc::new(json!(true))).await;

        let fetcher: Arc<dyn SchemaFetcher> = stub.clone();
        let result = fetch_all(&cache, fetcher, &uris(&["cached"])).await;

        assert_eq!(result["cached"].schema(), Some(&json!(true)));
        assert!(stub.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_file_scheme() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        std::fs::write(&path, r#"{"type": "object"}"#).unwrap();

        let fetcher = HttpSchemaFetcher::new(Duration::from_secs(1)).unwrap();
        let schema = fetcher
            .fetch(&format!("file://{}", path.display()))
            .await
            .unwrap();
        assert_eq!(schema, json!({"type": "object"}));
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let fetcher = HttpSchemaFetcher::new(Duration::from_secs(1)).unwrap();
        let err = fetcher.fetch("urn:example:schema").await.unwrap_err();
        assert!(matches!(err, SchemaFetchError::UnsupportedScheme(_)));
    }
}
