//! Content metadata fetched by URI, with `ipfs://` rewritten to an HTTP
//! gateway and a per-URI TTL cache.

use crate::config::EngineConfig;
use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error("unsupported uri: {0}")]
    UnsupportedUri(String),

    #[error("metadata request failed: {0}")]
    Transport(String),

    #[error("metadata server returned status {0}")]
    Http(u16),

    #[error("malformed metadata: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Image,
    Text,
    Link,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LinkPreview {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentMetadata {
    pub content_type: ContentType,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub link_preview: Option<LinkPreview>,
}

/// Translate `uri` into a fetchable HTTP(S) URL.
pub fn resolve_uri(uri: &str, gateway: &str) -> Result<String, MetadataError> {
    let uri = uri.trim();
    if let Some(cid) = uri.strip_prefix("ipfs://") {
        let cid = cid.trim_start_matches("ipfs/");
        if cid.is_empty() {
            return Err(MetadataError::UnsupportedUri(uri.to_string()));
        }
        let gateway = gateway.trim_end_matches('/');
        return Ok(format!("{gateway}/{cid}"));
    }
    if uri.starts_with("https://") || uri.starts_with("http://") {
        return Ok(uri.to_string());
    }
    Err(MetadataError::UnsupportedUri(uri.to_string()))
}

struct CacheEntry {
    metadata: Arc<ContentMetadata>,
    fetched_at: Instant,
}

pub struct MetadataStore {
    http: Client,
    gateway: String,
    ttl: Duration,
    cache: Mutex<HashMap<String, CacheEntry>>,
}

impl MetadataStore {
    pub fn new(config: &EngineConfig) -> Result<Self, MetadataError> {
        let http = Client::builder()
            .timeout(config.metadata_timeout)
            .build()
            .map_err(|e| MetadataError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            gateway: config.ipfs_gateway.clone(),
            ttl: config.metadata_ttl,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Metadata behind `uri`, served from cache while younger than the TTL.
    /// A miss also evicts every expired entry.
    pub async fn get(&self, uri: &str) -> Result<Arc<ContentMetadata>, MetadataError> {
        {
            let mut cache = self.cache.lock();
            if let Some(entry) = cache.get(uri) {
                if entry.fetched_at.elapsed() < self.ttl {
                    return Ok(entry.metadata.clone());
                }
            }
            cache.retain(|_, entry| entry.fetched_at.elapsed() < self.ttl);
        }

        let url = resolve_uri(uri, &self.gateway)?;
        debug!(%uri, %url, "fetching metadata");
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| MetadataError::Transport(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(MetadataError::Http(status.as_u16()));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| MetadataError::Transport(e.to_string()))?;
        let metadata: ContentMetadata =
            serde_json::from_slice(&body).map_err(|e| MetadataError::Malformed(e.to_string()))?;

        let metadata = Arc::new(metadata);
        self.cache.lock().insert(
            uri.to_string(),
            CacheEntry {
                metadata: metadata.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(metadata)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_uri() {
        let gateway = "https://ipfs.io/ipfs/";
        assert_eq!(
            resolve_uri("ipfs://bafyabc", gateway).unwrap(),
            "https://ipfs.io/ipfs/bafyabc"
        );
        assert_eq!(
            resolve_uri("ipfs://ipfs/bafyabc/meta.json", gateway).unwrap(),
            "https://ipfs.io/ipfs/bafyabc/meta.json"
        );
        assert_eq!(
            resolve_uri("https://example.com/a.json", gateway).unwrap(),
            "https://example.com/a.json"
        );
        assert!(matches!(
            resolve_uri("ar://xyz", gateway),
            Err(MetadataError::UnsupportedUri(_))
        ));
        assert!(resolve_uri("ipfs://", gateway).is_err());
    }

    fn store(gateway: &str) -> MetadataStore {
        let config = EngineConfig::default().with_ipfs_gateway(gateway);
        MetadataStore::new(&config).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_is_cached() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/bafyabc")
            .with_status(200)
            .with_body(r#"{"contentType": "text", "name": "gm", "text": "hello"}"#)
            .expect(1)
            .create_async()
            .await;

        let store = store(&format!("{}/", server.url()));
        let first = store.get("ipfs://bafyabc").await.unwrap();
        let second = store.get("ipfs://bafyabc").await.unwrap();

        mock.assert_async().await;
        assert_eq!(first.content_type, ContentType::Text);
        assert_eq!(first.text.as_deref(), Some("hello"));
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_expired_entries_evicted_on_miss() {
        let mut server = mockito::Server::new_async().await;
        let first = server
            .mock("GET", "/bafyone")
            .with_status(200)
            .with_body(r#"{"contentType": "text", "text": "one"}"#)
            .expect(1)
            .create_async()
            .await;
        let second = server
            .mock("GET", "/bafytwo")
            .with_status(200)
            .with_body(r#"{"contentType": "text", "text": "two"}"#)
            .expect(2)
            .create_async()
            .await;

        let mut config = EngineConfig::default().with_ipfs_gateway(server.url());
        config.metadata_ttl = Duration::from_millis(50);
        let store = MetadataStore::new(&config).unwrap();

        store.get("ipfs://bafyone").await.unwrap();
        store.get("ipfs://bafytwo").await.unwrap();
        assert_eq!(store.cache.lock().len(), 2);

        tokio::time::sleep(Duration::from_millis(80)).await;
        let refetched = store.get("ipfs://bafytwo").await.unwrap();

        assert_eq!(refetched.text.as_deref(), Some("two"));
        assert_eq!(store.cache.lock().len(), 1);
        assert!(!store.cache.lock().contains_key("ipfs://bafyone"));
        first.assert_async().await;
        second.assert_async().await;
    }

    #[tokio::test]
    async fn test_unexpected_shape_is_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/bafybad")
            .with_status(200)
            .with_body(r#"{"contentType": "video"}"#)
            .create_async()
            .await;

        let err = store(&server.url()).get("ipfs://bafybad").await.unwrap_err();
        assert!(matches!(err, MetadataError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_http_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let err = store(&server.url()).get("ipfs://missing").await.unwrap_err();
        assert_eq!(err, MetadataError::Http(404));
    }
}
