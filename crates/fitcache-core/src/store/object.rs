//! Object-store backend: artifacts as objects under `<prefix>/trained_models/`.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use fitcache_state::Fingerprint;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ArtifactStore, Result, StoreError, StoredArtifact, TRAINED_MODELS_DIR};

/// Minimal key/value object API the artifact store needs.
#[async_trait]
pub trait ObjectClient: Send + Sync {
    async fn head(&self, key: &str) -> Result<bool>;

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()>;

    /// [`StoreError::NotFound`] when the key does not exist.
    async fn get(&self, key: &str) -> Result<Vec<u8>>;
}

/// Object store endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    /// Base URL, e.g. `https://objects.example.com`
    pub endpoint: String,
    pub bucket: String,
    /// Bearer token (optional for public buckets)
    pub token: Option<String>,
    /// Key prefix in front of `trained_models/`
    pub prefix: String,
}

impl ObjectStoreConfig {
    pub fn new(endpoint: &str, bucket: &str) -> Self {
        ObjectStoreConfig {
            endpoint: endpoint.to_string(),
            bucket: bucket.to_string(),
            token: None,
            prefix: String::new(),
        }
    }

    /// Read `FITCACHE_OBJECT_ENDPOINT`, `FITCACHE_OBJECT_BUCKET`,
    /// `FITCACHE_OBJECT_TOKEN` and `FITCACHE_OBJECT_PREFIX`.
    ///
    /// Returns `None` unless both endpoint and bucket are set.
    pub fn from_env() -> Option<Self> {
        let endpoint = std::env::var("FITCACHE_OBJECT_ENDPOINT").ok()?;
        let bucket = std::env::var("FITCACHE_OBJECT_BUCKET").ok()?;
        let mut config = Self::new(&endpoint, &bucket);
        config.token = std::env::var("FITCACHE_OBJECT_TOKEN").ok();
        config.prefix = std::env::var("FITCACHE_OBJECT_PREFIX").unwrap_or_default();
        Some(config)
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }
}

/// Object client speaking plain HTTP: `HEAD/PUT/GET <endpoint>/<bucket>/<key>`.
pub struct HttpObjectClient {
    config: ObjectStoreConfig,
    http_client: reqwest::Client,
}

impl HttpObjectClient {
    pub fn new(config: ObjectStoreConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("fitcache/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(HttpObjectClient {
            config,
            http_client,
        })
    }

    fn url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.bucket,
            key
        )
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ObjectClient for HttpObjectClient {
    async fn head(&self, key: &str) -> Result<bool> {
        let response = self
            .authorize(self.http_client.head(self.url(key)))
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            s => Err(StoreError::Http(format!("HEAD {key}: {s}"))),
        }
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let write_err = |reason: String| StoreError::Write {
            location: key.to_string(),
            reason,
        };
        let response = self
            .authorize(self.http_client.put(self.url(key)).body(body))
            .send()
            .await
            .map_err(|e| write_err(e.to_string()))?;
        if !response.status().is_success() {
            return Err(write_err(format!("PUT returned {}", response.status())));
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let response = self
            .authorize(self.http_client.get(self.url(key)))
            .send()
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Err(StoreError::NotFound(key.to_string())),
            s if s.is_success() => Ok(response.bytes().await?.to_vec()),
            s => Err(StoreError::Http(format!("GET {key}: {s}"))),
        }
    }
}

/// In-process object client backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryObjectClient {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryObjectClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sorted list of stored keys.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self
            .objects
            .lock()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>> {
        self.objects
            .lock()
            .map_err(|_| StoreError::Http("memory object client poisoned".to_string()))
    }
}

#[async_trait]
impl ObjectClient for MemoryObjectClient {
    async fn head(&self, key: &str) -> Result<bool> {
        Ok(self.lock()?.contains_key(key))
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        self.lock()?.insert(key.to_string(), body);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.lock()?
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }
}

/// Artifact store over any [`ObjectClient`].
///
/// Layout: key `<prefix>/trained_models/<fingerprint>`
pub struct ObjectArtifactStore<C> {
    client: C,
    prefix: String,
}

impl<C: ObjectClient> ObjectArtifactStore<C> {
    pub fn new(client: C, prefix: &str) -> Self {
        ObjectArtifactStore {
            client,
            prefix: prefix.trim_matches('/').to_string(),
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    fn key(&self, fingerprint: &Fingerprint) -> String {
        if self.prefix.is_empty() {
            format!("{TRAINED_MODELS_DIR}/{fingerprint}")
        } else {
            format!("{}/{TRAINED_MODELS_DIR}/{fingerprint}", self.prefix)
        }
    }
}

impl ObjectArtifactStore<HttpObjectClient> {
    /// HTTP-backed store using `config.prefix`.
    pub fn from_config(config: ObjectStoreConfig) -> Result<Self> {
        let prefix = config.prefix.clone();
        Ok(Self::new(HttpObjectClient::new(config)?, &prefix))
    }
}

#[async_trait]
impl<C: ObjectClient> ArtifactStore for ObjectArtifactStore<C> {
    fn locate(&self, fingerprint: &Fingerprint) -> String {
        self.key(fingerprint)
    }

    async fn exists(&self, fingerprint: &Fingerprint) -> Result<bool> {
        self.client.head(&self.key(fingerprint)).await
    }

    async fn write(&self, fingerprint: &Fingerprint, artifact: &StoredArtifact) -> Result<()> {
        let key = self.key(fingerprint);
        let bytes = artifact.to_bytes()?;
        let len = bytes.len();
        self.client.put(&key, bytes).await?;
        debug!(key = %key, bytes = len, "artifact uploaded");
        Ok(())
    }

    async fn load(&self, fingerprint: &Fingerprint) -> Result<StoredArtifact> {
        let bytes = self.client.get(&self.key(fingerprint)).await?;
        StoredArtifact::from_bytes(&bytes)
    }
}
