//! Remote config over a plain JSON endpoint.
//!
//! `GET {endpoint}` must return a JSON object whose members are the remote
//! keys. Fetched values are staged and only become readable after
//! [`RemoteConfigClient::activate`].

use super::{RawSnapshot, RemoteConfigClient, RemoteSettings, SnapshotReader};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Cache window applied by unbounded fetches (12 hours).
pub const DEFAULT_CLIENT_CACHE_EXPIRATION_SECS: u64 = 12 * 60 * 60;
/// Per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Configuration for the HTTP remote config client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpRemoteConfigConfig {
    /// URL returning the remote snapshot as a JSON object.
    pub endpoint: String,
    /// Cache window used when a fetch does not name one (in seconds).
    pub default_cache_expiration_secs: u64,
    /// Per-request timeout (ms).
    pub request_timeout_ms: u64,
}

impl Default for HttpRemoteConfigConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            default_cache_expiration_secs: DEFAULT_CLIENT_CACHE_EXPIRATION_SECS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl HttpRemoteConfigConfig {
    /// Config for `endpoint` with default timings.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }
}

/// Remote config client backed by an HTTP JSON endpoint.
pub struct HttpRemoteConfig {
    config: HttpRemoteConfigConfig,
    client: Client,
    settings: RwLock<RemoteSettings>,
    staged: RwLock<Option<RawSnapshot>>,
    active: RwLock<RawSnapshot>,
    last_fetch: RwLock<Option<Instant>>,
}

impl HttpRemoteConfig {
    /// Creates a client. Fails if the endpoint is empty or the HTTP client
    /// cannot be built.
    pub fn new(config: HttpRemoteConfigConfig) -> SyncResult<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(SyncError::Config("remote config endpoint is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            config,
            client,
            settings: RwLock::new(RemoteSettings::default()),
            staged: RwLock::new(None),
            active: RwLock::new(RawSnapshot::new()),
            last_fetch: RwLock::new(None),
        })
    }

    /// The configured endpoint.
    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    fn is_fresh(&self, expiration: Duration) -> bool {
        if self.settings().developer_mode || expiration.is_zero() {
            return false;
        }
        let last_fetch = *self.last_fetch.read().unwrap_or_else(PoisonError::into_inner);
        last_fetch.is_some_and(|at| at.elapsed() < expiration)
    }

    async fn download(&self) -> SyncResult<RawSnapshot> {
        let response = self
            .client
            .get(&self.config.endpoint)
            .send()
            .await
            .map_err(|e| SyncError::Fetch(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Fetch(format!("remote returned {status}: {body}")));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| SyncError::Fetch(format!("failed to parse snapshot: {e}")))?;

        match body {
            serde_json::Value::Object(object) => Ok(RawSnapshot::from_json_object(&object)),
            other => Err(SyncError::Fetch(format!(
                "snapshot must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    fn with_active<T>(&self, f: impl FnOnce(&RawSnapshot) -> T) -> T {
        f(&self.active.read().unwrap_or_else(PoisonError::into_inner))
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[async_trait]
impl RemoteConfigClient for HttpRemoteConfig {
    fn configure(&self, settings: RemoteSettings) {
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
    }

    fn settings(&self) -> RemoteSettings {
        *self.settings.read().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fetch(&self, cache_expiration: Option<Duration>) -> SyncResult<()> {
        let expiration = cache_expiration
            .unwrap_or(Duration::from_secs(self.config.default_cache_expiration_secs));

        if self.is_fresh(expiration) {
            debug!("Remote snapshot still fresh, skipping request");
            return Ok(());
        }

        debug!("Fetching remote config from {}", self.config.endpoint);
        let snapshot = self.download().await?;
        info!("Fetched {} remote config entries", snapshot.len());

        *self.staged.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
        *self.last_fetch.write().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
        Ok(())
    }

    fn activate(&self) -> bool {
        let staged = self
            .staged
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match staged {
            Some(snapshot) => {
                *self.active.write().unwrap_or_else(PoisonError::into_inner) = snapshot;
                true
            }
            None => false,
        }
    }
}

impl SnapshotReader for HttpRemoteConfig {
    fn keys_with_prefix(&self, prefix: &str) -> BTreeSet<String> {
        self.with_active(|s| s.keys_with_prefix(prefix))
    }

    fn get_bool(&self, name: &str) -> bool {
        self.with_active(|s| s.get_bool(name))
    }

    fn get_string(&self, name: &str) -> String {
        self.with_active(|s| s.get_string(name))
    }

    fn get_i64(&self, name: &str) -> i64 {
        self.with_active(|s| s.get_i64(name))
    }

    fn get_f64(&self, name: &str) -> f64 {
        self.with_active(|s| s.get_f64(name))
    }
}
