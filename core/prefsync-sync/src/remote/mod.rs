//! Remote config client abstraction.
//!
//! The reconciler talks to the remote configuration service through
//! [`RemoteConfigClient`]: fetch a snapshot, activate it, then read typed
//! values through the [`SnapshotReader`] accessors. Transports implement the
//! trait; [`HttpRemoteConfig`] speaks to a plain JSON endpoint and
//! [`mock::MockRemoteConfig`] is scriptable for tests.

mod http;
pub mod mock;

pub use http::{
    HttpRemoteConfig, HttpRemoteConfigConfig, DEFAULT_CLIENT_CACHE_EXPIRATION_SECS,
    DEFAULT_REQUEST_TIMEOUT_MS,
};

use crate::error::SyncResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Client settings pushed by the reconciler at construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSettings {
    /// Bypass the fetch cache entirely.
    pub developer_mode: bool,
}

/// Read access to the active snapshot.
///
/// `keys_with_prefix` may report longer names sharing the prefix, so callers
/// testing for a key must look for the exact name in the result. The typed
/// accessors never fail: a present value that does not parse as the requested
/// primitive reads as that primitive's default.
pub trait SnapshotReader {
    /// Names in the active snapshot starting with `prefix`.
    fn keys_with_prefix(&self, prefix: &str) -> BTreeSet<String>;

    /// Boolean value of `name`, `false` when absent or unparsable.
    fn get_bool(&self, name: &str) -> bool;

    /// Raw text of `name`, empty when absent.
    fn get_string(&self, name: &str) -> String;

    /// 64-bit integer value of `name`, `0` when absent or unparsable.
    fn get_i64(&self, name: &str) -> i64;

    /// 64-bit float value of `name`, `0.0` when absent or unparsable.
    fn get_f64(&self, name: &str) -> f64;
}

/// A remote configuration service.
#[async_trait]
pub trait RemoteConfigClient: SnapshotReader + Send + Sync {
    /// Replaces the client settings.
    fn configure(&self, settings: RemoteSettings);

    /// Current client settings.
    fn settings(&self) -> RemoteSettings;

    /// Fetches a new snapshot and stages it for activation.
    ///
    /// A previous fetch younger than `cache_expiration` may be reused instead
    /// of contacting the service. `None` uses the client's own default.
    async fn fetch(&self, cache_expiration: Option<Duration>) -> SyncResult<()>;

    /// Makes the staged snapshot current. Returns `false` when nothing was
    /// staged since the last activation.
    fn activate(&self) -> bool;
}

/// Raw key/value entries of a snapshot, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSnapshot {
    values: BTreeMap<String, String>,
}

impl RawSnapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a snapshot from a JSON object. String members are taken
    /// verbatim, any other member by its JSON text.
    pub fn from_json_object(object: &serde_json::Map<String, serde_json::Value>) -> Self {
        object
            .iter()
            .map(|(name, value)| {
                let raw = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (name.clone(), raw)
            })
            .collect()
    }

    /// Sets a raw value.
    pub fn insert(&mut self, name: impl Into<String>, raw: impl Into<String>) {
        self.values.insert(name.into(), raw.into());
    }

    /// Raw value of `name`.
    pub fn get_raw(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RawSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl SnapshotReader for RawSnapshot {
    fn keys_with_prefix(&self, prefix: &str) -> BTreeSet<String> {
        self.values
            .range(prefix.to_string()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn get_bool(&self, name: &str) -> bool {
        self.get_raw(name).and_then(parse_bool).unwrap_or(false)
    }

    fn get_string(&self, name: &str) -> String {
        self.get_raw(name).unwrap_or_default().to_string()
    }

    fn get_i64(&self, name: &str) -> i64 {
        self.get_raw(name)
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0)
    }

    fn get_f64(&self, name: &str) -> f64 {
        self.get_raw(name)
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(0.0)
    }
}

/// Parses the boolean spellings remote config services commonly accept.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}
