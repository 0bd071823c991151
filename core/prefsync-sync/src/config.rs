//! Reconciler configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Freshness window for bounded fetches outside developer mode (1 hour).
pub const DEFAULT_CACHE_EXPIRATION_SECS: u64 = 60 * 60;
/// Delay between bounded fetch attempts.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;
/// Bounded fetch attempts per process.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Configuration for the reconciler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Developer mode forces every bounded fetch past the remote cache.
    pub developer_mode: bool,
    /// Freshness window passed to bounded fetches (in seconds).
    pub cache_expiration_secs: u64,
    /// Delay before a failed bounded fetch is retried (ms).
    pub retry_delay_ms: u64,
    /// Total bounded fetch attempts allowed by a budget built from this config.
    pub max_attempts: u32,
    /// Whether `refresh()` activates the fetched snapshot before reading it.
    pub activate_on_refresh: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            developer_mode: false,
            cache_expiration_secs: DEFAULT_CACHE_EXPIRATION_SECS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            activate_on_refresh: true,
        }
    }
}

impl ReconcilerConfig {
    /// Freshness window as a duration.
    pub fn cache_expiration(&self) -> Duration {
        Duration::from_secs(self.cache_expiration_secs)
    }

    /// Retry delay as a duration.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}
