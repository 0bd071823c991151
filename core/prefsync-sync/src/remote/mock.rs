//! A scriptable remote config client for testing.

use super::{RawSnapshot, RemoteConfigClient, RemoteSettings, SnapshotReader};
use crate::error::{SyncError, SyncResult};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Default)]
struct MockState {
    settings: RemoteSettings,
    /// What the service would return on the next successful fetch.
    remote: RawSnapshot,
    staged: Option<RawSnapshot>,
    active: RawSnapshot,
    failures_remaining: u32,
    fail_always: bool,
    fetch_delay: Duration,
    fetch_count: u32,
    activation_count: u32,
    requested_expirations: Vec<Option<Duration>>,
}

/// In-memory remote config client.
///
/// Fetches copy the scripted remote values into the staged snapshot; reads go
/// to the active snapshot, exactly like a real client.
#[derive(Debug, Default)]
pub struct MockRemoteConfig {
    state: Mutex<MockState>,
}

impl MockRemoteConfig {
    /// Creates a client with no remote values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a client whose service holds `values`.
    pub fn with_values<K, V>(values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mock = Self::new();
        mock.state().remote = values.into_iter().collect();
        mock
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets a value on the service side; visible after the next fetch and activate.
    pub fn set_remote(&self, name: impl Into<String>, raw: impl Into<String>) {
        self.state().remote.insert(name, raw);
    }

    /// Replaces the active snapshot directly, bypassing fetch.
    pub fn set_active(&self, snapshot: RawSnapshot) {
        self.state().active = snapshot;
    }

    /// Makes the next `n` fetches fail.
    pub fn fail_next(&self, n: u32) {
        self.state().failures_remaining = n;
    }

    /// Makes every fetch fail until [`recover`](Self::recover) is called.
    pub fn fail_always(&self) {
        self.state().fail_always = true;
    }

    /// Clears any scripted failures.
    pub fn recover(&self) {
        let mut state = self.state();
        state.fail_always = false;
        state.failures_remaining = 0;
    }

    /// Makes each fetch take `delay` before completing.
    pub fn set_fetch_delay(&self, delay: Duration) {
        self.state().fetch_delay = delay;
    }

    /// Number of fetches issued.
    pub fn fetch_count(&self) -> u32 {
        self.state().fetch_count
    }

    /// Number of activations that replaced the active snapshot.
    pub fn activation_count(&self) -> u32 {
        self.state().activation_count
    }

    /// Cache expirations passed to each fetch, in call order.
    pub fn requested_expirations(&self) -> Vec<Option<Duration>> {
        self.state().requested_expirations.clone()
    }

    /// Whether a fetched snapshot is waiting for activation.
    pub fn has_staged(&self) -> bool {
        self.state().staged.is_some()
    }
}

#[async_trait]
impl RemoteConfigClient for MockRemoteConfig {
    fn configure(&self, settings: RemoteSettings) {
        self.state().settings = settings;
    }

    fn settings(&self) -> RemoteSettings {
        self.state().settings
    }

    async fn fetch(&self, cache_expiration: Option<Duration>) -> SyncResult<()> {
        let delay = {
            let mut state = self.state();
            state.fetch_count += 1;
            state.requested_expirations.push(cache_expiration);
            state.fetch_delay
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if state.fail_always {
            return Err(SyncError::Fetch("mock service unavailable".to_string()));
        }
        if state.failures_remaining > 0 {
            state.failures_remaining -= 1;
            return Err(SyncError::Fetch("mock fetch failure".to_string()));
        }
        let fetched = state.remote.clone();
        state.staged = Some(fetched);
        Ok(())
    }

    fn activate(&self) -> bool {
        let mut state = self.state();
        match state.staged.take() {
            Some(snapshot) => {
                state.active = snapshot;
                state.activation_count += 1;
                true
            }
            None => false,
        }
    }
}

impl SnapshotReader for MockRemoteConfig {
    fn keys_with_prefix(&self, prefix: &str) -> BTreeSet<String> {
        self.state().active.keys_with_prefix(prefix)
    }

    fn get_bool(&self, name: &str) -> bool {
        self.state().active.get_bool(name)
    }

    fn get_string(&self, name: &str) -> String {
        self.state().active.get_string(name)
    }

    fn get_i64(&self, name: &str) -> i64 {
        self.state().active.get_i64(name)
    }

    fn get_f64(&self, name: &str) -> f64 {
        self.state().active.get_f64(name)
    }
}
