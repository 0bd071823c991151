//! Reconciler: fetch, decode every key, write through on change.
//!
//! Two triggers are offered:
//! - [`Reconciler::sync`] draws from a [`RetryBudget`] and keeps retrying a
//!   failed fetch after a fixed delay until the fetch succeeds or the budget
//!   runs out.
//! - [`Reconciler::refresh`] fetches once with the client's default cache
//!   window and gives up silently on failure. It is meant to be re-triggered
//!   from outside.
//!
//! Both return immediately with a [`JoinHandle`]; the fetch and the pass run
//! on the Tokio runtime. Keys are processed one after another in the order
//! they were supplied. Passes are not serialized against each other, so two
//! overlapping passes may race on a key and the last write wins.

use crate::budget::RetryBudget;
use crate::config::ReconcilerConfig;
use crate::decoder::{decode_key, Decoded};
use crate::gate::{ChangeGate, GateDecision};
use crate::remote::{RemoteConfigClient, RemoteSettings};
use prefsync_store::{PrefListener, PrefStore};
use prefsync_types::{PrefValue, TypedKey};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// Per-key results of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Keys whose value was written.
    pub written: Vec<String>,
    /// Keys whose stored value already matched.
    pub unchanged: Vec<String>,
    /// Keys missing from the snapshot.
    pub absent: Vec<String>,
    /// Keys present but decoding to no value.
    pub null: Vec<String>,
    /// Keys that failed to decode or store, with the error text.
    pub failed: Vec<(String, String)>,
}

impl PassReport {
    /// Number of keys this pass looked at.
    pub fn total(&self) -> usize {
        self.written.len()
            + self.unchanged.len()
            + self.absent.len()
            + self.null.len()
            + self.failed.len()
    }
}

/// How a triggered sync ended. Never carries an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A snapshot was fetched and every key was processed.
    Applied(PassReport),
    /// The fetch failed and no further attempt will be made by this trigger.
    FetchFailed,
    /// The retry budget was already spent; no fetch was issued.
    BudgetExhausted,
}

/// Store listener registered by [`Reconciler::listen`]. Store changes need no
/// reaction from the reconciler.
#[derive(Debug, Default)]
pub struct SyncListener;

impl PrefListener for SyncListener {
    fn on_put(&self, key: &TypedKey, _value: &PrefValue) {
        trace!("store put {}", key.name());
    }

    fn on_remove(&self, key: &TypedKey) {
        trace!("store remove {}", key.name());
    }
}

struct Inner {
    remote: Arc<dyn RemoteConfigClient>,
    gate: ChangeGate,
    keys: Vec<TypedKey>,
    budget: Arc<RetryBudget>,
    config: ReconcilerConfig,
}

/// Keeps a local preference store in step with a remote config service.
#[derive(Clone)]
pub struct Reconciler {
    inner: Arc<Inner>,
}

impl Reconciler {
    /// Creates a reconciler with its own retry budget of
    /// `config.max_attempts`.
    pub fn new(
        remote: Arc<dyn RemoteConfigClient>,
        store: Arc<dyn PrefStore>,
        keys: Vec<TypedKey>,
        config: ReconcilerConfig,
    ) -> Self {
        let budget = Arc::new(RetryBudget::new(config.max_attempts));
        Self::with_budget(remote, store, keys, config, budget)
    }

    /// Creates a reconciler drawing from a shared retry budget.
    ///
    /// Pushes the developer-mode setting to the remote client.
    pub fn with_budget(
        remote: Arc<dyn RemoteConfigClient>,
        store: Arc<dyn PrefStore>,
        keys: Vec<TypedKey>,
        config: ReconcilerConfig,
        budget: Arc<RetryBudget>,
    ) -> Self {
        remote.configure(RemoteSettings {
            developer_mode: config.developer_mode,
        });
        Self {
            inner: Arc::new(Inner {
                remote,
                gate: ChangeGate::new(store),
                keys,
                budget,
                config,
            }),
        }
    }

    /// The configured keys, in processing order.
    pub fn keys(&self) -> &[TypedKey] {
        &self.inner.keys
    }

    /// The retry budget this reconciler draws from.
    pub fn budget(&self) -> &Arc<RetryBudget> {
        &self.inner.budget
    }

    /// The configuration.
    pub fn config(&self) -> &ReconcilerConfig {
        &self.inner.config
    }

    /// Cache window for bounded fetches; zero in developer mode.
    pub fn cache_expiration(&self) -> Duration {
        self.inner.cache_expiration()
    }

    /// Starts a bounded sync and returns at once.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn sync(&self) -> JoinHandle<SyncOutcome> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run_bounded().await })
    }

    /// Starts a single unbounded fetch and returns at once.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn refresh(&self) -> JoinHandle<SyncOutcome> {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move { inner.run_once().await })
    }

    /// Registers a [`SyncListener`] with the store and starts an initial
    /// [`refresh`](Self::refresh).
    pub fn listen(&self) -> JoinHandle<SyncOutcome> {
        self.inner.gate.store().add_listener(Arc::new(SyncListener));
        self.refresh()
    }

    /// Runs decode and write-through over the current snapshot without
    /// fetching.
    pub async fn apply_current(&self) -> PassReport {
        Arc::clone(&self.inner).run_pass().await
    }
}

impl Inner {
    fn cache_expiration(&self) -> Duration {
        if self.remote.settings().developer_mode {
            Duration::ZERO
        } else {
            self.config.cache_expiration()
        }
    }

    async fn run_bounded(self: Arc<Self>) -> SyncOutcome {
        let mut failed = false;
        loop {
            if !self.budget.try_acquire() {
                debug!(
                    "Sync budget of {} attempts spent, not fetching",
                    self.budget.max_attempts()
                );
                return if failed {
                    SyncOutcome::FetchFailed
                } else {
                    SyncOutcome::BudgetExhausted
                };
            }

            match self.remote.fetch(Some(self.cache_expiration())).await {
                Ok(()) => {
                    if !self.remote.activate() {
                        debug!("No newly fetched snapshot to activate");
                    }
                    return SyncOutcome::Applied(Arc::clone(&self).run_pass().await);
                }
                Err(e) => {
                    failed = true;
                    if self.budget.is_exhausted() {
                        warn!(
                            "Remote fetch failed, sync budget of {} attempts spent: {}",
                            self.budget.max_attempts(),
                            e
                        );
                        return SyncOutcome::FetchFailed;
                    }
                    let delay = self.config.retry_delay();
                    warn!(
                        "Remote fetch failed (attempt {}/{}): {}, retrying in {:?}",
                        self.budget.attempts().min(self.budget.max_attempts()),
                        self.budget.max_attempts(),
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn run_once(self: Arc<Self>) -> SyncOutcome {
        match self.remote.fetch(None).await {
            Ok(()) => {
                if self.config.activate_on_refresh && !self.remote.activate() {
                    debug!("No newly fetched snapshot to activate");
                }
                SyncOutcome::Applied(Arc::clone(&self).run_pass().await)
            }
            Err(e) => {
                debug!("Remote refresh failed: {}", e);
                SyncOutcome::FetchFailed
            }
        }
    }

    async fn run_pass(self: Arc<Self>) -> PassReport {
        // Store and accessor calls may block (SQLite), keep them off the
        // async workers.
        let keys = self.keys.len();
        match tokio::task::spawn_blocking(move || self.apply_snapshot()).await {
            Ok(report) => report,
            Err(e) => {
                warn!("Sync pass over {} keys panicked: {}", keys, e);
                PassReport::default()
            }
        }
    }

    fn apply_snapshot(&self) -> PassReport {
        let mut report = PassReport::default();

        for key in &self.keys {
            let name = key.name().to_string();
            let decoded = match decode_key(key, &*self.remote) {
                Ok(Decoded::Absent) => {
                    report.absent.push(name);
                    continue;
                }
                Ok(decoded) => decoded,
                Err(e) => {
                    warn!("Skipping {}: {}", name, e);
                    report.failed.push((name, e.to_string()));
                    continue;
                }
            };

            match self.gate.apply(key, decoded.into_value()) {
                Ok(GateDecision::Written) => report.written.push(name),
                Ok(GateDecision::Unchanged) => report.unchanged.push(name),
                Ok(GateDecision::SkippedNull) => report.null.push(name),
                Err(e) => {
                    warn!("Failed to store {}: {}", name, e);
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        info!(
            "Synced {} keys: {} written, {} unchanged, {} absent, {} failed",
            report.total(),
            report.written.len(),
            report.unchanged.len(),
            report.absent.len(),
            report.failed.len()
        );
        report
    }
}
