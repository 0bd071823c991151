//! Remote config to local preference reconciliation for prefsync.
//!
//! Fetches a snapshot from a remote configuration service, decodes every
//! configured key according to its declared type and writes the result into
//! a local [`PrefStore`](prefsync_store::PrefStore) only when it differs from
//! what is stored there.
//!
//! # Components
//!
//! - **Decoder**: turns a loosely typed remote value into a typed [`PrefValue`](prefsync_types::PrefValue)
//! - **Gate**: null-safe compare, then write through on change
//! - **Reconciler**: triggers fetches, runs passes, retries failed fetches
//! - **Remote**: the remote client abstraction plus HTTP and mock clients
//!
//! # Sync Process
//!
//! 1. **Fetch**: request a snapshot, honouring the cache window
//! 2. **Activate**: make the fetched snapshot current
//! 3. **Decode**: for each key in order, skip it if absent, else decode
//! 4. **Write**: store the decoded value if it changed
//! 5. **Retry**: on fetch failure wait, then fetch again while budget remains
//!
//! # Example
//!
//! ```
//! use prefsync_store::MemoryPrefStore;
//! use prefsync_sync::remote::mock::MockRemoteConfig;
//! use prefsync_sync::{Reconciler, ReconcilerConfig};
//! use prefsync_types::TypedKey;
//! use std::sync::Arc;
//!
//! let remote = Arc::new(MockRemoteConfig::with_values([("welcome", "\"hi\"")]));
//! let store = Arc::new(MemoryPrefStore::new());
//! let reconciler = Reconciler::new(
//!     remote,
//!     store,
//!     vec![TypedKey::of::<String>("welcome")],
//!     ReconcilerConfig::default(),
//! );
//! assert_eq!(reconciler.keys().len(), 1);
//! ```

mod budget;
mod config;
pub mod decoder;
mod error;
pub mod gate;
mod reconciler;
pub mod remote;

pub use budget::RetryBudget;
pub use config::{
    ReconcilerConfig, DEFAULT_CACHE_EXPIRATION_SECS, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY_MS,
};
pub use decoder::{decode_key, strip_json_quotes, Decoded};
pub use error::{SyncError, SyncResult};
pub use gate::{ChangeGate, GateDecision};
pub use reconciler::{PassReport, Reconciler, SyncListener, SyncOutcome};
pub use remote::{
    HttpRemoteConfig, HttpRemoteConfigConfig, RawSnapshot, RemoteConfigClient, RemoteSettings,
    SnapshotReader,
};
