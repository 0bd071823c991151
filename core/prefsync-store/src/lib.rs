//! Local typed preference stores for prefsync.
//!
//! A store maps key names to [`PrefValue`]s and checks every write against the
//! key's declared type. Writes and removals are announced to registered
//! [`PrefListener`]s, synchronously and in registration order.
//!
//! Two backends are provided:
//! - [`MemoryPrefStore`] keeps values in a hash map (tests, ephemeral hosts)
//! - [`SqlitePrefStore`] persists values in a SQLite file so they survive restarts
//!
//! [`PrefValue`]: prefsync_types::PrefValue

mod error;
mod memory;
mod sqlite;
mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryPrefStore;
pub use sqlite::SqlitePrefStore;
pub use store::{Listeners, PrefListener, PrefStore};
