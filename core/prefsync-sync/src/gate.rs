//! Compare-then-write policy.

use crate::error::SyncResult;
use prefsync_store::PrefStore;
use prefsync_types::{PrefValue, TypedKey};
use std::sync::Arc;
use tracing::debug;

/// What the gate did with a decoded value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// The value differed from the stored one and was written.
    Written,
    /// The stored value already equals the decoded one.
    Unchanged,
    /// Nothing was decoded; the stored value is left alone.
    SkippedNull,
}

/// Null-safe equality: two `None`s are equal, `None` never equals `Some`.
pub fn null_safe_eq<T: PartialEq>(a: Option<&T>, b: Option<&T>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Whether a decoded value must be written over the stored one.
///
/// A missing decoded value never overwrites, so locally set preferences
/// survive keys the remote side does not carry.
pub fn should_write(decoded: Option<&PrefValue>, stored: Option<&PrefValue>) -> bool {
    decoded.is_some() && !null_safe_eq(stored, decoded)
}

/// Writes decoded values through to the store when they changed.
#[derive(Clone)]
pub struct ChangeGate {
    store: Arc<dyn PrefStore>,
}

impl ChangeGate {
    /// Creates a gate over `store`.
    pub fn new(store: Arc<dyn PrefStore>) -> Self {
        Self { store }
    }

    /// The underlying store.
    pub fn store(&self) -> &Arc<dyn PrefStore> {
        &self.store
    }

    /// Compares `decoded` with the freshly read stored value and writes on
    /// difference.
    pub fn apply(&self, key: &TypedKey, decoded: Option<PrefValue>) -> SyncResult<GateDecision> {
        let Some(decoded) = decoded else {
            debug!("{}: nothing decoded, keeping stored value", key.name());
            return Ok(GateDecision::SkippedNull);
        };

        let stored = self.store.get(key)?;
        if !should_write(Some(&decoded), stored.as_ref()) {
            debug!("{}: unchanged", key.name());
            return Ok(GateDecision::Unchanged);
        }

        debug!("{}: {:?} -> {:?}", key.name(), stored, decoded);
        self.store.put(key, decoded)?;
        Ok(GateDecision::Written)
    }
}
