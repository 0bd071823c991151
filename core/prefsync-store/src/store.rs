//! Store and listener traits.

use crate::error::{StoreError, StoreResult};
use prefsync_types::{PrefValue, TypedKey};
use std::sync::{Arc, PoisonError, RwLock};

/// Observer of store mutations.
pub trait PrefListener: Send + Sync {
    /// Called after `value` was written under `key`.
    fn on_put(&self, key: &TypedKey, value: &PrefValue);

    /// Called after `key` was removed.
    fn on_remove(&self, key: &TypedKey);
}

/// A typed key/value preference store.
pub trait PrefStore: Send + Sync {
    /// Reads the current value for `key`, if any.
    fn get(&self, key: &TypedKey) -> StoreResult<Option<PrefValue>>;

    /// Writes `value` under `key` and notifies listeners.
    fn put(&self, key: &TypedKey, value: PrefValue) -> StoreResult<()>;

    /// Removes `key` and notifies listeners. Removing a missing key is a no-op
    /// that still notifies.
    fn remove(&self, key: &TypedKey) -> StoreResult<()>;

    /// Registers a listener for subsequent puts and removes.
    fn add_listener(&self, listener: Arc<dyn PrefListener>);

    /// Reads `key`, falling back to `default` when nothing is stored.
    fn get_or(&self, key: &TypedKey, default: PrefValue) -> StoreResult<PrefValue> {
        Ok(self.get(key)?.unwrap_or(default))
    }

    /// Whether a value is stored for `key`.
    fn contains(&self, key: &TypedKey) -> StoreResult<bool> {
        Ok(self.get(key)?.is_some())
    }
}

/// Rejects values whose kind differs from the key's declared type.
pub(crate) fn check_type(key: &TypedKey, value: &PrefValue) -> StoreResult<()> {
    if value.matches(key.value_type()) {
        Ok(())
    } else {
        Err(StoreError::TypeMismatch {
            key: key.name().to_string(),
            expected: key.value_type().to_string(),
            found: value.kind().to_string(),
        })
    }
}

/// Registered listeners of a store, notified in registration order.
#[derive(Default)]
pub struct Listeners {
    inner: RwLock<Vec<Arc<dyn PrefListener>>>,
}

impl Listeners {
    /// Creates an empty listener list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener.
    pub fn add(&self, listener: Arc<dyn PrefListener>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Announces a put.
    pub fn notify_put(&self, key: &TypedKey, value: &PrefValue) {
        for listener in self.snapshot() {
            listener.on_put(key, value);
        }
    }

    /// Announces a remove.
    pub fn notify_remove(&self, key: &TypedKey) {
        for listener in self.snapshot() {
            listener.on_remove(key);
        }
    }

    // Listeners may register further listeners, so never call out while locked.
    fn snapshot(&self) -> Vec<Arc<dyn PrefListener>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
