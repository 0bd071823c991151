//! In-memory preference store.

use crate::error::StoreResult;
use crate::store::{check_type, Listeners, PrefListener, PrefStore};
use prefsync_types::{PrefValue, TypedKey};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::trace;

/// Preference store backed by a hash map. Contents are lost on drop.
#[derive(Default)]
pub struct MemoryPrefStore {
    values: RwLock<HashMap<String, PrefValue>>,
    listeners: Listeners,
}

impl MemoryPrefStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PrefStore for MemoryPrefStore {
    fn get(&self, key: &TypedKey) -> StoreResult<Option<PrefValue>> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        match values.get(key.name()) {
            Some(value) => {
                check_type(key, value)?;
                Ok(Some(value.clone()))
            }
            None => Ok(None),
        }
    }

    fn put(&self, key: &TypedKey, value: PrefValue) -> StoreResult<()> {
        check_type(key, &value)?;
        trace!("put {} = {:?}", key.name(), value);
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.name().to_string(), value.clone());
        self.listeners.notify_put(key, &value);
        Ok(())
    }

    fn remove(&self, key: &TypedKey) -> StoreResult<()> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key.name());
        self.listeners.notify_remove(key);
        Ok(())
    }

    fn add_listener(&self, listener: Arc<dyn PrefListener>) {
        self.listeners.add(listener);
    }
}
