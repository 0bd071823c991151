#![allow(dead_code)]

use prefsync_store::{MemoryPrefStore, PrefListener};
use prefsync_sync::remote::mock::MockRemoteConfig;
use prefsync_sync::{Reconciler, ReconcilerConfig};
use prefsync_types::{PrefValue, TypedKey};
use std::sync::{Arc, Mutex};

/// Records the names of keys put into a store, in order.
#[derive(Default)]
pub struct PutRecorder {
    puts: Mutex<Vec<String>>,
}

impl PutRecorder {
    pub fn puts(&self) -> Vec<String> {
        self.puts.lock().unwrap().clone()
    }
}

impl PrefListener for PutRecorder {
    fn on_put(&self, key: &TypedKey, _value: &PrefValue) {
        self.puts.lock().unwrap().push(key.name().to_string());
    }

    fn on_remove(&self, _key: &TypedKey) {}
}

pub fn make_reconciler(
    remote: &Arc<MockRemoteConfig>,
    store: &Arc<MemoryPrefStore>,
    keys: Vec<TypedKey>,
) -> Reconciler {
    make_reconciler_with_config(remote, store, keys, ReconcilerConfig::default())
}

pub fn make_reconciler_with_config(
    remote: &Arc<MockRemoteConfig>,
    store: &Arc<MemoryPrefStore>,
    keys: Vec<TypedKey>,
    config: ReconcilerConfig,
) -> Reconciler {
    Reconciler::new(remote.clone(), store.clone(), keys, config)
}
