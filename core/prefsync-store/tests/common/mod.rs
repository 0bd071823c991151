use prefsync_store::PrefListener;
use prefsync_types::{PrefValue, TypedKey};
use std::sync::Mutex;

/// Records every notification it receives.
#[derive(Default)]
pub struct RecordingListener {
    pub events: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl PrefListener for RecordingListener {
    fn on_put(&self, key: &TypedKey, value: &PrefValue) {
        self.events
            .lock()
            .unwrap()
            .push(format!("put {}={}", key.name(), value.to_json()));
    }

    fn on_remove(&self, key: &TypedKey) {
        self.events
            .lock()
            .unwrap()
            .push(format!("remove {}", key.name()));
    }
}
