mod common;

use common::{make_reconciler, make_reconciler_with_config, PutRecorder};
use pretty_assertions::assert_eq;
use prefsync_store::{MemoryPrefStore, PrefStore};
use prefsync_sync::remote::mock::MockRemoteConfig;
use prefsync_sync::{
    PassReport, RawSnapshot, Reconciler, ReconcilerConfig, RemoteConfigClient, RetryBudget,
    SyncOutcome,
};
use prefsync_types::{PrefValue, TypedKey};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn applied(outcome: SyncOutcome) -> PassReport {
    match outcome {
        SyncOutcome::Applied(report) => report,
        other => panic!("expected Applied, got {other:?}"),
    }
}

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

// ── Construction ────────────────────────────────────────────────

#[tokio::test]
async fn construction_configures_remote() {
    let remote = Arc::new(MockRemoteConfig::new());
    let store = Arc::new(MemoryPrefStore::new());
    let config = ReconcilerConfig {
        developer_mode: true,
        ..Default::default()
    };
    let reconciler = make_reconciler_with_config(&remote, &store, vec![], config);

    assert!(remote.settings().developer_mode);
    assert_eq!(reconciler.cache_expiration(), Duration::ZERO);
    assert_eq!(reconciler.budget().max_attempts(), 5);
}

#[test]
fn default_config() {
    let config = ReconcilerConfig::default();
    assert!(!config.developer_mode);
    assert_eq!(config.cache_expiration(), Duration::from_secs(3600));
    assert_eq!(config.retry_delay(), Duration::from_secs(5));
    assert_eq!(config.max_attempts, 5);
    assert_eq!(config.cache_expiration_secs, prefsync_sync::DEFAULT_CACHE_EXPIRATION_SECS);
    assert!(config.activate_on_refresh);
}

#[test]
fn config_deserializes_with_defaults() {
    let config: ReconcilerConfig = serde_json::from_str(r#"{"developer_mode": true}"#).unwrap();
    assert!(config.developer_mode);
    assert_eq!(config.retry_delay_ms, 5_000);
}

// ── Bounded sync ────────────────────────────────────────────────

#[tokio::test]
async fn sync_writes_every_changed_key_in_order() {
    let remote = Arc::new(MockRemoteConfig::with_values([
        ("welcome", "\"Hello\""),
        ("max_items", "25"),
        ("dark_mode", "true"),
    ]));
    let store = Arc::new(MemoryPrefStore::new());
    let recorder = Arc::new(PutRecorder::default());
    store.add_listener(recorder.clone());

    let keys = vec![
        TypedKey::of::<bool>("dark_mode"),
        TypedKey::of::<String>("welcome"),
        TypedKey::of::<i32>("max_items"),
    ];
    let reconciler = make_reconciler(&remote, &store, keys.clone());

    let report = applied(reconciler.sync().await.unwrap());
    assert_eq!(report.written, names(&["dark_mode", "welcome", "max_items"]));
    assert_eq!(recorder.puts(), names(&["dark_mode", "welcome", "max_items"]));

    assert_eq!(store.get(&keys[0]).unwrap(), Some(PrefValue::Bool(true)));
    assert_eq!(store.get(&keys[1]).unwrap(), Some(PrefValue::from("Hello")));
    assert_eq!(store.get(&keys[2]).unwrap(), Some(PrefValue::I32(25)));
    assert_eq!(remote.activation_count(), 1);
}

#[tokio::test]
async fn repeated_sync_does_not_rewrite_unchanged_values() {
    let remote = Arc::new(MockRemoteConfig::with_values([("limit", "5")]));
    let store = Arc::new(MemoryPrefStore::new());
    let recorder = Arc::new(PutRecorder::default());
    store.add_listener(recorder.clone());
    let reconciler = make_reconciler(&remote, &store, vec![TypedKey::of::<i64>("limit")]);

    applied(reconciler.sync().await.unwrap());
    let second = applied(reconciler.sync().await.unwrap());

    assert_eq!(second.unchanged, names(&["limit"]));
    assert!(second.written.is_empty());
    assert_eq!(recorder.puts().len(), 1);
}

#[tokio::test]
async fn remote_change_is_picked_up() {
    let remote = Arc::new(MockRemoteConfig::with_values([("limit", "5")]));
    let store = Arc::new(MemoryPrefStore::new());
    let key = TypedKey::of::<i64>("limit");
    let reconciler = make_reconciler(&remote, &store, vec![key.clone()]);

    applied(reconciler.sync().await.unwrap());
    remote.set_remote("limit", "3");
    let report = applied(reconciler.sync().await.unwrap());

    assert_eq!(report.written, names(&["limit"]));
    assert_eq!(store.get(&key).unwrap(), Some(PrefValue::I64(3)));
}

#[tokio::test]
async fn nan_remote_value_is_written_once() {
    let remote = Arc::new(MockRemoteConfig::with_values([("ratio", "NaN")]));
    let store = Arc::new(MemoryPrefStore::new());
    let recorder = Arc::new(PutRecorder::default());
    store.add_listener(recorder.clone());
    let reconciler = make_reconciler(&remote, &store, vec![TypedKey::of::<f64>("ratio")]);

    let first = applied(reconciler.sync().await.unwrap());
    let second = applied(reconciler.sync().await.unwrap());

    assert_eq!(first.written, names(&["ratio"]));
    assert_eq!(second.unchanged, names(&["ratio"]));
    assert_eq!(recorder.puts().len(), 1);
}

#[tokio::test]
async fn non_finite_values_stay_readable_in_sqlite() {
    use prefsync_store::SqlitePrefStore;

    let remote = Arc::new(MockRemoteConfig::with_values([
        ("nan", "NaN"),
        ("inf", "Infinity"),
        ("wide", "1e300"),
    ]));
    let store = Arc::new(SqlitePrefStore::open_in_memory().unwrap());
    let keys = vec![
        TypedKey::of::<f64>("nan"),
        TypedKey::of::<f64>("inf"),
        TypedKey::of::<f32>("wide"),
    ];
    let reconciler = Reconciler::new(
        remote.clone(),
        store.clone(),
        keys.clone(),
        ReconcilerConfig::default(),
    );

    let first = applied(reconciler.sync().await.unwrap());
    assert_eq!(first.written, names(&["nan", "inf", "wide"]));

    let second = applied(reconciler.sync().await.unwrap());
    assert!(second.failed.is_empty(), "{:?}", second.failed);
    assert_eq!(second.unchanged, names(&["nan", "inf", "wide"]));
    assert_eq!(store.get(&keys[2]).unwrap(), Some(PrefValue::F32(f32::INFINITY)));
}

#[tokio::test]
async fn sign_change_of_zero_is_written() {
    let remote = Arc::new(MockRemoteConfig::with_values([("offset", "0.0")]));
    let store = Arc::new(MemoryPrefStore::new());
    let key = TypedKey::of::<f64>("offset");
    let reconciler = make_reconciler(&remote, &store, vec![key.clone()]);

    applied(reconciler.sync().await.unwrap());
    remote.set_remote("offset", "-0.0");
    let report = applied(reconciler.sync().await.unwrap());

    assert_eq!(report.written, names(&["offset"]));
    let stored = store.get(&key).unwrap();
    assert!(matches!(stored, Some(PrefValue::F64(v)) if v == 0.0 && v.is_sign_negative()));
}

#[tokio::test]
async fn local_value_survives_missing_and_null_remote_entries() {
    let remote = Arc::new(MockRemoteConfig::with_values([
        ("banner", "null"),
        ("greeting_v2", "\"hey\""),
    ]));
    let store = Arc::new(MemoryPrefStore::new());
    let banner = TypedKey::structured::<serde_json::Value>("banner");
    let greeting = TypedKey::of::<String>("greeting");
    store
        .put(&banner, PrefValue::Structured(serde_json::json!({"local": true})))
        .unwrap();
    store.put(&greeting, PrefValue::from("local")).unwrap();

    let reconciler = make_reconciler(&remote, &store, vec![banner.clone(), greeting.clone()]);
    let report = applied(reconciler.sync().await.unwrap());

    assert_eq!(report.null, names(&["banner"]));
    assert_eq!(report.absent, names(&["greeting"]));
    assert!(report.written.is_empty());
    assert_eq!(
        store.get(&banner).unwrap(),
        Some(PrefValue::Structured(serde_json::json!({"local": true})))
    );
    assert_eq!(store.get(&greeting).unwrap(), Some(PrefValue::from("local")));
}

#[tokio::test]
async fn malformed_key_does_not_stop_the_pass() {
    let remote = Arc::new(MockRemoteConfig::with_values([
        ("first", "1"),
        ("broken", "{oops"),
        ("last", "[1,2]"),
    ]));
    let store = Arc::new(MemoryPrefStore::new());
    let keys = vec![
        TypedKey::of::<i32>("first"),
        TypedKey::structured::<Vec<u8>>("broken"),
        TypedKey::structured::<Vec<u8>>("last"),
    ];
    let reconciler = make_reconciler(&remote, &store, keys.clone());

    let report = applied(reconciler.sync().await.unwrap());

    assert_eq!(report.written, names(&["first", "last"]));
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, "broken");
    assert!(store.get(&keys[1]).unwrap().is_none());
    assert_eq!(
        store.get(&keys[2]).unwrap(),
        Some(PrefValue::Structured(serde_json::json!([1, 2])))
    );
}

#[tokio::test]
async fn store_failure_is_isolated_to_its_key() {
    let remote = Arc::new(MockRemoteConfig::with_values([("a", "1"), ("b", "2")]));
    let store = Arc::new(MemoryPrefStore::new());
    // "a" already holds a value of another kind, so reading it fails.
    store
        .put(&TypedKey::of::<String>("a"), PrefValue::from("text"))
        .unwrap();
    let reconciler = make_reconciler(
        &remote,
        &store,
        vec![TypedKey::of::<i32>("a"), TypedKey::of::<i32>("b")],
    );

    let report = applied(reconciler.sync().await.unwrap());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.written, names(&["b"]));
}

#[tokio::test]
async fn cache_window_passed_to_fetch() {
    let remote = Arc::new(MockRemoteConfig::new());
    let store = Arc::new(MemoryPrefStore::new());
    let reconciler = make_reconciler(&remote, &store, vec![]);

    reconciler.sync().await.unwrap();
    assert_eq!(
        remote.requested_expirations(),
        vec![Some(Duration::from_secs(3600))]
    );
}

#[tokio::test]
async fn developer_mode_bypasses_cache() {
    let remote = Arc::new(MockRemoteConfig::new());
    let store = Arc::new(MemoryPrefStore::new());
    let config = ReconcilerConfig {
        developer_mode: true,
        ..Default::default()
    };
    let reconciler = make_reconciler_with_config(&remote, &store, vec![], config);

    reconciler.sync().await.unwrap();
    assert_eq!(remote.requested_expirations(), vec![Some(Duration::ZERO)]);
}

#[tokio::test(start_paused = true)]
async fn sync_returns_before_fetch_completes() {
    let remote = Arc::new(MockRemoteConfig::with_values([("x", "1")]));
    remote.set_fetch_delay(Duration::from_secs(30));
    let store = Arc::new(MemoryPrefStore::new());
    let key = TypedKey::of::<i32>("x");
    let reconciler = make_reconciler(&remote, &store, vec![key.clone()]);

    let handle = reconciler.sync();
    assert!(!handle.is_finished());
    assert!(store.get(&key).unwrap().is_none());

    applied(handle.await.unwrap());
    assert_eq!(store.get(&key).unwrap(), Some(PrefValue::I32(1)));
}

// ── Retry ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn failed_fetch_is_retried_after_delay() {
    let remote = Arc::new(MockRemoteConfig::with_values([("x", "1")]));
    remote.fail_next(2);
    let store = Arc::new(MemoryPrefStore::new());
    let reconciler = make_reconciler(&remote, &store, vec![TypedKey::of::<i32>("x")]);

    let start = Instant::now();
    let report = applied(reconciler.sync().await.unwrap());

    assert_eq!(report.written, names(&["x"]));
    assert_eq!(remote.fetch_count(), 3);
    assert!(start.elapsed() >= Duration::from_secs(10));
    assert_eq!(reconciler.budget().attempts(), 3);
}

#[tokio::test(start_paused = true)]
async fn six_sequential_syncs_make_at_most_five_fetches() {
    let remote = Arc::new(MockRemoteConfig::new());
    remote.fail_always();
    let store = Arc::new(MemoryPrefStore::new());
    let reconciler = make_reconciler(&remote, &store, vec![TypedKey::of::<bool>("x")]);

    let first = reconciler.sync().await.unwrap();
    assert_eq!(first, SyncOutcome::FetchFailed);
    assert_eq!(remote.fetch_count(), 5);

    for _ in 0..5 {
        assert_eq!(
            reconciler.sync().await.unwrap(),
            SyncOutcome::BudgetExhausted
        );
    }
    assert_eq!(remote.fetch_count(), 5);
    assert!(reconciler.budget().is_exhausted());
}

#[tokio::test(start_paused = true)]
async fn last_failed_attempt_returns_without_waiting() {
    let remote = Arc::new(MockRemoteConfig::new());
    remote.fail_always();
    let store = Arc::new(MemoryPrefStore::new());
    let reconciler = make_reconciler(&remote, &store, vec![TypedKey::of::<bool>("x")]);

    let start = Instant::now();
    assert_eq!(reconciler.sync().await.unwrap(), SyncOutcome::FetchFailed);

    // Four delays between five attempts, none after the last.
    assert_eq!(remote.fetch_count(), 5);
    assert!(start.elapsed() >= Duration::from_secs(20));
    assert!(start.elapsed() < Duration::from_secs(25));
}

#[tokio::test(start_paused = true)]
async fn concurrent_syncs_share_the_budget() {
    let remote = Arc::new(MockRemoteConfig::new());
    remote.fail_always();
    let store = Arc::new(MemoryPrefStore::new());
    let reconciler = make_reconciler(&remote, &store, vec![]);

    let handles: Vec<_> = (0..6).map(|_| reconciler.sync()).collect();
    for handle in handles {
        let outcome = handle.await.unwrap();
        assert!(matches!(
            outcome,
            SyncOutcome::FetchFailed | SyncOutcome::BudgetExhausted
        ));
    }
    assert_eq!(remote.fetch_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn budget_is_not_refilled_by_success() {
    let remote = Arc::new(MockRemoteConfig::with_values([("x", "1")]));
    let store = Arc::new(MemoryPrefStore::new());
    let reconciler = make_reconciler(&remote, &store, vec![TypedKey::of::<i32>("x")]);

    for _ in 0..5 {
        applied(reconciler.sync().await.unwrap());
    }
    assert_eq!(
        reconciler.sync().await.unwrap(),
        SyncOutcome::BudgetExhausted
    );
    assert_eq!(remote.fetch_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn reconcilers_sharing_a_budget_share_the_ceiling() {
    let budget = Arc::new(RetryBudget::new(5));
    let remote = Arc::new(MockRemoteConfig::new());
    remote.fail_always();
    let store = Arc::new(MemoryPrefStore::new());

    let a = Reconciler::with_budget(
        remote.clone(),
        store.clone(),
        vec![],
        ReconcilerConfig::default(),
        budget.clone(),
    );
    let b = Reconciler::with_budget(
        remote.clone(),
        store.clone(),
        vec![],
        ReconcilerConfig::default(),
        budget.clone(),
    );

    let (ra, rb) = tokio::join!(a.sync(), b.sync());
    ra.unwrap();
    rb.unwrap();
    assert_eq!(remote.fetch_count(), 5);
    assert!(budget.is_exhausted());
}

// ── Refresh ─────────────────────────────────────────────────────

#[tokio::test]
async fn refresh_uses_client_default_cache_window() {
    let remote = Arc::new(MockRemoteConfig::with_values([("x", "7")]));
    let store = Arc::new(MemoryPrefStore::new());
    let key = TypedKey::of::<i8>("x");
    let reconciler = make_reconciler(&remote, &store, vec![key.clone()]);

    let report = applied(reconciler.refresh().await.unwrap());
    assert_eq!(report.written, names(&["x"]));
    assert_eq!(remote.requested_expirations(), vec![None]);
    assert_eq!(store.get(&key).unwrap(), Some(PrefValue::I8(7)));
}

#[tokio::test(start_paused = true)]
async fn refresh_failure_is_not_retried() {
    let remote = Arc::new(MockRemoteConfig::new());
    remote.fail_always();
    let store = Arc::new(MemoryPrefStore::new());
    let reconciler = make_reconciler(&remote, &store, vec![]);

    assert_eq!(reconciler.refresh().await.unwrap(), SyncOutcome::FetchFailed);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(remote.fetch_count(), 1);
    // Refresh does not draw from the bounded budget.
    assert_eq!(reconciler.budget().attempts(), 0);
}

#[tokio::test]
async fn refresh_without_activation_reads_active_snapshot() {
    let remote = Arc::new(MockRemoteConfig::with_values([("mode", "\"fetched\"")]));
    remote.set_active(RawSnapshot::from_iter([("mode", "\"active\"")]));
    let store = Arc::new(MemoryPrefStore::new());
    let key = TypedKey::of::<String>("mode");
    let config = ReconcilerConfig {
        activate_on_refresh: false,
        ..Default::default()
    };
    let reconciler = make_reconciler_with_config(&remote, &store, vec![key.clone()], config);

    applied(reconciler.refresh().await.unwrap());
    assert_eq!(store.get(&key).unwrap(), Some(PrefValue::from("active")));
    assert!(remote.has_staged());
    assert_eq!(remote.activation_count(), 0);
}

#[tokio::test]
async fn listen_registers_and_refreshes() {
    let remote = Arc::new(MockRemoteConfig::with_values([("x", "true")]));
    let store = Arc::new(MemoryPrefStore::new());
    let key = TypedKey::of::<bool>("x");
    let reconciler = make_reconciler(&remote, &store, vec![key.clone()]);

    applied(reconciler.listen().await.unwrap());
    assert_eq!(store.get(&key).unwrap(), Some(PrefValue::Bool(true)));

    // Local changes are observed but never trigger a fetch.
    store.put(&key, PrefValue::Bool(false)).unwrap();
    store.remove(&key).unwrap();
    assert_eq!(remote.fetch_count(), 1);
}

#[tokio::test]
async fn apply_current_reads_without_fetching() {
    let remote = Arc::new(MockRemoteConfig::new());
    remote.set_active(RawSnapshot::from_iter([("ratio", "0.5")]));
    let store = Arc::new(MemoryPrefStore::new());
    let key = TypedKey::of::<f64>("ratio");
    let reconciler = make_reconciler(&remote, &store, vec![key.clone()]);

    let report = reconciler.apply_current().await;
    assert_eq!(report.written, names(&["ratio"]));
    assert_eq!(remote.fetch_count(), 0);
    assert_eq!(store.get(&key).unwrap(), Some(PrefValue::F64(0.5)));
}
