//! prefsync host
//!
//! Syncs a remote JSON config endpoint into a local SQLite preference store:
//! 1. Loads the list of typed keys from a manifest
//! 2. Fetches the remote snapshot (bounded retries in `sync` mode)
//! 3. Writes changed values and prints the stored state of every key
//!
//! Usage:
//!   prefsync-host --endpoint https://config.example.com/app.json --keys keys.json
//!
//! The manifest is a JSON array of `{"name": "...", "type": "bool|text|i32|i64|f32|f64|i16|i8|json"}`.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use prefsync_store::{PrefStore, SqlitePrefStore};
use prefsync_sync::{
    HttpRemoteConfig, HttpRemoteConfigConfig, Reconciler, ReconcilerConfig, SyncOutcome,
};
use prefsync_types::TypedKey;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Fetch with bounded retries
    Sync,
    /// Fetch once, no retries
    Refresh,
}

#[derive(Parser, Debug)]
#[command(name = "prefsync-host")]
#[command(about = "Sync remote config into a local preference store")]
struct Args {
    /// URL returning the remote snapshot as a JSON object
    #[arg(short, long)]
    endpoint: String,

    /// Path to the key manifest
    #[arg(short, long)]
    keys: PathBuf,

    /// Path to the preference database
    #[arg(long, default_value = "prefs.sqlite")]
    db: PathBuf,

    /// Trigger to run
    #[arg(long, value_enum, default_value = "sync")]
    mode: Mode,

    /// Always bypass the remote cache
    #[arg(long)]
    developer_mode: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let builder = FmtSubscriber::builder().with_target(false).compact();
    if verbose {
        builder.with_max_level(Level::DEBUG).init();
    } else {
        builder
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
            .init();
    }
}

fn load_manifest(path: &Path) -> Result<Vec<TypedKey>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read key manifest {}", path.display()))?;
    let keys: Vec<TypedKey> = serde_json::from_str(&raw)
        .with_context(|| format!("invalid key manifest {}", path.display()))?;
    Ok(keys)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let keys = load_manifest(&args.keys)?;
    info!("Loaded {} keys from {}", keys.len(), args.keys.display());

    let store = Arc::new(
        SqlitePrefStore::open(&args.db)
            .with_context(|| format!("failed to open {}", args.db.display()))?,
    );
    let remote = Arc::new(
        HttpRemoteConfig::new(HttpRemoteConfigConfig::new(&args.endpoint))
            .context("failed to create remote config client")?,
    );
    let config = ReconcilerConfig {
        developer_mode: args.developer_mode,
        ..Default::default()
    };
    let reconciler = Reconciler::new(remote, store.clone(), keys.clone(), config);

    let handle = match args.mode {
        Mode::Sync => reconciler.sync(),
        Mode::Refresh => reconciler.refresh(),
    };
    match handle.await.context("sync task failed")? {
        SyncOutcome::Applied(report) => info!(
            "Pass complete: {} written, {} unchanged, {} absent, {} null, {} failed",
            report.written.len(),
            report.unchanged.len(),
            report.absent.len(),
            report.null.len(),
            report.failed.len()
        ),
        SyncOutcome::FetchFailed => warn!("Remote config could not be fetched"),
        SyncOutcome::BudgetExhausted => warn!("Sync attempts exhausted"),
    }

    let mut stored = serde_json::Map::new();
    for key in &keys {
        let value = store
            .get(key)
            .with_context(|| format!("failed to read {}", key.name()))?
            .map(|v| v.to_json())
            .unwrap_or(serde_json::Value::Null);
        stored.insert(key.name().to_string(), value);
    }
    println!("{}", serde_json::to_string_pretty(&stored)?);
    Ok(())
}
