//! chunk-claims binary entrypoint wiring the registry, its durable store and background tasks.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use chunk_claims::{
    config::ClaimsConfig,
    dao::{
        claim_store::{ClaimStore, memory::MemoryClaimStore},
        legacy,
    },
    host::{MapUpdateSink, StaticHost},
    services::{map_updates, reaper, storage_supervisor},
    state::{ClaimsState, chunk::ChunkPos},
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const REAPER_PERIOD: Duration = Duration::from_secs(60 * 60);
const MAP_FLUSH_PERIOD: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Arc::new(ClaimsConfig::load());
    let host = Arc::new(StaticHost::new());
    let store = open_store().await?;

    let state = ClaimsState::bootstrap(config, host, store, legacy::configured_path().as_deref())
        .await
        .context("bootstrapping claim registry")?;

    let supervisor = tokio::spawn(storage_supervisor::run(state.clone()));
    let sweeper = tokio::spawn(reaper::run(state.clone(), REAPER_PERIOD));
    let flusher = tokio::spawn(map_updates::run(
        state.clone(),
        Arc::new(LoggingSink),
        MAP_FLUSH_PERIOD,
    ));
    info!("claim registry running");

    shutdown_signal().await;
    info!("shutting down; draining pending writes");
    sweeper.abort();
    flusher.abort();
    state.persistence().drained().await;
    supervisor.abort();

    Ok(())
}

/// Pick the durable store: MongoDB when `MONGO_URI` is set, memory otherwise.
#[cfg(feature = "mongo-store")]
async fn open_store() -> anyhow::Result<Arc<dyn ClaimStore>> {
    use chunk_claims::dao::claim_store::mongodb::{MongoClaimStore, MongoConfig};

    if std::env::var_os("MONGO_URI").is_none() {
        warn!("MONGO_URI not set; claims will only be kept in memory");
        return Ok(Arc::new(MemoryClaimStore::new()));
    }
    let config = MongoConfig::from_env()
        .await
        .context("reading MongoDB settings")?;
    let store = MongoClaimStore::connect(config)
        .await
        .context("connecting to MongoDB")?;
    info!("using MongoDB claim store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "mongo-store"))]
async fn open_store() -> anyhow::Result<Arc<dyn ClaimStore>> {
    warn!("built without a durable backend; claims will only be kept in memory");
    Ok(Arc::new(MemoryClaimStore::new()))
}

/// Stand-in for a connected host: logs refresh batches.
struct LoggingSink;

impl MapUpdateSink for LoggingSink {
    fn refresh(&self, dimension: &str, chunks: &[ChunkPos]) {
        info!(dimension, chunks = chunks.len(), "map refresh");
    }
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C only");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
