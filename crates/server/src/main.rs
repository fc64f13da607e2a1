use std::path::PathBuf;

use anyhow::{Context, Result};
use blockstore_engine::world::{ChunkPos, ChunkSnapshot};
use blockstore_server::blocks::BlockSet;
use blockstore_server::config::ServerConfig;
use blockstore_server::export::ChunkExport;
use blockstore_server::world_store::ChunkStore;
use blockstore_server::{generation, persistence};
use tokio::task::JoinHandle;

type SaveTask = JoinHandle<Result<usize>>;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(?config, "blockstore server starting");

    let blocks = BlockSet::register().context("registering blocks")?;
    tracing::info!(
        blocks = blocks.registry.block_count(),
        states = blocks.registry.state_count(),
        "block registry built"
    );

    // ── Generate base world, then overlay saved modifications ──────────
    let mut store = ChunkStore::new(blocks.registry.clone());
    let buffer = generation::flat_buffer(&blocks);
    for chunk in generation::generate_area(&blocks.registry, &buffer, config.radius)? {
        store.insert(chunk);
    }
    match persistence::load_into(&mut store, &config.world_dir) {
        Ok(0) => tracing::info!("no saved chunks found"),
        Ok(n) => tracing::info!(chunks = n, dir = %config.world_dir.display(), "loaded saved chunks"),
        Err(e) => tracing::error!("failed to load saved chunks: {e:#}"),
    }

    if let Some(path) = &config.export {
        let origin = ChunkPos::new(0, 0);
        let chunk = store
            .get(origin)
            .with_context(|| format!("chunk ({}, {}) is not loaded", origin.x, origin.z))?;
        return ChunkExport::from_chunk(chunk).write(path);
    }

    run(&mut store, &config).await;

    // ── Save on shutdown ─────────────────────────────────────────────────
    let remaining = store.unload_all();
    tracing::info!(chunks = remaining.len(), "saving world before exit");
    match save_blocking(remaining, config.world_dir.clone(), store.ticks()).await {
        Ok(n) => tracing::info!(chunks = n, "shutdown save complete"),
        Err(e) => tracing::error!("shutdown save failed: {e:#}"),
    }
    Ok(())
}

/// Tick until Ctrl+C or the configured tick limit, autosaving on the way.
async fn run(store: &mut ChunkStore, config: &ServerConfig) {
    let mut ticker = tokio::time::interval(config.tick_interval);
    let mut autosave = tokio::time::interval(config.autosave_interval);
    autosave.tick().await; // first tick is immediate, skip it
    let mut pending: Option<SaveTask> = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let stats = store.tick();
                if stats.dropped_relights > 0 {
                    tracing::debug!(dropped = stats.dropped_relights, "relights outside loaded chunks");
                }
                if config.max_ticks.is_some_and(|max| store.ticks() >= max) {
                    tracing::info!(ticks = store.ticks(), "tick limit reached");
                    break;
                }
            }
            _ = autosave.tick() => {
                finish_save(pending.take()).await;
                let snapshots = store.take_dirty_snapshots();
                if snapshots.is_empty() {
                    continue;
                }
                tracing::info!(chunks = snapshots.len(), "autosaving");
                let dir = config.world_dir.clone();
                let ticks = store.ticks() as i64;
                pending = Some(tokio::task::spawn_blocking(move || {
                    persistence::save_snapshots(&snapshots, &dir, ticks)
                }));
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Ctrl+C received, shutting down");
                break;
            }
        }
    }
    finish_save(pending).await;
}

async fn finish_save(task: Option<SaveTask>) {
    let Some(task) = task else {
        return;
    };
    match task.await {
        Ok(Ok(n)) => tracing::info!(chunks = n, "autosave complete"),
        Ok(Err(e)) => tracing::error!("autosave failed: {e:#}"),
        Err(e) => tracing::error!("autosave task panicked: {e}"),
    }
}

async fn save_blocking(snapshots: Vec<ChunkSnapshot>, dir: PathBuf, ticks: u64) -> Result<usize> {
    tokio::task::spawn_blocking(move || persistence::save_snapshots(&snapshots, &dir, ticks as i64))
        .await
        .context("save task panicked")?
}
