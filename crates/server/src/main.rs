//! taskcache host entry point.
//!
//! Boots the offline cache agent and serves it as an MCP server on stdio.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use taskcache_client::{FetchClient, FetchConfig, HostHandle, OfflineAssetCache, WorkerConfig, worker::host};
use taskcache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod handler;
mod tools;

/// Install then activate. A failed install leaves the previous generation in charge.
async fn run_lifecycle(host: &HostHandle) {
    match host.install().await {
        Ok(report) => tracing::info!(generation = %report.generation, entries = report.cached.len(), "installed"),
        Err(e) => {
            tracing::error!(error = %e, "install failed, skipping activation");
            return;
        }
    }

    match host.activate().await {
        Ok(report) => tracing::info!(
            current = %report.current,
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            "activated"
        ),
        Err(e) => tracing::error!(error = %e, "activation failed"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    tracing::info!(
        origin = %config.origin,
        generation = %config.generation,
        db_path = %config.db_path.display(),
        "starting taskcache on stdio transport"
    );

    let cache = CacheDb::open(&config.db_path).await?;
    let fetcher = FetchClient::new(FetchConfig::from_app(&config)?)?;
    let agent = Arc::new(OfflineAssetCache::new(WorkerConfig::from_app(&config)?, Arc::new(cache.clone()), fetcher));
    let (host_handle, _event_loop) = host::spawn(Arc::clone(&agent), 64);

    if config.lifecycle_on_start {
        run_lifecycle(&host_handle).await;
    }

    let handler = handler::TaskCacheServer::new(host_handle, cache, config.generation.clone());
    let server = serve_server(handler, stdio()).await?;
    server.waiting().await?;

    agent.settle().await;

    Ok(())
}
