//! The offline asset cache agent.
//!
//! Answers intercepted requests from the current cache generation when it can,
//! falls back to the network otherwise, and keeps storage pruned to a single
//! generation. Lifecycle phases are methods on [`LifecycleHandler`]; the
//! [`host`] module delivers events to them.

pub mod host;

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures_util::future::{join_all, try_join_all};
use reqwest::Url;
use serde::Serialize;
use tokio::task::JoinSet;

use crate::fetch::{Fetcher, parse_origin, resolve};
use taskcache_core::{AppConfig, CacheRequest, CacheStorage, Error, ResponseSnapshot};

pub use host::{HostEvent, HostHandle};

/// Static configuration of the agent.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Current cache generation.
    pub generation: String,
    /// Resources pre-loaded at install, relative to `origin` or absolute.
    pub seed_urls: Vec<String>,
    /// Background sync tag this agent answers to.
    pub sync_tag: String,
    pub origin: Url,
    /// Largest body written to the store. Bigger responses still reach the caller.
    pub max_entry_bytes: usize,
}

impl WorkerConfig {
    pub fn from_app(config: &AppConfig) -> Result<Self, Error> {
        let origin = parse_origin(&config.origin).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            generation: config.generation.clone(),
            seed_urls: config.seed_urls.clone(),
            sync_tag: config.sync_tag.clone(),
            origin,
            max_entry_bytes: config.max_bytes,
        })
    }
}

/// Outcome of a successful install.
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub generation: String,
    /// Absolute URLs now present in the store.
    pub cached: Vec<String>,
}

/// Outcome of an activation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivateReport {
    pub current: String,
    pub deleted: Vec<String>,
    /// Stale stores that could not be removed, with the reason.
    pub failed: Vec<(String, String)>,
}

/// Where the caller's response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseSource {
    Cache,
    Network,
}

/// Response handed back to an intercepted request.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub request: CacheRequest,
    pub response: ResponseSnapshot,
    pub source: ResponseSource,
    /// A copy was handed to a background store write.
    pub store_scheduled: bool,
}

/// One method per lifecycle phase.
#[async_trait]
pub trait LifecycleHandler: Send + Sync {
    /// Seed the current store. Fails as a whole if any seed fails.
    async fn on_install(&self) -> Result<InstallReport, Error>;

    /// Drop every store that is not the current generation.
    async fn on_activate(&self) -> Result<ActivateReport, Error>;

    /// Answer an intercepted request.
    async fn on_fetch(&self, request: CacheRequest) -> Result<FetchOutcome, Error>;

    /// Handle a background sync signal. Returns whether the tag was recognised.
    async fn on_sync_signal(&self, tag: &str) -> Result<bool, Error>;
}

/// Cache-first agent over an injected store and network.
pub struct OfflineAssetCache<S, F> {
    config: WorkerConfig,
    storage: Arc<S>,
    fetcher: F,
    pending: Mutex<JoinSet<()>>,
}

impl<S, F> OfflineAssetCache<S, F>
where
    S: CacheStorage + 'static,
    F: Fetcher,
{
    pub fn new(config: WorkerConfig, storage: Arc<S>, fetcher: F) -> Self {
        Self { config, storage, fetcher, pending: Mutex::new(JoinSet::new()) }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Resolve the URL against the origin so lookups and writes share one identity.
    pub fn normalize(&self, request: &CacheRequest) -> Result<CacheRequest, Error> {
        let url = resolve(&self.config.origin, &request.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(CacheRequest::new(&request.method, url.to_string()))
    }

    /// Wait for every background store write started so far.
    pub async fn settle(&self) {
        let mut writes = std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner));
        while let Some(joined) = writes.join_next().await {
            if let Err(e) = joined {
                tracing::warn!(error = %e, "store write task did not complete");
            }
        }
    }

    async fn fetch_seed(&self, request: CacheRequest) -> Result<(CacheRequest, ResponseSnapshot), Error> {
        let response = self
            .fetcher
            .fetch(&request)
            .await
            .map_err(|e| Error::InstallFailed(format!("{}: {}", request.url, e)))?;

        if !response.ok() {
            return Err(Error::InstallFailed(format!("{} returned status {}", request.url, response.status)));
        }

        if !self.fits(&response) {
            let too_large = Error::FetchTooLarge(format!(
                "{} bytes exceeds {}",
                response.body.len(),
                self.config.max_entry_bytes
            ));
            return Err(Error::InstallFailed(format!("{}: {}", request.url, too_large)));
        }

        Ok((request, response))
    }

    fn fits(&self, response: &ResponseSnapshot) -> bool {
        response.body.len() <= self.config.max_entry_bytes
    }

    async fn lookup(&self, request: &CacheRequest) -> Option<ResponseSnapshot> {
        match self.storage.match_request(&self.config.generation, request).await {
            Ok(hit) => hit,
            Err(e) => {
                tracing::warn!(url = %request.url, error = %e, "cache lookup failed, treating as miss");
                None
            }
        }
    }

    /// Commit a response copy without holding up the caller.
    fn store_detached(&self, request: CacheRequest, response: ResponseSnapshot) {
        let storage = Arc::clone(&self.storage);
        let generation = self.config.generation.clone();

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        while pending.try_join_next().is_some() {}
        pending.spawn(async move {
            match storage.put(&generation, &request, &response).await {
                Ok(()) => tracing::debug!(cache = %generation, url = %request.url, "stored network response"),
                Err(e) => tracing::warn!(cache = %generation, url = %request.url, error = %e, "discarding failed store write"),
            }
        });
    }

    /// Placeholder for deferred task reconciliation.
    async fn sync_tasks(&self) -> Result<(), Error> {
        tracing::info!(tag = %self.config.sync_tag, "background sync: tasks synced");
        Ok(())
    }
}

#[async_trait]
impl<S, F> LifecycleHandler for OfflineAssetCache<S, F>
where
    S: CacheStorage + 'static,
    F: Fetcher,
{
    async fn on_install(&self) -> Result<InstallReport, Error> {
        let generation = &self.config.generation;
        self.storage.open(generation).await?;
        tracing::info!(cache = %generation, "opened cache");

        let requests = self
            .config
            .seed_urls
            .iter()
            .map(|url| self.normalize(&CacheRequest::get(url.as_str())))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| Error::InstallFailed(e.to_string()))?;

        let seeded = try_join_all(requests.into_iter().map(|request| self.fetch_seed(request))).await?;
        self.storage.put_all(generation, &seeded).await?;

        let cached: Vec<String> = seeded.into_iter().map(|(request, _)| request.url).collect();
        tracing::info!(cache = %generation, entries = cached.len(), "install complete");

        Ok(InstallReport { generation: generation.clone(), cached })
    }

    async fn on_activate(&self) -> Result<ActivateReport, Error> {
        let current = &self.config.generation;
        let stale: Vec<String> = self
            .storage
            .keys()
            .await?
            .into_iter()
            .filter(|name| name != current)
            .collect();

        let results = join_all(stale.iter().map(|name| async move {
            tracing::info!(cache = %name, "deleting old cache");
            (name.clone(), self.storage.delete(name).await)
        }))
        .await;

        let mut report = ActivateReport { current: current.clone(), ..Default::default() };
        for (name, result) in results {
            match result {
                Ok(_) => report.deleted.push(name),
                Err(e) => {
                    tracing::warn!(cache = %name, error = %e, "failed to delete old cache");
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        Ok(report)
    }

    async fn on_fetch(&self, request: CacheRequest) -> Result<FetchOutcome, Error> {
        let request = self.normalize(&request)?;

        if let Some(response) = self.lookup(&request).await {
            tracing::debug!(url = %request.url, "cache hit");
            return Ok(FetchOutcome { request, response, source: ResponseSource::Cache, store_scheduled: false });
        }

        tracing::debug!(url = %request.url, "cache miss");
        let response = self.fetcher.fetch(&request).await?;

        let store_scheduled = response.is_cacheable() && request.is_get() && self.fits(&response);
        if store_scheduled {
            self.store_detached(request.clone(), response.clone());
        } else {
            tracing::debug!(
                url = %request.url,
                status = response.status,
                response_type = %response.response_type,
                bytes = response.body.len(),
                "response not cacheable"
            );
        }

        Ok(FetchOutcome { request, response, source: ResponseSource::Network, store_scheduled })
    }

    async fn on_sync_signal(&self, tag: &str) -> Result<bool, Error> {
        if tag != self.config.sync_tag {
            tracing::debug!(tag, "ignoring unknown sync tag");
            return Ok(false);
        }

        self.sync_tasks().await?;
        Ok(true)
    }
}
