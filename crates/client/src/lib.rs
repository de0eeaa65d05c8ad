//! Client side of taskcache.
//!
//! This crate provides the network fetch primitive, the offline asset cache
//! agent and the adapter that delivers host lifecycle events to it.

pub mod fetch;
pub mod worker;

pub use fetch::{FetchClient, FetchConfig, Fetcher, content_type};
pub use worker::{
    ActivateReport, FetchOutcome, HostEvent, HostHandle, InstallReport, LifecycleHandler, OfflineAssetCache,
    ResponseSource, WorkerConfig,
};
