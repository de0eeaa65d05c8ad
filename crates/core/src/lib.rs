//! Core types and shared functionality for taskcache.
//!
//! This crate provides:
//! - Generational cache storage with a SQLite backend
//! - Request/response values exchanged with the cache and the network
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod exchange;

pub use cache::{CacheDb, CacheStorage};
pub use config::AppConfig;
pub use error::Error;
pub use exchange::{CacheRequest, ResponseSnapshot, ResponseType};
