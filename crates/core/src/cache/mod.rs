//! SQLite-backed generational cache storage.
//!
//! Responses are grouped into named stores, one per cache generation. A store
//! is created on first open, filled at install time and on cacheable network
//! misses, and dropped as a whole once its generation is no longer current.
//!
//! Access goes through tokio-rusqlite, which serializes every operation on a
//! single background connection thread.

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod storage;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CacheSummary;
pub use storage::CacheStorage;
