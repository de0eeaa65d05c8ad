//! The cache storage seam.
//!
//! The agent only ever talks to storage through this trait so that the
//! SQLite backend can be swapped for a fake in tests.

use async_trait::async_trait;

use crate::Error;
use crate::exchange::{CacheRequest, ResponseSnapshot};

/// Named, generational response storage.
///
/// Every operation is an independent async call; implementations must make
/// concurrent writes to the same identity safe on their own.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Create the named store if it does not exist yet.
    async fn open(&self, name: &str) -> Result<(), Error>;

    /// Names of every existing store, oldest first.
    async fn keys(&self) -> Result<Vec<String>, Error>;

    /// Drop a store and all of its entries. Returns false if it did not exist.
    async fn delete(&self, name: &str) -> Result<bool, Error>;

    /// Exact identity lookup inside one store.
    async fn match_request(&self, name: &str, request: &CacheRequest) -> Result<Option<ResponseSnapshot>, Error>;

    /// Store a response, replacing any prior entry for the same identity.
    async fn put(&self, name: &str, request: &CacheRequest, response: &ResponseSnapshot) -> Result<(), Error>;

    /// Store a batch of responses. Either all of them land or none do.
    async fn put_all(&self, name: &str, entries: &[(CacheRequest, ResponseSnapshot)]) -> Result<(), Error>;
}
