//! Cache inspection MCP tools.

pub mod keys;

pub use keys::{CacheKeysOutput, keys_impl};
