//! cache_keys tool implementation.
//!
//! Lists every cache store with its entry count.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use taskcache_core::{CacheDb, cache::CacheSummary};

use crate::tools::json_result;

/// Output from the cache_keys tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheKeysOutput {
    /// Generation the agent currently serves from.
    pub current: String,
    pub caches: Vec<CacheSummary>,
}

/// Implementation of the cache_keys tool.
pub async fn keys_impl(cache: &CacheDb, current: &str) -> Result<CallToolResult, McpError> {
    let caches = cache.summaries().await?;
    json_result(&CacheKeysOutput { current: current.to_string(), caches })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::output_text;
    use taskcache_core::CacheStorage;

    #[tokio::test]
    async fn test_keys_lists_stores() {
        let cache = CacheDb::open_in_memory().await.unwrap();
        cache.open("task-reminder-v0").await.unwrap();
        cache.open("task-reminder-v1").await.unwrap();

        let result = keys_impl(&cache, "task-reminder-v1").await.unwrap();
        let output: CacheKeysOutput = serde_json::from_str(&output_text(&result)).unwrap();
        assert_eq!(output.current, "task-reminder-v1");
        assert_eq!(output.caches.len(), 2);
        assert!(output.caches.iter().all(|c| c.entries == 0));
    }

    #[tokio::test]
    async fn test_keys_empty() {
        let cache = CacheDb::open_in_memory().await.unwrap();
        let result = keys_impl(&cache, "task-reminder-v1").await.unwrap();
        let output: CacheKeysOutput = serde_json::from_str(&output_text(&result)).unwrap();
        assert!(output.caches.is_empty());
    }
}
