//! MCP tool implementations.
//!
//! This module contains all tools exposed by the taskcache host.

pub mod cache;
pub mod lifecycle;
pub mod worker_fetch;

pub use lifecycle::{WorkerSyncParams, activate_impl, install_impl, sync_impl};
pub use worker_fetch::{WorkerFetchParams, fetch_impl};

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;
use taskcache_core::Error;

/// Render a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use async_trait::async_trait;
    use bytes::Bytes;
    use rmcp::model::CallToolResult;
    use taskcache_client::{Fetcher, HostHandle, OfflineAssetCache, WorkerConfig, worker::host};
    use taskcache_core::{CacheDb, CacheRequest, Error, ResponseSnapshot, ResponseType};

    /// Serves the root page and stylesheet; everything else is unreachable.
    pub struct StaticSite;

    #[async_trait]
    impl Fetcher for StaticSite {
        async fn fetch(&self, request: &CacheRequest) -> Result<ResponseSnapshot, Error> {
            let body: &'static [u8] = match request.url.as_str() {
                "http://127.0.0.1:5000/" => b"<html>tasks</html>",
                "http://127.0.0.1:5000/static/styles.css" => b"body {}",
                other => return Err(Error::Network(format!("connection refused: {other}"))),
            };
            Ok(ResponseSnapshot {
                url: request.url.clone(),
                status: 200,
                response_type: ResponseType::Basic,
                headers: vec![("content-type".to_string(), "text/plain".to_string())],
                body: Bytes::from_static(body),
                fetched_at: "2026-01-01T00:00:00Z".to_string(),
            })
        }
    }

    pub async fn start_host() -> (HostHandle, CacheDb) {
        let db = CacheDb::open_in_memory().await.unwrap();
        let config = WorkerConfig {
            generation: "task-reminder-v1".to_string(),
            seed_urls: vec!["/".to_string(), "/static/styles.css".to_string()],
            sync_tag: "sync-tasks".to_string(),
            origin: "http://127.0.0.1:5000".parse().unwrap(),
            max_entry_bytes: 5 * 1024 * 1024,
        };
        let agent = Arc::new(OfflineAssetCache::new(config, Arc::new(db.clone()), StaticSite));
        let (handle, _task) = host::spawn(agent, 16);
        (handle, db)
    }

    pub fn output_text(result: &CallToolResult) -> String {
        let content_val = serde_json::to_value(&result.content[0]).unwrap();
        content_val
            .get("text")
            .and_then(|v| v.as_str())
            .expect("Expected text field in content")
            .to_string()
    }
}
