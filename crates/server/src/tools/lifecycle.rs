//! worker_install, worker_activate and worker_sync tool implementations.
//!
//! Each forwards a lifecycle event to the agent through the host adapter.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use taskcache_client::HostHandle;
use taskcache_core::Error;

use super::json_result;

/// Output from the worker_install tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerInstallOutput {
    /// Generation that was seeded.
    pub generation: String,
    /// Absolute URLs now present in the store.
    pub cached: Vec<String>,
}

/// Output from the worker_activate tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerActivateOutput {
    pub current: String,
    /// Stale stores that were removed.
    pub deleted: Vec<String>,
    /// Stale stores that could not be removed.
    pub failed: Vec<FailedDeletion>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FailedDeletion {
    pub name: String,
    pub reason: String,
}

/// Parameters for the worker_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerSyncParams {
    /// Background sync tag signalled by the host.
    pub tag: String,
}

/// Output from the worker_sync tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerSyncOutput {
    pub tag: String,
    /// Whether the agent recognised the tag.
    pub handled: bool,
}

/// Implementation of the worker_install tool.
pub async fn install_impl(host: &HostHandle) -> Result<CallToolResult, McpError> {
    let report = host.install().await?;
    json_result(&WorkerInstallOutput { generation: report.generation, cached: report.cached })
}

/// Implementation of the worker_activate tool.
pub async fn activate_impl(host: &HostHandle) -> Result<CallToolResult, McpError> {
    let report = host.activate().await?;
    let failed = report
        .failed
        .into_iter()
        .map(|(name, reason)| FailedDeletion { name, reason })
        .collect();

    json_result(&WorkerActivateOutput { current: report.current, deleted: report.deleted, failed })
}

/// Implementation of the worker_sync tool.
pub async fn sync_impl(host: &HostHandle, params: WorkerSyncParams) -> Result<CallToolResult, McpError> {
    if params.tag.trim().is_empty() {
        return Err(Error::InvalidInput("tag cannot be empty".into()).into());
    }

    let handled = host.sync(params.tag.clone()).await?;
    json_result(&WorkerSyncOutput { tag: params.tag, handled })
}
