//! worker_fetch tool implementation.
//!
//! Routes a request through the agent as if the page had issued it.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use taskcache_client::{HostHandle, ResponseSource, content_type};
use taskcache_core::{CacheRequest, Error, ResponseType};

use super::json_result;

/// Parameters for the worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchParams {
    /// Request URL, absolute or relative to the page origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the worker_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerFetchOutput {
    /// Request identity after resolution against the origin.
    pub url: String,
    pub method: String,
    /// "cache" or "network".
    pub source: String,
    pub status: u16,
    pub response_type: ResponseType,
    /// Whether a copy is being written to the current store.
    pub store_scheduled: bool,
    pub content_type: Option<String>,
    pub body_bytes: usize,
    /// Body as text, when it is valid UTF-8.
    pub body: Option<String>,
}

/// Implementation of the worker_fetch tool.
pub async fn fetch_impl(host: &HostHandle, params: WorkerFetchParams) -> Result<CallToolResult, McpError> {
    if params.url.trim().is_empty() {
        return Err(Error::InvalidInput("url cannot be empty".into()).into());
    }
    if params.method.trim().is_empty() {
        return Err(Error::InvalidInput("method cannot be empty".into()).into());
    }

    let outcome = host.fetch(CacheRequest::new(&params.method, params.url)).await?;
    let response = &outcome.response;

    let output = WorkerFetchOutput {
        url: outcome.request.url.clone(),
        method: outcome.request.method.clone(),
        source: match outcome.source {
            ResponseSource::Cache => "cache".into(),
            ResponseSource::Network => "network".into(),
        },
        status: response.status,
        response_type: response.response_type,
        store_scheduled: outcome.store_scheduled,
        content_type: content_type(response).map(String::from),
        body_bytes: response.body.len(),
        body: std::str::from_utf8(&response.body).ok().map(String::from),
    };

    json_result(&output)
}
