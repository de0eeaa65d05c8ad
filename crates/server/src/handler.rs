//! MCP server handler implementation.
//!
//! The MCP client plays the host platform: each tool call is a lifecycle
//! event or an intercepted request routed to the agent.
use crate::tools::{
    WorkerFetchParams, WorkerSyncParams, activate_impl, cache::keys_impl, fetch_impl, install_impl, sync_impl,
};

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};
use taskcache_client::HostHandle;
use taskcache_core::CacheDb;

/// The main MCP server handler for taskcache.
#[derive(Clone)]
pub struct TaskCacheServer {
    host: HostHandle,
    cache: CacheDb,
    generation: String,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl TaskCacheServer {
    /// Create a new server handler.
    pub fn new(host: HostHandle, cache: CacheDb, generation: String) -> Self {
        Self { host, cache, generation, tool_router: Self::tool_router() }
    }

    #[tool(description = "Run the install phase: fetch every seed URL into the current cache generation. Fails as a whole if any seed fails.")]
    async fn worker_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.host).await
    }

    #[tool(description = "Run the activate phase: delete every cache store that is not the current generation.")]
    async fn worker_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.host).await
    }

    /// Intercept a request: answer from the current cache, else from the network.
    #[tool(description = "Fetch a URL through the offline cache. Serves cached responses without touching the network; caches successful same-origin GET responses.")]
    async fn worker_fetch(&self, params: Parameters<WorkerFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.host, params.0).await
    }

    #[tool(description = "Signal a background sync tag to the agent.")]
    async fn worker_sync(&self, params: Parameters<WorkerSyncParams>) -> Result<CallToolResult, McpError> {
        sync_impl(&self.host, params.0).await
    }

    #[tool(description = "List cache stores with their entry counts.")]
    async fn cache_keys(&self) -> Result<CallToolResult, McpError> {
        keys_impl(&self.cache, &self.generation).await
    }
}

impl ServerHandler for TaskCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "taskcache".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
