//! The executor's MCP server side: exposes one tool named `task` with input
//! schema `{ prompt: string }`. Invoking it calls `execute(prompt, {})` and
//! returns the text payload — this is what makes delegation work: agent
//! `A`'s call to tool `mcp__B.task` becomes a prompt sent to `B`'s executor.
//!
//! Grounded on `other_examples/.../subagent-worktree-mcp`'s
//! `#[tool_router]`/`#[tool(description = "...")]` macro usage.

use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::model::{CallToolResult, Content, ServerCapabilities, ServerInfo};
use rmcp::{tool, tool_router, ErrorData as McpError, ServerHandler};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::{ExecuteOptions, Executor};

#[derive(Debug, Deserialize, JsonSchema)]
pub struct TaskInput {
    pub prompt: String,
}

pub struct TaskServer {
    executor: Arc<Mutex<Box<dyn Executor>>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl TaskServer {
    pub fn new(executor: Box<dyn Executor>) -> Self {
        Self {
            executor: Arc::new(Mutex::new(executor)),
            tool_router: Self::tool_router(),
        }
    }

    #[tool(description = "Delegate a prompt to this agent and return its response")]
    async fn task(&self, params: rmcp::handler::server::tool::Parameters<TaskInput>) -> Result<CallToolResult, McpError> {
        let mut executor = self.executor.lock().await;
        let result = executor
            .execute(&params.0.prompt, ExecuteOptions::default())
            .await
            .map_err(|e| McpError::internal_error(e.to_string(), None))?;
        Ok(CallToolResult::success(vec![Content::text(result.text)]))
    }
}

impl ServerHandler for TaskServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

/// Serve the `task` tool on stdio. Used by `mcp-serve`.
pub async fn serve_stdio(server: TaskServer) -> anyhow::Result<()> {
    use rmcp::ServiceExt;
    let service = server.serve(rmcp::transport::stdio()).await?;
    service.waiting().await?;
    Ok(())
}
