//! Agent Executor (C5): the runtime embodiment of one agent. Two
//! polymorphic specializations (`NativeExecutor`, `ForeignExecutor`) share
//! one capability set.

pub mod foreign;
pub mod native;
pub mod tool_server;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;
use crate::session::log::EventSink;

/// Everything needed to construct either executor variant.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub working_dir: PathBuf,
    pub agent_name: String,
    pub agent_id: String,
    pub caller_name: Option<String>,
    pub caller_id: Option<String>,
    pub model: String,
    pub system_prompt: String,
    pub allowed_tools: Vec<String>,
    pub disallowed_tools: Vec<String>,
    pub connections: Vec<String>,
    pub mcp_manifest_path: PathBuf,
    pub settings_path: Option<PathBuf>,
    pub base_url: Option<String>,
    pub temperature: Option<f64>,
    pub reasoning_effort: Option<String>,
    pub permissive: bool,
    pub resume_session: Option<String>,
}

impl ExecutorConfig {
    /// `(declared_allowed ∪ { "mcp__" + c for c in connections }) \ disallowed`,
    /// unless running in permissive mode, where tool filtering is bypassed
    /// entirely.
    pub fn effective_allowed_tools(&self) -> Option<Vec<String>> {
        if self.permissive {
            return None;
        }
        let mut tools = self.allowed_tools.clone();
        for c in &self.connections {
            tools.push(format!("mcp__{c}"));
        }
        tools.retain(|t| !self.disallowed_tools.contains(t));
        Some(tools)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecuteOptions {
    #[serde(default)]
    pub extra: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub duration_ms: u64,
    pub session_id: Option<String>,
    pub cost: Option<f64>,
    pub usage: Option<serde_json::Value>,
}

impl ExecutionResult {
    pub fn new(text: String, duration_ms: u64, session_id: Option<String>) -> Self {
        Self {
            kind: "result".to_string(),
            text,
            duration_ms,
            session_id,
            cost: None,
            usage: None,
        }
    }
}

/// Reject a payload that is missing or whitespace-only, per spec §4.5.
pub fn validate_payload(agent: &str, text: &str) -> Result<(), ExecutionError> {
    if text.trim().is_empty() {
        return Err(ExecutionError::EmptyResult {
            agent: agent.to_string(),
        });
    }
    Ok(())
}

#[async_trait]
pub trait Executor: Send {
    async fn execute(
        &mut self,
        prompt: &str,
        options: ExecuteOptions,
    ) -> Result<ExecutionResult, ExecutionError>;

    fn reset_session(&mut self);

    fn has_session(&self) -> bool;
}

/// Construct the right `Executor` variant for a provider tag. Unknown
/// providers are rejected at config load time (spec §9), never here.
pub fn build_executor(
    provider: Option<&str>,
    config: ExecutorConfig,
    log: Option<std::sync::Arc<dyn EventSink>>,
) -> Box<dyn Executor> {
    match provider {
        Some("openai") => Box::new(foreign::ForeignExecutor::new(config, log)),
        _ => Box::new(native::NativeExecutor::new(config, log)),
    }
}
