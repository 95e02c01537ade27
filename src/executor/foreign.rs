//! The foreign-provider executor variant: talks to an OpenAI-compatible
//! chat-completions endpoint over `reqwest`, since that executor cannot use
//! the native tool protocol directly (hence the sibling
//! `_llm_mcp_connections.json` manifest, see `mcp::topology`).

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;
use crate::session::log::{Event, EventSink, LogRecord};

use super::{validate_payload, ExecuteOptions, ExecutionResult, Executor, ExecutorConfig};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct ForeignExecutor {
    config: ExecutorConfig,
    log: Option<Arc<dyn EventSink>>,
    client: reqwest::Client,
    session_messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<&'a str>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl ForeignExecutor {
    pub fn new(config: ExecutorConfig, log: Option<Arc<dyn EventSink>>) -> Self {
        let mut session_messages = Vec::new();
        if !config.system_prompt.is_empty() {
            session_messages.push(ChatMessage {
                role: "system".to_string(),
                content: config.system_prompt.clone(),
            });
        }
        Self {
            config,
            log,
            client: reqwest::Client::new(),
            session_messages,
        }
    }

    fn emit(&self, event: Event) {
        if let Some(log) = &self.log {
            let record = LogRecord {
                ts: Utc::now(),
                instance: self.config.agent_name.clone(),
                instance_id: self.config.agent_id.clone(),
                calling_instance: self.config.caller_name.clone(),
                calling_instance_id: self.config.caller_id.clone(),
                event,
            };
            let _ = log.record(record);
        }
    }

    fn base_url(&self) -> String {
        self.config.base_url.clone().unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }
}

#[async_trait]
impl Executor for ForeignExecutor {
    async fn execute(
        &mut self,
        prompt: &str,
        _options: ExecuteOptions,
    ) -> Result<ExecutionResult, ExecutionError> {
        self.emit(Event::Request { prompt: prompt.to_string() });
        let start = Instant::now();

        self.session_messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request = ChatRequest {
            model: &self.config.model,
            messages: &self.session_messages,
            temperature: self.config.temperature,
            reasoning_effort: self.config.reasoning_effort.as_deref(),
        };

        let url = format!("{}/chat/completions", self.base_url());
        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ExecutionError::Provider {
                agent: self.config.agent_name.clone(),
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ExecutionError::Provider {
                agent: self.config.agent_name.clone(),
                message,
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| ExecutionError::Provider {
            agent: self.config.agent_name.clone(),
            message: e.to_string(),
        })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();

        validate_payload(&self.config.agent_name, &text)?;

        self.session_messages.push(ChatMessage {
            role: "assistant".to_string(),
            content: text.clone(),
        });

        let duration_ms = start.elapsed().as_millis() as u64;
        self.emit(Event::Result { text: text.clone(), duration_ms });

        let mut result = ExecutionResult::new(text, duration_ms, None);
        result.usage = parsed.usage;
        Ok(result)
    }

    fn reset_session(&mut self) {
        self.session_messages.retain(|m| m.role == "system");
    }

    fn has_session(&self) -> bool {
        self.session_messages.iter().any(|m| m.role != "system")
    }
}
