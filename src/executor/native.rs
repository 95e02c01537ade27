//! The anthropic-native executor variant: drives the `claude` CLI as a
//! child process, one prompt at a time, with session continuation via
//! `--resume`.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use tokio::process::Command;

use crate::error::ExecutionError;
use crate::session::log::{Event, EventSink, LogRecord};

use super::{validate_payload, ExecuteOptions, ExecutionResult, Executor, ExecutorConfig};

pub struct NativeExecutor {
    config: ExecutorConfig,
    log: Option<Arc<dyn EventSink>>,
    session_token: Option<String>,
}

impl NativeExecutor {
    pub fn new(config: ExecutorConfig, log: Option<Arc<dyn EventSink>>) -> Self {
        let session_token = config.resume_session.clone();
        Self { config, log, session_token }
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

    fn build_args(&self, prompt: &str) -> Vec<String> {
        let mut args = Vec::new();

        if std::env::var("CLAUDE_SWARM_MODEL_OVERRIDE").is_err() {
            args.push("--model".to_string());
            args.push(self.config.model.clone());
        }

        if let Some(token) = &self.session_token {
            args.push("--resume".to_string());
            args.push(token.clone());
        }

        match self.config.effective_allowed_tools() {
            Some(tools) if !tools.is_empty() => {
                args.push("--allowedTools".to_string());
                args.push(tools.join(","));
            }
            Some(_) => {}
            None => {
                args.push("--dangerously-skip-permissions".to_string());
            }
        }

        if !self.config.disallowed_tools.is_empty() {
            args.push("--disallowedTools".to_string());
            args.push(self.config.disallowed_tools.join(","));
        }

        if !self.config.system_prompt.is_empty() {
            args.push("--append-system-prompt".to_string());
            args.push(self.config.system_prompt.clone());
        }

        args.push("--mcp-config".to_string());
        args.push(self.config.mcp_manifest_path.display().to_string());

        if let Some(settings) = &self.config.settings_path {
            if settings.exists() {
                args.push("--settings".to_string());
                args.push(settings.display().to_string());
            }
        }

        args.push("--output-format".to_string());
        args.push("stream-json".to_string());
        args.push("-p".to_string());
        args.push(prompt.to_string());

        args
    }
}

#[async_trait]
impl Executor for NativeExecutor {
    async fn execute(
        &mut self,
        prompt: &str,
        _options: ExecuteOptions,
    ) -> Result<ExecutionResult, ExecutionError> {
        self.emit(Event::Request { prompt: prompt.to_string() });
        let start = Instant::now();

        let args = self.build_args(prompt);
        let output = Command::new("claude")
            .args(&args)
            .current_dir(&self.config.working_dir)
            .output()
            .await
            .map_err(|source| ExecutionError::Io {
                agent: self.config.agent_name.clone(),
                source,
            })?;

        if !output.status.success() {
            let message = String::from_utf8_lossy(&output.stderr).to_string();
            return Err(ExecutionError::Provider {
                agent: self.config.agent_name.clone(),
                message,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let (text, session_id) = parse_stream_json(&stdout, &mut |event| self.log_passthrough(event));

        validate_payload(&self.config.agent_name, &text)?;

        if let Some(token) = &session_id {
            self.session_token = Some(token.clone());
        }

        let duration_ms = start.elapsed().as_millis() as u64;
        self.emit(Event::Result { text: text.clone(), duration_ms });

        Ok(ExecutionResult::new(text, duration_ms, session_id))
    }

    fn reset_session(&mut self) {
        self.session_token = None;
    }

    fn has_session(&self) -> bool {
        self.session_token.is_some()
    }
}

impl NativeExecutor {
    /// Stream an intermediate `stream-json` line (anything that isn't the
    /// terminal `result` message) into the structured log as it arrives.
    fn log_passthrough(&self, event: serde_json::Value) {
        if let Some(record_event) = classify_stream_event(&event) {
            self.emit(record_event);
        }
    }
}

/// Map one non-terminal `claude --output-format stream-json` line to the
/// structured log's event shape. Lines of a type this doesn't recognize are
/// dropped rather than guessed at.
fn classify_stream_event(value: &serde_json::Value) -> Option<Event> {
    match value.get("type").and_then(|t| t.as_str())? {
        "assistant" => {
            let text = value
                .get("text")
                .or_else(|| value.get("content"))
                .and_then(|t| t.as_str())
                .unwrap_or_default()
                .to_string();
            Some(Event::Assistant { text })
        }
        "tool_call" | "tool_use" => {
            let name = value.get("name").and_then(|n| n.as_str()).unwrap_or_default().to_string();
            let arguments = value
                .get("arguments")
                .or_else(|| value.get("input"))
                .cloned()
                .unwrap_or(serde_json::Value::Null);
            Some(Event::ToolCall { name, arguments })
        }
        "tool_result" => {
            let name = value.get("name").and_then(|n| n.as_str()).unwrap_or_default().to_string();
            let output = value
                .get("output")
                .or_else(|| value.get("content"))
                .and_then(|t| t.as_str())
                .unwrap_or_default()
                .to_string();
            Some(Event::ToolResult { name, output })
        }
        "system" => {
            let message = value
                .get("message")
                .or_else(|| value.get("text"))
                .and_then(|t| t.as_str())
                .unwrap_or_default()
                .to_string();
            Some(Event::System { message })
        }
        _ => None,
    }
}

/// Parse the `claude --output-format stream-json` newline-delimited stream,
/// streaming intermediate assistant/tool-call lines through `on_event` and
/// returning the terminal message's text payload and session id.
fn parse_stream_json(
    stdout: &str,
    on_event: &mut dyn FnMut(serde_json::Value),
) -> (String, Option<String>) {
    let mut text = String::new();
    let mut session_id = None;

    for line in stdout.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Ok(value) = serde_json::from_str::<serde_json::Value>(line) else {
            continue;
        };

        match value.get("type").and_then(|t| t.as_str()) {
            Some("result") => {
                if let Some(t) = value.get("result").or_else(|| value.get("text")).and_then(|t| t.as_str()) {
                    text = t.to_string();
                }
                if let Some(sid) = value.get("session_id").and_then(|s| s.as_str()) {
                    session_id = Some(sid.to_string());
                }
            }
            _ => on_event(value),
        }
    }

    (text, session_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn parses_terminal_result_message() {
        let stdout = "{\"type\":\"assistant\",\"text\":\"thinking\"}\n{\"type\":\"result\",\"result\":\"done\",\"session_id\":\"abc\"}\n";
        let (text, session_id) = parse_stream_json(stdout, &mut |_| {});
        assert_eq!(text, "done");
        assert_eq!(session_id, Some("abc".to_string()));
    }

    #[test]
    fn ignores_malformed_lines() {
        let stdout = "not json\n{\"type\":\"result\",\"result\":\"ok\"}\n";
        let (text, _) = parse_stream_json(stdout, &mut |_| {});
        assert_eq!(text, "ok");
    }

    #[test]
    fn classifies_assistant_tool_call_and_system_lines() {
        let assistant = serde_json::json!({"type": "assistant", "text": "thinking"});
        assert!(matches!(classify_stream_event(&assistant), Some(Event::Assistant { text }) if text == "thinking"));

        let tool_call = serde_json::json!({"type": "tool_call", "name": "Read", "arguments": {"path": "a.rs"}});
        assert!(matches!(classify_stream_event(&tool_call), Some(Event::ToolCall { name, .. }) if name == "Read"));

        let tool_result = serde_json::json!({"type": "tool_result", "name": "Read", "output": "contents"});
        assert!(matches!(classify_stream_event(&tool_result), Some(Event::ToolResult { name, output }) if name == "Read" && output == "contents"));

        let system = serde_json::json!({"type": "system", "message": "init"});
        assert!(matches!(classify_stream_event(&system), Some(Event::System { message }) if message == "init"));

        let unknown = serde_json::json!({"type": "heartbeat"});
        assert!(classify_stream_event(&unknown).is_none());
    }

    fn test_config() -> ExecutorConfig {
        ExecutorConfig {
            working_dir: PathBuf::from("."),
            agent_name: "lead".to_string(),
            agent_id: "id1".to_string(),
            caller_name: None,
            caller_id: None,
            model: "claude".to_string(),
            system_prompt: String::new(),
            allowed_tools: vec![],
            disallowed_tools: vec![],
            connections: vec![],
            mcp_manifest_path: PathBuf::from("lead.mcp.json"),
            settings_path: None,
            base_url: None,
            temperature: None,
            reasoning_effort: None,
            permissive: true,
            resume_session: None,
        }
    }

    #[test]
    fn intermediate_stream_events_reach_the_structured_log() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("session.log.json");
        let log: Arc<dyn EventSink> = Arc::new(crate::session::log::SessionLog::open(&log_path).unwrap());
        let executor = NativeExecutor::new(test_config(), Some(log));

        let stdout = "{\"type\":\"assistant\",\"text\":\"thinking\"}\n\
                       {\"type\":\"tool_call\",\"name\":\"Read\",\"arguments\":{}}\n\
                       {\"type\":\"result\",\"result\":\"done\"}\n";
        let (text, _) = parse_stream_json(stdout, &mut |event| executor.log_passthrough(event));
        assert_eq!(text, "done");

        let contents = std::fs::read_to_string(&log_path).unwrap();
        assert!(contents.contains("\"type\":\"assistant\""));
        assert!(contents.contains("\"type\":\"tool_call\""));
    }
}
