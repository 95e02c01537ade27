//! Per-agent settings file: the hook declarations from an agent's spec,
//! serialized to the JSON document `--settings` points the `claude` CLI at
//! (spec §3, §4.7 step 7). The main agent additionally gets a session-start
//! hook injected ahead of its own declared ones, so its settings file is
//! never empty.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::Serialize;

use crate::config::HookCommand;

#[derive(Debug, Clone, Serialize)]
struct HookEntry {
    #[serde(rename = "type")]
    kind: String,
    command: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    args: Vec<String>,
}

impl From<&HookCommand> for HookEntry {
    fn from(hook: &HookCommand) -> Self {
        Self {
            kind: "command".to_string(),
            command: hook.command.clone(),
            args: hook.args.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct AgentSettings {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    hooks: BTreeMap<String, Vec<HookEntry>>,
}

impl AgentSettings {
    /// Build a settings document from a declared `hooks` block. When
    /// `session_log_path` is given, a `SessionStart` hook that appends a
    /// marker line to it is inserted ahead of any declared `SessionStart`
    /// hooks; pass it only for the main agent.
    pub fn build(hooks: &HashMap<String, Vec<HookCommand>>, session_log_path: Option<&Path>) -> Self {
        let mut out: BTreeMap<String, Vec<HookEntry>> = hooks
            .iter()
            .map(|(event, commands)| (event.clone(), commands.iter().map(HookEntry::from).collect()))
            .collect();

        if let Some(log_path) = session_log_path {
            let injected = HookEntry {
                kind: "command".to_string(),
                command: "sh".to_string(),
                args: vec!["-c".to_string(), format!("echo session started >> {}", log_path.display())],
            };
            out.entry("SessionStart".to_string()).or_default().insert(0, injected);
        }

        Self { hooks: out }
    }

    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        let body = serde_json::to_string_pretty(self)?;
        std::fs::write(path, body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn main_agent_settings_always_has_a_session_start_hook() {
        let dir = tempfile::tempdir().unwrap();
        let settings_path = dir.path().join("lead_settings.json");
        let log_path = dir.path().join("session.log");

        let settings = AgentSettings::build(&HashMap::new(), Some(&log_path));
        settings.write(&settings_path).unwrap();

        let body = std::fs::read_to_string(&settings_path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(value["hooks"]["SessionStart"].as_array().unwrap().len() == 1);
    }

    #[test]
    fn declared_hooks_are_serialized_and_injected_hook_comes_first() {
        let dir = tempfile::tempdir().unwrap();
        let settings_path = dir.path().join("lead_settings.json");
        let log_path = dir.path().join("session.log");

        let mut hooks = HashMap::new();
        hooks.insert(
            "SessionStart".to_string(),
            vec![HookCommand {
                command: "notify-done".to_string(),
                args: vec![],
            }],
        );

        let settings = AgentSettings::build(&hooks, Some(&log_path));
        settings.write(&settings_path).unwrap();

        let body = std::fs::read_to_string(&settings_path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        let entries = value["hooks"]["SessionStart"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["command"], "sh");
        assert_eq!(entries[1]["command"], "notify-done");
    }

    #[test]
    fn delegated_agent_settings_have_no_injected_hook() {
        let dir = tempfile::tempdir().unwrap();
        let settings_path = dir.path().join("worker_settings.json");

        let settings = AgentSettings::build(&HashMap::new(), None);
        settings.write(&settings_path).unwrap();

        let body = std::fs::read_to_string(&settings_path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(value["hooks"].as_object().unwrap().is_empty());
    }
}
