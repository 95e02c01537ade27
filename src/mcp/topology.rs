//! MCP Topology Generator (C4): for each agent, emit a connection manifest
//! listing every agent it can delegate to and any external MCP servers it
//! owns.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::config::{Config, McpServerDecl, Provider, ReasoningEffort};
use crate::error::ConfigError;

use super::manifest::{McpManifest, McpServerEntry};

/// Variables stripped from a generated command's environment before spawn.
/// Configurable via `CLAUDE_SWARM_SCRUB_ENV` (colon-separated); empty by
/// default since this binary has no embedded interpreter state to hide from
/// its own re-invocations (see DESIGN.md Open Question #2).
pub fn scrub_denylist() -> Vec<String> {
    std::env::var("CLAUDE_SWARM_SCRUB_ENV")
        .ok()
        .map(|v| v.split(':').map(str::to_string).collect())
        .unwrap_or_default()
}

/// Stable, deterministic per-session agent id. Must not be random: two
/// generations of the same config for the same session must be
/// byte-identical.
pub fn agent_id(session_id: &str, agent_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(session_id.as_bytes());
    hasher.update(b":");
    hasher.update(agent_name.as_bytes());
    let digest = hasher.finalize();
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

/// Build the manifest for `agent_name`, plus a sibling
/// `_llm_mcp_connections` manifest when that agent uses a non-native
/// provider.
pub fn generate(
    config: &Config,
    agent_name: &str,
    swarm_binary: &Path,
    session_id: &str,
    session_dir: &Path,
) -> Result<(McpManifest, Option<McpManifest>), ConfigError> {
    let spec = config
        .swarm
        .instances
        .get(agent_name)
        .and_then(|s| s.as_spec())
        .ok_or_else(|| ConfigError::UnknownConnection {
            from: config.swarm.main.clone(),
            to: agent_name.to_string(),
        })?;

    let mut servers = BTreeMap::new();

    for decl in &spec.mcps {
        servers.insert(decl.name().to_string(), external_entry(decl));
    }

    for connection in &spec.connections {
        let callee_id = agent_id(session_id, connection);
        let caller_id = agent_id(session_id, agent_name);
        let manifest_path = session_dir.join(format!("{connection}.mcp.json"));
        let prompt_file = session_dir.join(format!("{connection}.prompt.txt"));

        let mut args = vec![
            "mcp-serve".to_string(),
            "--agent-name".to_string(),
            connection.clone(),
            "--agent-id".to_string(),
            callee_id,
            "--calling-agent".to_string(),
            agent_name.to_string(),
            "--calling-agent-id".to_string(),
            caller_id,
            "--connection-mcp-config".to_string(),
            manifest_path.display().to_string(),
            "--prompt-file".to_string(),
            prompt_file.display().to_string(),
        ];

        if let Some(connected_spec) = config.swarm.instances.get(connection).and_then(|s| s.as_spec()) {
            for dir in &connected_spec.directory.0 {
                args.push("--directory".to_string());
                args.push(dir.display().to_string());
            }
            if let Some(model) = &connected_spec.model {
                args.push("--model".to_string());
                args.push(model.clone());
            }
            if let Some(provider) = &connected_spec.provider {
                args.push("--provider".to_string());
                args.push(provider_tag(provider).to_string());
            }
            if let Some(temperature) = connected_spec.temperature {
                args.push("--temperature".to_string());
                args.push(temperature.to_string());
            }
            if let Some(effort) = &connected_spec.reasoning_effort {
                args.push("--reasoning-effort".to_string());
                args.push(reasoning_effort_tag(effort).to_string());
            }
            if connected_spec.allowed_tools.is_empty() {
                args.push("--vibe".to_string());
            } else {
                for tool in &connected_spec.allowed_tools {
                    args.push("--allowed-tools".to_string());
                    args.push(tool.clone());
                }
            }
            for tool in &connected_spec.disallowed_tools {
                args.push("--disallowed-tools".to_string());
                args.push(tool.clone());
            }
            for downstream in &connected_spec.connections {
                args.push("--connections".to_string());
                args.push(downstream.clone());
            }

            std::fs::write(&prompt_file, &connected_spec.prompt).map_err(|source| ConfigError::Io {
                path: prompt_file.clone(),
                source,
            })?;
        }

        let mut env = BTreeMap::new();
        for denied in scrub_denylist() {
            env.insert(format!("__scrub_{denied}"), String::new());
        }

        servers.insert(
            connection.clone(),
            McpServerEntry::stdio(swarm_binary.display().to_string(), args, env),
        );
    }

    let manifest = McpManifest { mcp_servers: servers };

    let llm_manifest = if matches!(spec.provider, Some(Provider::Openai)) {
        let mut toolbox = BTreeMap::new();
        toolbox.insert(
            "toolbox".to_string(),
            McpServerEntry::stdio(
                swarm_binary.display().to_string(),
                vec!["mcp-serve".to_string(), "--toolbox".to_string()],
                BTreeMap::new(),
            ),
        );
        Some(McpManifest { mcp_servers: toolbox })
    } else {
        None
    };

    Ok((manifest, llm_manifest))
}

fn provider_tag(provider: &Provider) -> &'static str {
    match provider {
        Provider::Anthropic => "anthropic",
        Provider::Openai => "openai",
    }
}

fn reasoning_effort_tag(effort: &ReasoningEffort) -> &'static str {
    match effort {
        ReasoningEffort::Low => "low",
        ReasoningEffort::Medium => "medium",
        ReasoningEffort::High => "high",
    }
}

fn external_entry(decl: &McpServerDecl) -> McpServerEntry {
    match decl {
        McpServerDecl::Stdio { command, args, env, .. } => {
            McpServerEntry::stdio(command.clone(), args.clone(), env.clone().into_iter().collect())
        }
        McpServerDecl::Sse { url, headers, .. } => {
            McpServerEntry::sse(url.clone(), headers.clone().into_iter().collect())
        }
    }
}

/// Write every agent's manifest(s) under `session_dir`. Idempotent: running
/// this twice with the same `config`/`session_id` produces byte-identical
/// files.
pub fn generate_all(
    config: &Config,
    swarm_binary: &Path,
    session_id: &str,
    session_dir: &Path,
) -> Result<Vec<PathBuf>, ConfigError> {
    let mut written = Vec::new();
    for name in config.swarm.instances.keys() {
        let (manifest, llm_manifest) = generate(config, name, swarm_binary, session_id, session_dir)?;

        let path = session_dir.join(format!("{name}.mcp.json"));
        write_json(&path, &manifest)?;
        written.push(path);

        if let Some(llm) = llm_manifest {
            let path = session_dir.join(format!("{name}_llm_mcp_connections.json"));
            write_json(&path, &llm)?;
            written.push(path);
        }
    }
    Ok(written)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), ConfigError> {
    let body = serde_json::to_string_pretty(value).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    std::fs::write(path, body).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentSource, AgentSpec, SwarmSpec};
    use std::collections::HashMap;

    fn config_with(main: &str, connections: Vec<&str>, externals: Vec<McpServerDecl>) -> Config {
        let mut instances = HashMap::new();
        instances.insert(
            main.to_string(),
            AgentSource::Inline(Box::new(AgentSpec {
                description: "d".to_string(),
                connections: connections.iter().map(|s| s.to_string()).collect(),
                mcps: externals,
                ..Default::default()
            })),
        );
        for c in connections {
            instances.insert(
                c.to_string(),
                AgentSource::Inline(Box::new(AgentSpec {
                    description: "d".to_string(),
                    ..Default::default()
                })),
            );
        }
        Config {
            version: 1,
            swarm: SwarmSpec {
                name: "s".to_string(),
                main: main.to_string(),
                before: vec![],
                after: vec![],
                instances,
            },
        }
    }

    #[test]
    fn manifest_has_exactly_connections_plus_externals_entries() {
        let external = McpServerDecl::Stdio {
            name: "fs".to_string(),
            command: "fs-mcp".to_string(),
            args: vec![],
            env: HashMap::new(),
        };
        let config = config_with("lead", vec!["worker1", "worker2"], vec![external]);
        let dir = tempfile::tempdir().unwrap();
        let (manifest, _) = generate(&config, "lead", Path::new("/bin/claude-swarm"), "sess1", dir.path()).unwrap();
        assert_eq!(manifest.mcp_servers.len(), 3);
    }

    #[test]
    fn connection_command_carries_full_agent_spec_and_writes_prompt_file() {
        let mut config = config_with("lead", vec!["worker1"], vec![]);
        if let Some(AgentSource::Inline(spec)) = config.swarm.instances.get_mut("worker1") {
            spec.provider = Some(Provider::Openai);
            spec.temperature = Some(0.4);
            spec.reasoning_effort = Some(ReasoningEffort::High);
            spec.allowed_tools = vec!["Read".to_string()];
            spec.disallowed_tools = vec!["Bash".to_string()];
            spec.connections = vec!["helper".to_string()];
            spec.prompt = "you are worker1".to_string();
        }
        let dir = tempfile::tempdir().unwrap();
        let (manifest, _) = generate(&config, "lead", Path::new("/bin/claude-swarm"), "sess1", dir.path()).unwrap();
        let entry = manifest.mcp_servers.get("worker1").unwrap();
        let args = match entry {
            McpServerEntry::Stdio { args, .. } => args.clone(),
            _ => panic!("expected stdio entry"),
        };
        assert!(args.windows(2).any(|w| w == ["--provider".to_string(), "openai".to_string()]));
        assert!(args.windows(2).any(|w| w == ["--temperature".to_string(), "0.4".to_string()]));
        assert!(args.windows(2).any(|w| w == ["--reasoning-effort".to_string(), "high".to_string()]));
        assert!(args.windows(2).any(|w| w == ["--allowed-tools".to_string(), "Read".to_string()]));
        assert!(args.windows(2).any(|w| w == ["--disallowed-tools".to_string(), "Bash".to_string()]));
        assert!(args.windows(2).any(|w| w == ["--connections".to_string(), "helper".to_string()]));

        let prompt_file = dir.path().join("worker1.prompt.txt");
        assert_eq!(std::fs::read_to_string(prompt_file).unwrap(), "you are worker1");
    }

    #[test]
    fn generation_is_idempotent() {
        let config = config_with("lead", vec!["worker1"], vec![]);
        let dir = tempfile::tempdir().unwrap();
        let (m1, _) = generate(&config, "lead", Path::new("/bin/claude-swarm"), "sess1", dir.path()).unwrap();
        let (m2, _) = generate(&config, "lead", Path::new("/bin/claude-swarm"), "sess1", dir.path()).unwrap();
        let j1 = serde_json::to_string(&m1).unwrap();
        let j2 = serde_json::to_string(&m2).unwrap();
        assert_eq!(j1, j2);
    }

    #[test]
    fn empty_connections_and_externals_yields_empty_manifest() {
        let config = config_with("lead", vec![], vec![]);
        let dir = tempfile::tempdir().unwrap();
        let (manifest, llm) =
            generate(&config, "lead", Path::new("/bin/claude-swarm"), "sess1", dir.path()).unwrap();
        assert!(manifest.mcp_servers.is_empty());
        assert!(llm.is_none());
    }
}
