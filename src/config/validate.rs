//! Invariant checks run after a `Config` has been parsed and its external
//! agent files resolved. See spec §3 for the enumerated rules.

use std::path::Path;

use crate::error::ConfigError;
use crate::graph;

use super::{Config, Provider, ReasoningEffort, SUPPORTED_VERSION};

pub fn validate(config: &Config, base_dir: &Path) -> Result<(), ConfigError> {
    if config.version != SUPPORTED_VERSION {
        return Err(ConfigError::UnsupportedVersion {
            found: config.version,
        });
    }

    if !config.swarm.instances.contains_key(&config.swarm.main) {
        return Err(ConfigError::UnknownMainAgent {
            name: config.swarm.main.clone(),
        });
    }

    for (name, source) in &config.swarm.instances {
        let Some(spec) = source.as_spec() else {
            continue;
        };
        for target in &spec.connections {
            if !config.swarm.instances.contains_key(target) {
                return Err(ConfigError::UnknownConnection {
                    from: name.clone(),
                    to: target.clone(),
                });
            }
        }
    }

    graph::detect_cycle(config)?;

    let pre_commands_declared = !config.swarm.before.is_empty();
    if !pre_commands_declared {
        for (name, source) in &config.swarm.instances {
            let Some(spec) = source.as_spec() else {
                continue;
            };
            for dir in &spec.directory.0 {
                let resolved = super::resolve_path(base_dir, &dir.to_string_lossy());
                if !resolved.exists() {
                    return Err(ConfigError::MissingWorkingDirectory {
                        agent: name.clone(),
                        path: resolved,
                    });
                }
            }
        }
    }

    for (_, source) in &config.swarm.instances {
        let Some(spec) = source.as_spec() else {
            continue;
        };
        validate_model_knobs(spec)?;
    }

    Ok(())
}

fn validate_model_knobs(spec: &super::AgentSpec) -> Result<(), ConfigError> {
    let model = spec.model.as_deref().unwrap_or("");
    let is_reasoning_model = super::REASONING_MODEL_ALLOWLIST.contains(&model);

    if spec.temperature.is_some() && is_reasoning_model {
        return Err(ConfigError::TemperatureNotSupported {
            model: model.to_string(),
        });
    }

    if let Some(effort) = &spec.reasoning_effort {
        let provider_ok = matches!(spec.provider, Some(Provider::Openai));
        if !provider_ok || !is_reasoning_model {
            let _: &ReasoningEffort = effort;
            return Err(ConfigError::ReasoningEffortNotSupported {
                model: model.to_string(),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentSource, AgentSpec, SwarmSpec};
    use std::collections::HashMap;

    fn base_config() -> Config {
        let mut instances = HashMap::new();
        instances.insert(
            "lead".to_string(),
            AgentSource::Inline(Box::new(AgentSpec {
                description: "lead agent".to_string(),
                ..Default::default()
            })),
        );
        Config {
            version: 1,
            swarm: SwarmSpec {
                name: "test".to_string(),
                main: "lead".to_string(),
                before: vec![],
                after: vec![],
                instances,
            },
        }
    }

    #[test]
    fn rejects_unknown_main_agent() {
        let mut config = base_config();
        config.swarm.main = "missing".to_string();
        let err = validate(&config, Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownMainAgent { .. }));
    }

    #[test]
    fn rejects_unsupported_version() {
        let mut config = base_config();
        config.version = 2;
        let err = validate(&config, Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedVersion { .. }));
    }

    #[test]
    fn rejects_connection_to_unknown_agent() {
        let mut config = base_config();
        if let Some(spec) = config
            .swarm
            .instances
            .get_mut("lead")
            .and_then(|s| match s {
                AgentSource::Inline(b) => Some(b),
                _ => None,
            })
        {
            spec.connections.push("ghost".to_string());
        }
        let err = validate(&config, Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownConnection { .. }));
    }

    #[test]
    fn reasoning_effort_requires_openai_reasoning_model() {
        let mut config = base_config();
        if let Some(spec) = config
            .swarm
            .instances
            .get_mut("lead")
            .and_then(|s| match s {
                AgentSource::Inline(b) => Some(b),
                _ => None,
            })
        {
            spec.model = Some("gpt-4".to_string());
            spec.provider = Some(Provider::Openai);
            spec.reasoning_effort = Some(ReasoningEffort::High);
        }
        let err = validate(&config, Path::new(".")).unwrap_err();
        assert!(matches!(err, ConfigError::ReasoningEffortNotSupported { .. }));
    }
}
