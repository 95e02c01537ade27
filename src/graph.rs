//! Dependency Graph (C2): detect cycles and unknown references in the
//! agent-connection graph. Pure, synchronous, no I/O.

use crate::config::Config;
use crate::error::ConfigError;

/// Walk the connection graph depth-first from the main agent, failing with
/// a `ConfigError::Cycle` the moment a node already on the current path is
/// revisited. The error message enumerates the path in traversal order,
/// e.g. `lead -> worker1 -> worker2 -> lead`.
pub fn detect_cycle(config: &Config) -> Result<(), ConfigError> {
    let mut path: Vec<String> = Vec::new();
    visit(config, &config.swarm.main, &mut path)
}

fn visit(config: &Config, node: &str, path: &mut Vec<String>) -> Result<(), ConfigError> {
    if let Some(pos) = path.iter().position(|n| n == node) {
        let mut cycle = path[pos..].to_vec();
        cycle.push(node.to_string());
        return Err(ConfigError::Cycle(cycle.join(" -> ")));
    }

    path.push(node.to_string());

    let connections: Vec<String> = config
        .swarm
        .instances
        .get(node)
        .and_then(|s| s.as_spec())
        .map(|spec| spec.connections.clone())
        .unwrap_or_default();

    for next in &connections {
        visit(config, next, path)?;
    }

    path.pop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AgentSource, AgentSpec, SwarmSpec};
    use std::collections::HashMap;

    fn config_with_connections(edges: &[(&str, &[&str])], main: &str) -> Config {
        let mut instances = HashMap::new();
        for (name, conns) in edges {
            instances.insert(
                name.to_string(),
                AgentSource::Inline(Box::new(AgentSpec {
                    description: "d".to_string(),
                    connections: conns.iter().map(|s| s.to_string()).collect(),
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
    fn acyclic_graph_passes() {
        let config = config_with_connections(
            &[("lead", &["worker"]), ("worker", &[])],
            "lead",
        );
        assert!(detect_cycle(&config).is_ok());
    }

    #[test]
    fn reports_cycle_in_traversal_order() {
        let config = config_with_connections(
            &[
                ("lead", &["worker1"]),
                ("worker1", &["worker2"]),
                ("worker2", &["lead"]),
            ],
            "lead",
        );
        let err = detect_cycle(&config).unwrap_err();
        match err {
            ConfigError::Cycle(msg) => assert_eq!(msg, "lead -> worker1 -> worker2 -> lead"),
            other => panic!("expected Cycle, got {other:?}"),
        }
    }

    #[test]
    fn self_edge_is_a_cycle_of_length_one() {
        let config = config_with_connections(&[("lead", &["lead"])], "lead");
        let err = detect_cycle(&config).unwrap_err();
        match err {
            ConfigError::Cycle(msg) => assert_eq!(msg, "lead -> lead"),
            other => panic!("expected Cycle, got {other:?}"),
        }
    }
}
