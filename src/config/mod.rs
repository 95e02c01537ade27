//! Config Loader (C1): parse a swarm configuration document with template
//! expansion and environment interpolation, resolve external per-agent
//! files, and validate the result.

pub mod frontmatter;
pub mod template;
pub mod validate;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const SUPPORTED_VERSION: i64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: i64,
    pub swarm: SwarmSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmSpec {
    pub name: String,
    pub main: String,
    #[serde(default)]
    pub before: Vec<String>,
    #[serde(default)]
    pub after: Vec<String>,
    pub instances: HashMap<String, AgentSource>,
}

/// An `AgentSpec` as it appears in the document: inline, or a path to an
/// external markdown file with frontmatter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AgentSource {
    Path(String),
    Inline(Box<AgentSpec>),
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentSpec {
    pub description: String,
    #[serde(default)]
    pub directory: Directory,
    pub model: Option<String>,
    pub provider: Option<Provider>,
    pub temperature: Option<f64>,
    pub reasoning_effort: Option<ReasoningEffort>,
    #[serde(default)]
    pub prompt: String,
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default)]
    pub disallowed_tools: Vec<String>,
    #[serde(default)]
    pub connections: Vec<String>,
    #[serde(default)]
    pub mcps: Vec<McpServerDecl>,
    pub worktree: Option<WorktreeDirective>,
    #[serde(default)]
    pub hooks: HashMap<String, Vec<HookCommand>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Anthropic,
    Openai,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Low,
    Medium,
    High,
}

/// Models allowed to carry a `reasoning_effort` under the `openai` provider.
pub const REASONING_MODEL_ALLOWLIST: &[&str] = &["o1", "o1-mini", "o3", "o3-mini", "o4-mini"];

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WorktreeDirective {
    Enabled(bool),
    Named(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookCommand {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// One or many working directories, accepted in the document as a single
/// string or a sequence.
#[derive(Debug, Clone, Default)]
pub struct Directory(pub Vec<PathBuf>);

impl Serialize for Directory {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.len() == 1 {
            self.0[0].serialize(serializer)
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Directory {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            One(PathBuf),
            Many(Vec<PathBuf>),
        }
        Ok(match OneOrMany::deserialize(deserializer)? {
            OneOrMany::One(p) => Directory(vec![p]),
            OneOrMany::Many(p) => Directory(p),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McpServerDecl {
    Stdio {
        name: String,
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: HashMap<String, String>,
    },
    Sse {
        name: String,
        url: String,
        #[serde(default)]
        headers: HashMap<String, String>,
    },
}

impl McpServerDecl {
    pub fn name(&self) -> &str {
        match self {
            McpServerDecl::Stdio { name, .. } => name,
            McpServerDecl::Sse { name, .. } => name,
        }
    }
}

impl AgentSource {
    pub fn as_spec(&self) -> Option<&AgentSpec> {
        match self {
            AgentSource::Inline(spec) => Some(spec),
            AgentSource::Path(_) => None,
        }
    }
}

/// The fully loaded, validated config plus the directory relative paths
/// resolve against.
pub struct LoadedConfig {
    pub config: Config,
    pub base_dir: PathBuf,
}

/// Load and validate a config document from `path`.
///
/// `base_dir_override` is used on session restoration, so that relative
/// directories resolve against the original project root rather than the
/// config file's own directory.
pub fn load(path: &Path, base_dir_override: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let env_bindings: HashMap<String, String> = std::env::vars().collect();
    let templated = template::render(&raw, &env_bindings, path)?;

    let mut value: serde_yaml::Value =
        serde_yaml::from_str(&templated).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    interpolate_value(&mut value);

    let config: Config = serde_yaml::from_value(value).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let base_dir = base_dir_override
        .map(Path::to_path_buf)
        .unwrap_or_else(|| path.parent().unwrap_or_else(|| Path::new(".")).to_path_buf());

    let config = resolve_external_agents(config, &base_dir)?;
    validate::validate(&config, &base_dir)?;

    Ok(LoadedConfig { config, base_dir })
}

/// Replace every `AgentSource::Path` entry with its resolved, parsed
/// `AgentSpec`.
fn resolve_external_agents(mut config: Config, base_dir: &Path) -> Result<Config, ConfigError> {
    for (_, source) in config.swarm.instances.iter_mut() {
        if let AgentSource::Path(p) = source {
            let resolved = resolve_path(base_dir, p);
            let spec = frontmatter::load_agent_file(&resolved)?;
            *source = AgentSource::Inline(Box::new(spec));
        }
    }
    Ok(config)
}

pub fn resolve_path(base_dir: &Path, p: &str) -> PathBuf {
    let path = Path::new(p);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Recursively interpolate `${NAME}` / `${NAME:-default}` forms in every
/// string leaf of a parsed YAML value tree.
fn interpolate_value(value: &mut serde_yaml::Value) {
    match value {
        serde_yaml::Value::String(s) => {
            *s = interpolate_env(s);
        }
        serde_yaml::Value::Sequence(seq) => {
            for item in seq {
                interpolate_value(item);
            }
        }
        serde_yaml::Value::Mapping(map) => {
            let values: Vec<_> = map.values_mut().collect();
            for v in values {
                interpolate_value(v);
            }
        }
        _ => {}
    }
}

/// Expand `${NAME}` and `${NAME:-default}` forms in `s` against the process
/// environment. Unknown names with no default expand to an empty string.
/// `shellexpand`'s own variable syntax already understands the `:-default`
/// form, so this is a thin wrapper rather than a reimplementation of it.
pub fn interpolate_env(s: &str) -> String {
    shellexpand::env_with_context_no_errors(s, |name| std::env::var(name).ok()).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interpolate_env_uses_default_when_unset() {
        std::env::remove_var("CLAUDE_SWARM_TEST_UNSET");
        assert_eq!(
            interpolate_env("${CLAUDE_SWARM_TEST_UNSET:-fallback}"),
            "fallback"
        );
    }

    #[test]
    fn interpolate_env_uses_value_when_set() {
        std::env::set_var("CLAUDE_SWARM_TEST_SET", "present");
        assert_eq!(interpolate_env("${CLAUDE_SWARM_TEST_SET}"), "present");
        std::env::remove_var("CLAUDE_SWARM_TEST_SET");
    }

    #[test]
    fn resolve_path_keeps_absolute_paths_untouched() {
        let base = Path::new("/base/dir");
        assert_eq!(resolve_path(base, "/abs/path"), PathBuf::from("/abs/path"));
        assert_eq!(resolve_path(base, "rel/path"), PathBuf::from("/base/dir/rel/path"));
    }
}
