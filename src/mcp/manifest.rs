//! Wire shape of a generated `<agent>.mcp.json` manifest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Stable key order (`BTreeMap`, not `HashMap`) is what makes C4's
/// idempotence invariant hold: generating twice must yield byte-identical
/// files.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct McpManifest {
    #[serde(rename = "mcpServers")]
    pub mcp_servers: BTreeMap<String, McpServerEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum McpServerEntry {
    Stdio {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default)]
        env: BTreeMap<String, String>,
    },
    Sse {
        url: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
}

impl McpServerEntry {
    pub fn stdio(command: impl Into<String>, args: Vec<String>, env: BTreeMap<String, String>) -> Self {
        McpServerEntry::Stdio {
            command: command.into(),
            args,
            env,
        }
    }

    pub fn sse(url: impl Into<String>, headers: BTreeMap<String, String>) -> Self {
        McpServerEntry::Sse { url: url.into(), headers }
    }
}
