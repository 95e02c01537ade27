//! Session metadata document: swarm name, timestamp, tool version, worktree
//! sub-record, and instance configs. Written with write-then-rename so a
//! crash never leaves a half-written `session_metadata.json`.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::worktree::WorktreeState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub swarm_name: String,
    pub created_at: DateTime<Utc>,
    pub tool_version: String,
    pub worktree: Option<WorktreeState>,
    pub instance_configs: serde_json::Value,
}

impl SessionMetadata {
    pub fn new(swarm_name: String, instance_configs: serde_json::Value) -> Self {
        Self {
            swarm_name,
            created_at: Utc::now(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            worktree: None,
            instance_configs,
        }
    }

    /// Atomic write via a `.tmp` sibling + rename.
    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        let body = serde_json::to_string_pretty(self)?;
        let tmp = tmp_path(path);
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, path)
    }

    pub fn read(path: &Path) -> std::io::Result<Self> {
        let body = std::fs::read_to_string(path)?;
        serde_json::from_str(&body).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// What `SessionStore::restore` exposes: the recorded root directory,
/// worktree sub-record, and prior tool version.
pub struct RestoredSession {
    pub root_directory: PathBuf,
    pub worktree: Option<WorktreeState>,
    pub prior_tool_version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session_metadata.json");
        let metadata = SessionMetadata::new("my-swarm".to_string(), serde_json::json!({}));
        metadata.write(&path).unwrap();
        let read_back = SessionMetadata::read(&path).unwrap();
        assert_eq!(read_back.swarm_name, "my-swarm");
        assert_eq!(read_back.tool_version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn write_leaves_no_tmp_file_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session_metadata.json");
        SessionMetadata::new("s".to_string(), serde_json::json!({})).write(&path).unwrap();
        assert!(!tmp_path(&path).exists());
        assert!(path.exists());
    }
}
