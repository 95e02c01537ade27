//! Session Store (C6): the deterministic on-disk layout for one run (spec
//! §3, §4.6, §6).

pub mod log;
pub mod metadata;
pub mod settings;

use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use log::{LogRecord, SessionLog};
use metadata::{RestoredSession, SessionMetadata};

use crate::worktree::WorktreeState;

/// `CLAUDE_SWARM_HOME`: root directory for sessions, worktrees, and the
/// running-symlink index. Defaults to a well-known per-user directory.
pub fn resolve_home() -> PathBuf {
    if let Ok(explicit) = std::env::var("CLAUDE_SWARM_HOME") {
        return PathBuf::from(explicit);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".claude-swarm")
}

fn slugify(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

/// The set of paths that make up one session directory, per the on-disk
/// layout in spec §6.
#[derive(Debug, Clone)]
pub struct SessionPath {
    pub session_id: String,
    pub dir: PathBuf,
    pub run_symlink: PathBuf,
}

impl SessionPath {
    pub fn config_path(&self) -> PathBuf {
        self.dir.join("config.yml")
    }
    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join("session_metadata.json")
    }
    pub fn root_directory_path(&self) -> PathBuf {
        self.dir.join("root_directory")
    }
    pub fn main_pid_path(&self) -> PathBuf {
        self.dir.join("main_pid")
    }
    pub fn structured_log_path(&self) -> PathBuf {
        self.dir.join("session.log.json")
    }
    pub fn human_log_path(&self) -> PathBuf {
        self.dir.join("session.log")
    }
    pub fn agent_manifest_path(&self, agent: &str) -> PathBuf {
        self.dir.join(format!("{agent}.mcp.json"))
    }
    pub fn agent_settings_path(&self, agent: &str) -> PathBuf {
        self.dir.join(format!("{agent}_settings.json"))
    }
}

pub struct SessionStore {
    pub user_root: PathBuf,
    log: Option<SessionLog>,
}

impl SessionStore {
    pub fn new(user_root: PathBuf) -> Self {
        Self { user_root, log: None }
    }

    /// Create directories, write metadata, record the orchestrator's pid,
    /// and create the running-symlink (replacing an existing one of the
    /// same id).
    pub fn begin(
        &mut self,
        swarm_name: &str,
        session_id: Option<String>,
        root_directory: &Path,
        instance_configs: serde_json::Value,
    ) -> std::io::Result<SessionPath> {
        let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let slug = slugify(swarm_name);

        let dir = self.user_root.join("sessions").join(&slug).join(&session_id);
        std::fs::create_dir_all(&dir)?;

        let run_dir = self.user_root.join("run");
        std::fs::create_dir_all(&run_dir)?;
        let run_symlink = run_dir.join(&session_id);

        let path = SessionPath {
            session_id: session_id.clone(),
            dir,
            run_symlink,
        };

        std::fs::write(path.root_directory_path(), root_directory.display().to_string())?;
        std::fs::write(path.main_pid_path(), std::process::id().to_string())?;

        let metadata = SessionMetadata::new(swarm_name.to_string(), instance_configs);
        metadata.write(&path.metadata_path())?;

        create_running_symlink(&path.run_symlink, &path.dir)?;

        self.log = Some(SessionLog::open(&path.structured_log_path())?);

        debug!(session_id = %path.session_id, dir = %path.dir.display(), "session begin");
        Ok(path)
    }

    pub fn record_event(&self, record: LogRecord) -> std::io::Result<()> {
        match &self.log {
            Some(log) => {
                use log::EventSink;
                log.record(record)
            }
            None => Ok(()),
        }
    }

    /// Attach the worktree sub-record generated after `begin` (worktree
    /// allocation happens after the session directory exists).
    pub fn record_worktree(&self, path: &SessionPath, worktree: WorktreeState) -> std::io::Result<()> {
        let mut metadata = SessionMetadata::read(&path.metadata_path())?;
        metadata.worktree = Some(worktree);
        metadata.write(&path.metadata_path())
    }

    pub fn restore(session_path: &Path) -> std::io::Result<RestoredSession> {
        let metadata_path = session_path.join("session_metadata.json");
        let metadata = SessionMetadata::read(&metadata_path)?;
        let root_directory = std::fs::read_to_string(session_path.join("root_directory"))?;
        Ok(RestoredSession {
            root_directory: PathBuf::from(root_directory.trim()),
            worktree: metadata.worktree,
            prior_tool_version: metadata.tool_version,
        })
    }

    /// Remove the running-symlink; never removes the session directory
    /// itself. Tolerates a missing symlink.
    pub fn end(&self, path: &SessionPath) -> std::io::Result<()> {
        match std::fs::remove_file(&path.run_symlink) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(unix)]
fn create_running_symlink(link: &Path, target: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(link) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn create_running_symlink(_link: &Path, _target: &Path) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_creates_symlink_and_end_removes_it() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::new(dir.path().to_path_buf());
        let path = store
            .begin("my swarm", Some("sess1".to_string()), Path::new("/proj"), serde_json::json!({}))
            .unwrap();

        assert!(path.run_symlink.exists());
        assert!(path.metadata_path().exists());
        assert!(path.main_pid_path().exists());

        store.end(&path).unwrap();
        assert!(!path.run_symlink.symlink_metadata().is_ok());
    }

    #[test]
    fn end_tolerates_missing_symlink() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::new(dir.path().to_path_buf());
        let path = store
            .begin("swarm", Some("sess2".to_string()), Path::new("/proj"), serde_json::json!({}))
            .unwrap();
        std::fs::remove_file(&path.run_symlink).unwrap();
        assert!(store.end(&path).is_ok());
    }

    #[test]
    fn restore_reads_back_root_directory_and_version() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = SessionStore::new(dir.path().to_path_buf());
        let path = store
            .begin("swarm", Some("sess3".to_string()), Path::new("/proj/root"), serde_json::json!({}))
            .unwrap();

        let restored = SessionStore::restore(&path.dir).unwrap();
        assert_eq!(restored.root_directory, PathBuf::from("/proj/root"));
        assert_eq!(restored.prior_tool_version, env!("CARGO_PKG_VERSION"));
    }
}
