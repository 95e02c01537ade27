//! Worktree naming: shared-name generation and composition with per-agent
//! overrides, plus the deterministic external path layout (spec §3).

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::config::WorktreeDirective;

/// Values the CLI parser treats as "no explicit worktree name given".
const PLACEHOLDER_VALUES: &[&str] = &["", "true", "auto"];

/// Resolve the shared worktree name for a run, given whatever the CLI
/// passed for `--worktree` (`None` means the flag was absent entirely;
/// `Some("")` means the flag was given with no value) and the session id.
pub fn resolve_shared_name(explicit: Option<&str>, session_id: Option<&str>) -> String {
    match explicit {
        Some(s) if !PLACEHOLDER_VALUES.contains(&s) => s.to_string(),
        _ => match session_id {
            Some(id) => format!("worktree-{id}"),
            None => format!("worktree-{}", random_suffix()),
        },
    }
}

fn random_suffix() -> String {
    uuid::Uuid::new_v4()
        .simple()
        .to_string()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(5)
        .collect()
}

/// Per-agent worktree resolution: whether to use the shared name, skip
/// worktree allocation for this agent's directories, or use a private
/// branch name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentWorktree {
    Shared(String),
    Skip,
    Named(String),
}

pub fn resolve_agent_worktree(shared_name: &str, directive: Option<&WorktreeDirective>) -> AgentWorktree {
    match directive {
        None => AgentWorktree::Shared(shared_name.to_string()),
        Some(WorktreeDirective::Enabled(true)) => AgentWorktree::Shared(shared_name.to_string()),
        Some(WorktreeDirective::Enabled(false)) => AgentWorktree::Skip,
        Some(WorktreeDirective::Named(name)) => AgentWorktree::Named(name.clone()),
    }
}

/// `<user-root>/worktrees/<session-id>/<repo-basename>-<short-hash>/<name>`
pub fn external_path(user_root: &Path, session_id: &str, repo_root: &Path, branch_name: &str) -> PathBuf {
    let basename = repo_root
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "repo".to_string());
    let hash = short_hash(repo_root);
    user_root
        .join("worktrees")
        .join(session_id)
        .join(format!("{basename}-{hash}"))
        .join(branch_name)
}

fn short_hash(repo_root: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(repo_root.to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    digest.iter().take(4).map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_name_is_used_verbatim() {
        assert_eq!(resolve_shared_name(Some("my-branch"), Some("sess1")), "my-branch");
    }

    #[test]
    fn placeholder_falls_back_to_session_id() {
        assert_eq!(resolve_shared_name(Some(""), Some("sess1")), "worktree-sess1");
        assert_eq!(resolve_shared_name(Some("true"), Some("sess1")), "worktree-sess1");
    }

    #[test]
    fn no_session_id_falls_back_to_random_suffix() {
        let name = resolve_shared_name(None, None);
        assert!(name.starts_with("worktree-"));
        assert_eq!(name.len(), "worktree-".len() + 5);
    }

    #[test]
    fn per_agent_override_composes_with_shared_name() {
        assert_eq!(
            resolve_agent_worktree("shared", None),
            AgentWorktree::Shared("shared".to_string())
        );
        assert_eq!(
            resolve_agent_worktree("shared", Some(&WorktreeDirective::Enabled(false))),
            AgentWorktree::Skip
        );
        assert_eq!(
            resolve_agent_worktree("shared", Some(&WorktreeDirective::Named("private".to_string()))),
            AgentWorktree::Named("private".to_string())
        );
    }

    #[test]
    fn external_path_is_deterministic_and_collision_free_across_basenames() {
        let root = Path::new("/home/user/.claude-swarm");
        let repo_a = Path::new("/projects/foo/service");
        let repo_b = Path::new("/other/foo/service");
        let path_a = external_path(root, "sess1", repo_a, "worktree-sess1");
        let path_b = external_path(root, "sess1", repo_b, "worktree-sess1");
        assert_ne!(path_a, path_b);
        assert_eq!(external_path(root, "sess1", repo_a, "worktree-sess1"), path_a);
    }
}
