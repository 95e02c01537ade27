//! Worktree Manager (C3): allocate, track, and safely remove per-repository
//! Git worktrees keyed by session and shared name.

pub mod git;
pub mod naming;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::{AgentSource, Config};
use crate::error::WorktreeError;

use naming::AgentWorktree;

/// Persisted inside `session_metadata.json`; rehydrated verbatim on
/// restore. Keyed `"<repo-root>:<branch-name>"` per the restoration
/// scenario in spec §8.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorktreeState {
    pub shared_name: String,
    pub created_paths: HashMap<String, PathBuf>,
    pub auto_created_branches: HashMap<String, String>,
}

pub struct WorktreeManager {
    pub user_root: PathBuf,
}

impl WorktreeManager {
    pub fn new(user_root: PathBuf) -> Self {
        Self { user_root }
    }

    /// Allocate a worktree per distinct repository root referenced by a
    /// participating agent, remapping each agent's directory entries in
    /// place.
    pub fn allocate(
        &self,
        config: &mut Config,
        session_id: &str,
        cli_worktree: Option<&str>,
        global_worktree_enabled: bool,
    ) -> Result<WorktreeState, WorktreeError> {
        let shared_name = naming::resolve_shared_name(cli_worktree, Some(session_id));
        let mut state = WorktreeState {
            shared_name: shared_name.clone(),
            created_paths: HashMap::new(),
            auto_created_branches: HashMap::new(),
        };

        let agent_names: Vec<String> = config.swarm.instances.keys().cloned().collect();

        for agent_name in agent_names {
            let directive = config
                .swarm
                .instances
                .get(&agent_name)
                .and_then(|s| s.as_spec())
                .and_then(|s| s.worktree.clone());

            if !global_worktree_enabled && directive.is_none() {
                continue;
            }

            let resolution = naming::resolve_agent_worktree(&shared_name, directive.as_ref());
            let branch_name = match &resolution {
                AgentWorktree::Skip => continue,
                AgentWorktree::Shared(n) | AgentWorktree::Named(n) => n.clone(),
            };

            let Some(AgentSource::Inline(spec)) = config.swarm.instances.get_mut(&agent_name) else {
                continue;
            };

            for dir in spec.directory.0.iter_mut() {
                let Some(repo_root) = git::find_repo_root(dir) else {
                    continue;
                };

                let key = format!("{}:{}", repo_root.display(), branch_name);
                let external = if let Some(existing) = state.created_paths.get(&key) {
                    existing.clone()
                } else {
                    let path = naming::external_path(&self.user_root, session_id, &repo_root, &branch_name);
                    self.install(&repo_root, &branch_name, &path, &mut state)?;
                    state.created_paths.insert(key, path.clone());
                    path
                };

                *dir = remap(dir, &repo_root, &external);
            }
        }

        Ok(state)
    }

    fn install(
        &self,
        repo_root: &Path,
        branch_name: &str,
        external: &Path,
        state: &mut WorktreeState,
    ) -> Result<(), WorktreeError> {
        if git::is_valid_worktree(repo_root, branch_name, external) {
            return Ok(());
        }

        let branch_existed_before = git::branch_exists(repo_root, branch_name)?;
        git::add_worktree(repo_root, branch_name, external)?;
        if !branch_existed_before {
            state
                .auto_created_branches
                .insert(repo_root.display().to_string(), branch_name.to_string());
        }
        Ok(())
    }

    /// Tear down every worktree recorded in `state`, skipping (with a
    /// warning) any that have uncommitted changes or unpushed commits.
    pub fn teardown(&self, state: &WorktreeState) -> Result<(), WorktreeError> {
        for (key, path) in &state.created_paths {
            let Some((repo_root, branch_name)) = key.split_once(':') else {
                continue;
            };
            let repo_root = PathBuf::from(repo_root);

            if !path.exists() {
                continue;
            }

            if git::has_uncommitted_changes(path)? {
                warn!(worktree = %path.display(), "worktree has uncommitted changes, skipping cleanup");
                continue;
            }
            if git::has_unpushed_commits(path, branch_name)? {
                warn!(worktree = %path.display(), "worktree has unpushed commits, skipping cleanup");
                continue;
            }

            git::remove_worktree(&repo_root, branch_name)?;
            if state.auto_created_branches.get(&repo_root.display().to_string())
                == Some(&branch_name.to_string())
            {
                git::remove_branch(&repo_root, branch_name)?;
            }
            prune_empty_parents(path);
        }
        Ok(())
    }

    /// Rehydrate from a restored session's metadata. Any recorded path that
    /// no longer exists is a fatal restoration error — no worktree is
    /// silently re-created.
    pub fn restore(&self, state: &WorktreeState) -> Result<(), WorktreeError> {
        for (key, path) in &state.created_paths {
            if !path.exists() {
                let repo = key.split(':').next().unwrap_or(key).to_string();
                return Err(WorktreeError::MissingRestorePath {
                    repo,
                    path: path.clone(),
                });
            }
        }
        Ok(())
    }
}

fn remap(original: &Path, repo_root: &Path, external: &Path) -> PathBuf {
    match original.strip_prefix(repo_root) {
        Ok(sub) if sub.as_os_str().is_empty() => external.to_path_buf(),
        Ok(sub) => external.join(sub),
        Err(_) => original.to_path_buf(),
    }
}

fn prune_empty_parents(worktree_path: &Path) {
    let mut dir = worktree_path.parent();
    while let Some(d) = dir {
        if std::fs::read_dir(d).map(|mut it| it.next().is_none()).unwrap_or(false) {
            let _ = std::fs::remove_dir(d);
            dir = d.parent();
        } else {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remap_rewrites_repo_root_and_subpaths() {
        let repo = Path::new("/repo");
        let external = Path::new("/wt/branch");
        assert_eq!(remap(Path::new("/repo"), repo, external), PathBuf::from("/wt/branch"));
        assert_eq!(
            remap(Path::new("/repo/src/lib.rs"), repo, external),
            PathBuf::from("/wt/branch/src/lib.rs")
        );
        assert_eq!(
            remap(Path::new("/elsewhere"), repo, external),
            PathBuf::from("/elsewhere")
        );
    }
}
