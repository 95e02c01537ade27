//! Thin `git2` wrapper used by the Worktree Manager. Grounded on
//! `mcps/git-mcp`'s `StatusOptions`/`branch_list` idioms and the worktree
//! add/remove shape from the `jmalicki-subagent-worktree-mcp` example.

use std::path::{Path, PathBuf};

use git2::{BranchType, Repository, StatusOptions, WorktreeAddOptions};

use crate::error::WorktreeError;

fn wrap(path: &Path, source: git2::Error) -> WorktreeError {
    WorktreeError::Git {
        path: path.to_path_buf(),
        source,
    }
}

/// Walk up from `dir` looking for a `.git` marker. Returns `None` if `dir`
/// is not inside a git repository.
pub fn find_repo_root(dir: &Path) -> Option<PathBuf> {
    Repository::discover(dir)
        .ok()
        .and_then(|repo| repo.workdir().map(Path::to_path_buf))
}

/// `true` if `path` is already a registered, valid worktree of the
/// repository at `repo_root` under the given name.
pub fn is_valid_worktree(repo_root: &Path, name: &str, path: &Path) -> bool {
    let Ok(repo) = Repository::open(repo_root) else {
        return false;
    };
    let Ok(wt) = repo.find_worktree(name) else {
        return false;
    };
    wt.is_valid().is_ok() && wt.path() == path
}

pub fn branch_exists(repo_root: &Path, name: &str) -> Result<bool, WorktreeError> {
    let repo = Repository::open(repo_root).map_err(|e| wrap(repo_root, e))?;
    Ok(repo.find_branch(name, BranchType::Local).is_ok())
}

/// Add a worktree at `path` on branch `name`, creating the branch off HEAD
/// first if it doesn't already exist. The worktree always ends up on a
/// named branch, never detached.
pub fn add_worktree(repo_root: &Path, name: &str, path: &Path) -> Result<(), WorktreeError> {
    let repo = Repository::open(repo_root).map_err(|e| wrap(repo_root, e))?;

    if repo.find_branch(name, BranchType::Local).is_err() {
        let head_commit = repo
            .head()
            .and_then(|h| h.peel_to_commit())
            .map_err(|e| wrap(repo_root, e))?;
        repo.branch(name, &head_commit, false)
            .map_err(|e| wrap(repo_root, e))?;
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(WorktreeError::from)?;
    }

    let branch_ref = repo
        .find_branch(name, BranchType::Local)
        .map_err(|e| wrap(repo_root, e))?
        .into_reference();

    let mut opts = WorktreeAddOptions::new();
    opts.reference(Some(&branch_ref));

    repo.worktree(name, path, Some(&opts))
        .map_err(|e| wrap(repo_root, e))?;

    Ok(())
}

/// Uncommitted changes in index or working tree, evaluated against the
/// worktree's own repository handle.
pub fn has_uncommitted_changes(worktree_path: &Path) -> Result<bool, WorktreeError> {
    let repo = Repository::open(worktree_path).map_err(|e| wrap(worktree_path, e))?;
    let mut opts = StatusOptions::new();
    opts.include_untracked(true)
        .include_ignored(false)
        .include_unmodified(false);
    let statuses = repo
        .statuses(Some(&mut opts))
        .map_err(|e| wrap(worktree_path, e))?;
    Ok(!statuses.is_empty())
}

/// Commits reachable from `branch_name`'s tip but not from any
/// `refs/remotes/*` tracking ref.
pub fn has_unpushed_commits(worktree_path: &Path, branch_name: &str) -> Result<bool, WorktreeError> {
    let repo = Repository::open(worktree_path).map_err(|e| wrap(worktree_path, e))?;
    let branch = repo
        .find_branch(branch_name, BranchType::Local)
        .map_err(|e| wrap(worktree_path, e))?;
    let Some(tip) = branch.get().target() else {
        return Ok(false);
    };

    let mut revwalk = repo.revwalk().map_err(|e| wrap(worktree_path, e))?;
    revwalk.push(tip).map_err(|e| wrap(worktree_path, e))?;

    for remote_branch in repo
        .branches(Some(BranchType::Remote))
        .map_err(|e| wrap(worktree_path, e))?
    {
        let (remote_branch, _) = remote_branch.map_err(|e| wrap(worktree_path, e))?;
        if let Some(target) = remote_branch.get().target() {
            let _ = revwalk.hide(target);
        }
    }

    Ok(revwalk.count() > 0)
}

/// Remove the worktree's git metadata (never the directory contents as a
/// separate step — `prune` handles both in one libgit2 call).
pub fn remove_worktree(repo_root: &Path, name: &str) -> Result<(), WorktreeError> {
    let repo = Repository::open(repo_root).map_err(|e| wrap(repo_root, e))?;
    let wt = repo.find_worktree(name).map_err(|e| wrap(repo_root, e))?;
    let mut opts = git2::WorktreePruneOptions::new();
    opts.valid(true).locked(true).working_tree(true);
    wt.prune(Some(&mut opts)).map_err(|e| wrap(repo_root, e))?;
    Ok(())
}

pub fn remove_branch(repo_root: &Path, name: &str) -> Result<(), WorktreeError> {
    let repo = Repository::open(repo_root).map_err(|e| wrap(repo_root, e))?;
    let mut branch = repo
        .find_branch(name, BranchType::Local)
        .map_err(|e| wrap(repo_root, e))?;
    branch.delete().map_err(|e| wrap(repo_root, e))?;
    Ok(())
}
