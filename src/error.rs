//! Error taxonomy for the orchestration engine.
//!
//! Each variant corresponds to one row of the error-handling table: origin,
//! propagation rule, and fatality are all decided by the caller matching on
//! the variant, not by this type itself.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading, templating, or validating a config document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}:{line}: {message}")]
    Template {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("{path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("unsupported config version: expected 1, found {found}")]
    UnsupportedVersion { found: i64 },

    #[error("main agent '{name}' is not defined in instances")]
    UnknownMainAgent { name: String },

    #[error("agent '{from}' connects to unknown agent '{to}'")]
    UnknownConnection { from: String, to: String },

    #[error("Circular dependency detected: {0}")]
    Cycle(String),

    #[error("{field} must be a sequence of strings, found {found}")]
    NotASequence { field: String, found: String },

    #[error("external MCP server '{name}' of type '{kind}' is missing required field '{field}'")]
    MissingMcpField {
        name: String,
        kind: String,
        field: String,
    },

    #[error("external MCP server '{name}' has unknown type '{kind}'")]
    UnknownMcpType { name: String, kind: String },

    #[error("working directory '{path}' for agent '{agent}' does not exist")]
    MissingWorkingDirectory { agent: String, path: PathBuf },

    #[error("temperature is not supported for reasoning-only model '{model}'")]
    TemperatureNotSupported { model: String },

    #[error("reasoning_effort is only supported for o-series models. Current model: {model}")]
    ReasoningEffortNotSupported { model: String },

    #[error("external agent file '{path}' must have a .md extension")]
    BadExternalExtension { path: PathBuf },

    #[error("external agent file '{path}' has an unclosed frontmatter block")]
    UnclosedFrontmatter { path: PathBuf },
}

/// Errors raised by the Worktree Manager during allocation or teardown.
#[derive(Debug, Error)]
pub enum WorktreeError {
    #[error("git error at '{path}': {source}")]
    Git {
        path: PathBuf,
        #[source]
        source: git2::Error,
    },

    #[error("worktree restoration failed: recorded path '{path}' for repo '{repo}' is missing")]
    MissingRestorePath { repo: String, path: PathBuf },

    #[error("refusing to remove worktree '{path}': {reason}")]
    UnsafeRemoval { path: PathBuf, reason: String },
}

impl From<std::io::Error> for WorktreeError {
    fn from(source: std::io::Error) -> Self {
        WorktreeError::Git {
            path: PathBuf::new(),
            source: git2::Error::from_str(&source.to_string()),
        }
    }
}

/// Errors surfaced by an Agent Executor.
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("executor for '{agent}' failed: {message}")]
    Provider { agent: String, message: String },

    #[error("executor for '{agent}' returned an empty or whitespace-only result")]
    EmptyResult { agent: String },

    #[error("io error driving executor for '{agent}': {source}")]
    Io {
        agent: String,
        #[source]
        source: std::io::Error,
    },
}

/// Raised by the Supervisor when a child exits with a non-cooperative,
/// non-zero status.
#[derive(Debug, Error)]
#[error("command failed with status {status}: {command}")]
pub struct CommandFailed {
    pub status: i32,
    pub command: String,
}

/// Raised by the Supervisor when a child exits 143 (128 + SIGTERM). Carried
/// as a distinct type so callers can match on it without inspecting a raw
/// exit code; it is a warning, never escalated.
#[derive(Debug, Error)]
#[error("command '{command}' timed out cooperatively (exit 143)")]
pub struct CooperativeTimeout {
    pub command: String,
}

/// Raised by the Orchestrator on the restore path. Fatal; no partial
/// rehydration is attempted once this is raised.
#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("session path '{0}' does not exist")]
    MissingSession(PathBuf),

    #[error("session metadata at '{0}' is invalid: {1}")]
    InvalidMetadata(PathBuf, String),

    #[error(transparent)]
    Worktree(#[from] WorktreeError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Top-level error union used by the Orchestrator's own `Result` return
/// type; each row still carries enough identity to recover the original
/// table-driven propagation rule at the call site.
#[derive(Debug, Error)]
pub enum SwarmError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Worktree(#[from] WorktreeError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(transparent)]
    CommandFailed(#[from] CommandFailed),

    #[error(transparent)]
    Restore(#[from] RestoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
