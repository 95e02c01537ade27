//! Command-line surface (spec §6). Grounded on `agent/src/cli/args.rs`
//! (global env-backed args, `ArgAction::Count` verbosity).

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "claude-swarm", about = "Orchestrate a declarative team of LLM agents")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// -v info, -vv debug, -vvv+ trace.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[arg(long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Primary entry point: launch a swarm from a config document.
    Start {
        config_path: PathBuf,

        #[arg(long)]
        prompt: Option<String>,

        #[arg(long)]
        vibe: bool,

        #[arg(long)]
        session_id: Option<String>,

        /// `--worktree` with no value means "auto-generate a name".
        #[arg(long, num_args = 0..=1, default_missing_value = "true")]
        worktree: Option<String>,
    },

    /// Internal re-entry used by generated manifests: spawns one agent
    /// executor and serves the `task` tool on stdio.
    McpServe {
        #[arg(long)]
        agent_name: String,

        #[arg(long)]
        agent_id: String,

        #[arg(long)]
        calling_agent: Option<String>,

        #[arg(long)]
        calling_agent_id: Option<String>,

        #[arg(long)]
        directory: Vec<PathBuf>,

        #[arg(long)]
        model: Option<String>,

        #[arg(long)]
        provider: Option<String>,

        #[arg(long)]
        temperature: Option<f64>,

        #[arg(long)]
        reasoning_effort: Option<String>,

        #[arg(long)]
        connection_mcp_config: Option<PathBuf>,

        #[arg(long)]
        prompt_file: Option<PathBuf>,

        #[arg(long)]
        vibe: bool,

        #[arg(long)]
        allowed_tools: Vec<String>,

        #[arg(long)]
        disallowed_tools: Vec<String>,

        /// This agent's own delegation targets, forwarded so its
        /// `mcp__<child>` tool names compose correctly one level down.
        #[arg(long)]
        connections: Vec<String>,

        /// Serves the foreign-provider toolbox manifest instead of a task
        /// tool (see `mcp::topology`'s sibling `_llm_mcp_connections.json`).
        #[arg(long)]
        toolbox: bool,
    },

    /// Replay a recorded session; skips pre-/post-commands.
    Restore { session_path: PathBuf },

    /// Template-driven assistant for authoring a config. Out of scope for
    /// this engine (spec §1); kept visible in the CLI surface rather than
    /// silently removed.
    Generate {
        #[arg(long)]
        output: Option<PathBuf>,

        #[arg(long)]
        model: Option<String>,
    },

    /// Print the tool version.
    Version,
}
