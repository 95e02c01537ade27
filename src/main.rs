//! Slim CLI dispatcher. Grounded on `agent/src/main.rs`'s `init_tracing`
//! and `dispatch()` match.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use claude_swarm::cli::{Cli, Commands};
use claude_swarm::config::REASONING_MODEL_ALLOWLIST;
use claude_swarm::executor::{build_executor, tool_server, ExecutorConfig};
use claude_swarm::orchestrator::{Orchestrator, RunOptions};
use claude_swarm::session;

/// - 0: warn (default)
/// - 1: info (-v)
/// - 2: debug (-vv)
/// - 3+: trace (-vvv)
///
/// Set `LOG_FORMAT=json` for structured JSON output.
fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level.to_string()));

    let use_json = std::env::var("LOG_FORMAT").map(|v| v.eq_ignore_ascii_case("json")).unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if use_json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = dispatch(cli).await?;
    std::process::exit(exit_code);
}

async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Commands::Start { config_path, prompt, vibe, session_id, worktree } => {
            run_start(config_path, prompt, vibe, session_id, worktree, None, cli.debug).await
        }
        Commands::Restore { session_path } => run_restore(session_path, cli.debug).await,
        Commands::McpServe {
            agent_name,
            agent_id,
            calling_agent,
            calling_agent_id,
            directory,
            model,
            provider,
            temperature,
            reasoning_effort,
            connection_mcp_config,
            prompt_file,
            vibe,
            allowed_tools,
            disallowed_tools,
            connections,
            toolbox,
        } => {
            run_mcp_serve(
                agent_name,
                agent_id,
                calling_agent,
                calling_agent_id,
                directory,
                model,
                provider,
                temperature,
                reasoning_effort,
                connection_mcp_config,
                prompt_file,
                vibe,
                allowed_tools,
                disallowed_tools,
                connections,
                toolbox,
            )
            .await
        }
        Commands::Generate { .. } => {
            println!("config generation is delegated to an external assistant; not implemented by this engine");
            Ok(0)
        }
        Commands::Version => {
            println!("claude-swarm {}", env!("CARGO_PKG_VERSION"));
            Ok(0)
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_start(
    config_path: PathBuf,
    prompt: Option<String>,
    vibe: bool,
    session_id: Option<String>,
    worktree: Option<String>,
    restore_session_path: Option<PathBuf>,
    debug: bool,
) -> anyhow::Result<i32> {
    let swarm_binary = std::env::current_exe()?;
    let orchestrator = Orchestrator::new(session::resolve_home(), swarm_binary);

    let options = RunOptions {
        prompt,
        vibe,
        debug,
        session_id,
        worktree,
        restore_session_path,
    };

    match orchestrator.run(&config_path, options).await {
        Ok(code) => Ok(code),
        Err(e) => {
            if debug {
                eprintln!("{e:?}");
            } else {
                eprintln!("error: {e}");
            }
            Ok(1)
        }
    }
}

async fn run_restore(session_path: PathBuf, debug: bool) -> anyhow::Result<i32> {
    let config_path = session_path.join("config.yml");
    run_start(config_path, None, false, None, None, Some(session_path), debug).await
}

#[allow(clippy::too_many_arguments)]
async fn run_mcp_serve(
    agent_name: String,
    agent_id: String,
    calling_agent: Option<String>,
    calling_agent_id: Option<String>,
    directory: Vec<PathBuf>,
    model: Option<String>,
    provider: Option<String>,
    temperature: Option<f64>,
    reasoning_effort: Option<String>,
    connection_mcp_config: Option<PathBuf>,
    prompt_file: Option<PathBuf>,
    vibe: bool,
    allowed_tools: Vec<String>,
    disallowed_tools: Vec<String>,
    connections: Vec<String>,
    _toolbox: bool,
) -> anyhow::Result<i32> {
    let model_name = model.unwrap_or_default();
    let is_reasoning_model = REASONING_MODEL_ALLOWLIST.contains(&model_name.as_str());

    if let Some(effort) = &reasoning_effort {
        let provider_ok = provider.as_deref() == Some("openai");
        if !provider_ok || !is_reasoning_model {
            eprintln!(
                "reasoning_effort is only supported for o-series models. Current model: {model_name}"
            );
            return Ok(1);
        }
        let _ = effort;
    }

    if temperature.is_some() && is_reasoning_model {
        eprintln!("temperature is not supported for reasoning-only model '{model_name}'");
        return Ok(1);
    }

    let working_dir = directory.first().cloned().unwrap_or_else(|| PathBuf::from("."));
    let system_prompt = prompt_file
        .as_ref()
        .and_then(|p| std::fs::read_to_string(p).ok())
        .unwrap_or_default();

    let config = ExecutorConfig {
        working_dir,
        agent_name,
        agent_id,
        caller_name: calling_agent,
        caller_id: calling_agent_id,
        model: model_name,
        system_prompt,
        allowed_tools,
        disallowed_tools,
        connections,
        mcp_manifest_path: connection_mcp_config.unwrap_or_else(|| PathBuf::from("manifest.mcp.json")),
        settings_path: None,
        base_url: None,
        temperature,
        reasoning_effort,
        permissive: vibe,
        resume_session: None,
    };

    let executor = build_executor(provider.as_deref(), config, None);
    let server = tool_server::TaskServer::new(executor);
    tool_server::serve_stdio(server).await?;
    Ok(0)
}
