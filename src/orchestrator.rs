//! Orchestrator (C7): the top-level controller. Validates config,
//! optionally sets up worktrees, generates manifests, runs pre-commands,
//! launches the main agent subprocess, installs signal handlers, runs
//! post-commands, and cleans up.
//!
//! Grounded on `orchestrator/src/engine.rs`'s `WorkflowEngine::execute()`
//! (sequential step execution that must still guarantee cleanup on every
//! exit path).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

use crate::config::{self, AgentSpec, Config, LoadedConfig};
use crate::error::{CommandFailed, ConfigError, RestoreError, SwarmError};
use crate::mcp::topology;
use crate::session::settings::AgentSettings;
use crate::session::{SessionPath, SessionStore};
use crate::signals::{self, ReceivedSignal};
use crate::supervisor::{self, Outcome};
use crate::worktree::{WorktreeManager, WorktreeState};

/// How long to wait for the main agent to exit cooperatively after a
/// forwarded signal before escalating to `SIGKILL`.
const SIGNAL_GRACE_PERIOD: std::time::Duration = std::time::Duration::from_secs(10);

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub prompt: Option<String>,
    pub vibe: bool,
    pub debug: bool,
    pub session_id: Option<String>,
    pub worktree: Option<String>,
    pub restore_session_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Running,
    Post,
    Interrupted,
    Cleanup,
    Done,
}

pub struct Orchestrator {
    pub user_root: PathBuf,
    pub swarm_binary: PathBuf,
}

impl Orchestrator {
    pub fn new(user_root: PathBuf, swarm_binary: PathBuf) -> Self {
        Self { user_root, swarm_binary }
    }

    pub async fn run(&self, config_path: &Path, options: RunOptions) -> Result<i32, SwarmError> {
        let mut state = RunState::Init;
        let mut store = SessionStore::new(self.user_root.clone());

        let restoring = options.restore_session_path.is_some();

        let (loaded, restored_worktree) = if let Some(restore_path) = &options.restore_session_path {
            let restored = SessionStore::restore(restore_path).map_err(|e| {
                SwarmError::Restore(RestoreError::InvalidMetadata(restore_path.clone(), e.to_string()))
            })?;
            let loaded = config::load(config_path, Some(&restored.root_directory))?;
            (loaded, restored.worktree)
        } else {
            (config::load(config_path, None)?, None)
        };

        let LoadedConfig { mut config, base_dir } = loaded;

        let session_id_hint = options.session_id.clone();
        let instance_configs = serde_json::to_value(&config).unwrap_or_default();
        let session_path = store
            .begin(&config.swarm.name, session_id_hint, &base_dir, instance_configs)
            .map_err(SwarmError::Io)?;

        let result = self
            .run_inner(
                &mut state,
                &mut store,
                &session_path,
                &mut config,
                &base_dir,
                &options,
                restoring,
                restored_worktree,
            )
            .await;

        state = RunState::Cleanup;
        let _ = store.end(&session_path);
        info!(?state, "session cleanup complete");

        result
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_inner(
        &self,
        state: &mut RunState,
        store: &mut SessionStore,
        session_path: &SessionPath,
        config: &mut Config,
        base_dir: &Path,
        options: &RunOptions,
        restoring: bool,
        restored_worktree: Option<WorktreeState>,
    ) -> Result<i32, SwarmError> {
        let worktree_manager = WorktreeManager::new(self.user_root.clone());
        let worktree_enabled = options.worktree.is_some()
            || config
                .swarm
                .instances
                .values()
                .filter_map(|s| s.as_spec())
                .any(|spec| spec.worktree.is_some());

        let worktree_state = if restoring {
            let state = restored_worktree.unwrap_or_default();
            worktree_manager.restore(&state)?;
            Some(state)
        } else if worktree_enabled {
            let state = worktree_manager.allocate(
                config,
                &session_path.session_id,
                options.worktree.as_deref(),
                worktree_enabled,
            )?;
            Some(state)
        } else {
            None
        };

        if let Some(ws) = &worktree_state {
            let _ = store.record_worktree(session_path, ws.clone());
        }

        let teardown = |ws: &Option<WorktreeState>| {
            if let Some(ws) = ws {
                if let Err(e) = worktree_manager.teardown(ws) {
                    warn!(error = %e, "worktree teardown failed");
                }
            }
        };

        if !restoring {
            *state = RunState::Running;
            if let Err(e) = self.run_commands(&config.swarm.before, config, base_dir).await {
                teardown(&worktree_state);
                return Err(e.into());
            }
        }

        if !restoring {
            for (name, source) in &config.swarm.instances {
                let Some(spec) = source.as_spec() else { continue };
                for dir in &spec.directory.0 {
                    let resolved = config::resolve_path(base_dir, &dir.to_string_lossy());
                    if !resolved.exists() {
                        teardown(&worktree_state);
                        return Err(ConfigError::MissingWorkingDirectory {
                            agent: name.clone(),
                            path: resolved,
                        }
                        .into());
                    }
                }
            }
        }

        topology::generate_all(config, &self.swarm_binary, &session_path.session_id, &session_path.dir)
            .map_err(|e| {
                teardown(&worktree_state);
                e
            })?;

        let config_yaml = serde_yaml::to_string(&config).unwrap_or_default();
        let _ = std::fs::write(session_path.config_path(), config_yaml);

        let main_spec = config
            .swarm
            .instances
            .get(&config.swarm.main)
            .and_then(|s| s.as_spec())
            .cloned();
        let Some(main_spec) = main_spec else {
            teardown(&worktree_state);
            return Err(ConfigError::UnknownMainAgent {
                name: config.swarm.main.clone(),
            }
            .into());
        };

        let settings = AgentSettings::build(&main_spec.hooks, Some(&session_path.human_log_path()));
        let _ = settings.write(&session_path.agent_settings_path(&config.swarm.main));

        let (command, args) = build_main_command(&config.swarm.main, &main_spec, session_path, options);
        let working_dir = main_spec.directory.0.first().cloned().unwrap_or_else(|| base_dir.to_path_buf());

        let mut env = scrubbed_env();
        env.insert("CLAUDE_SWARM_SESSION_PATH".to_string(), session_path.dir.display().to_string());
        env.insert("CLAUDE_SWARM_ROOT_DIR".to_string(), base_dir.display().to_string());

        let pid_holder = std::sync::Arc::new(std::sync::Mutex::new(0u32));
        let pid_holder_clone = pid_holder.clone();
        let main_pid_path = session_path.main_pid_path();

        let run_future = supervisor::system_with_pid(&command, &args, &working_dir, &env, move |pid| {
            *pid_holder_clone.lock().expect("pid mutex poisoned") = pid;
            let _ = std::fs::write(&main_pid_path, pid.to_string());
        });

        tokio::pin!(run_future);

        let outcome = tokio::select! {
            result = &mut run_future => Ok(result),
            signal = signals::wait_for_signal() => {
                *state = RunState::Interrupted;
                let pid = *pid_holder.lock().expect("pid mutex poisoned");
                if pid != 0 {
                    supervisor::forward_signal(pid, signal.raw());
                }

                // Give the child a grace period to exit cooperatively before
                // escalating; either way, the future is polled to completion
                // so the child is always reaped.
                match tokio::time::timeout(SIGNAL_GRACE_PERIOD, &mut run_future).await {
                    Ok(_) => {}
                    Err(_) => {
                        warn!(pid, "main agent did not exit within the signal grace period; sending SIGKILL");
                        if pid != 0 {
                            supervisor::forward_signal(pid, libc::SIGKILL);
                        }
                        let _ = (&mut run_future).await;
                    }
                }

                Err(signal)
            }
        };

        let exit_code = match outcome {
            Ok(Ok(Outcome::Success)) => 0,
            Ok(Ok(Outcome::CooperativeTimeout)) => 0,
            Ok(Err(failed)) => {
                self.run_post_commands(state, &config.swarm.after, config, base_dir, restoring).await;
                teardown(&worktree_state);
                return Err(SwarmError::CommandFailed(failed));
            }
            Err(signal) => signal.exit_code(),
        };

        *state = RunState::Post;
        self.run_post_commands(state, &config.swarm.after, config, base_dir, restoring).await;

        teardown(&worktree_state);
        *state = RunState::Done;
        Ok(exit_code)
    }

    async fn run_commands(&self, commands: &[String], config: &Config, base_dir: &Path) -> Result<(), CommandFailed> {
        let main_dir = config
            .swarm
            .instances
            .get(&config.swarm.main)
            .and_then(|s| s.as_spec())
            .and_then(|s| s.directory.0.first().cloned())
            .unwrap_or_else(|| base_dir.to_path_buf());

        for command in commands {
            let (cmd, args) = split_shell(command);
            let env = HashMap::new();
            match supervisor::system_with_pid(&cmd, &args, &main_dir, &env, |_| {}).await? {
                Outcome::Success | Outcome::CooperativeTimeout => {}
            }
        }
        Ok(())
    }

    /// Post-commands must run even if the main agent or earlier
    /// post-commands fail; their failures are reported as warnings only.
    async fn run_post_commands(
        &self,
        _state: &mut RunState,
        commands: &[String],
        config: &Config,
        base_dir: &Path,
        restoring: bool,
    ) {
        if restoring {
            return;
        }
        if let Err(e) = self.run_commands(commands, config, base_dir).await {
            warn!(error = %e, "post-command failed");
        }
    }
}

fn scrubbed_env() -> HashMap<String, String> {
    let denylist = topology::scrub_denylist();
    std::env::vars().filter(|(k, _)| !denylist.contains(k)).collect()
}

fn split_shell(command: &str) -> (String, Vec<String>) {
    let mut parts = command.split_whitespace();
    let cmd = parts.next().unwrap_or("true").to_string();
    let args = parts.map(str::to_string).collect();
    (cmd, args)
}

/// Build the main agent's command line per spec §4.7 step 7.
fn build_main_command(
    main_name: &str,
    spec: &AgentSpec,
    session_path: &SessionPath,
    options: &RunOptions,
) -> (String, Vec<String>) {
    let mut args = Vec::new();

    if std::env::var("CLAUDE_SWARM_MODEL_OVERRIDE").is_err() {
        args.push("--model".to_string());
        args.push(spec.model.clone().unwrap_or_else(|| "claude-sonnet-4".to_string()));
    }

    if options.vibe {
        args.push("--dangerously-skip-permissions".to_string());
    } else {
        let mut tools = spec.allowed_tools.clone();
        for c in &spec.connections {
            tools.push(format!("mcp__{c}"));
        }
        tools.retain(|t| !spec.disallowed_tools.contains(t));
        if !tools.is_empty() {
            args.push("--allowedTools".to_string());
            args.push(tools.join(","));
        }
    }

    if !spec.disallowed_tools.is_empty() {
        args.push("--disallowedTools".to_string());
        args.push(spec.disallowed_tools.join(","));
    }

    if !spec.prompt.is_empty() {
        args.push("--append-system-prompt".to_string());
        args.push(spec.prompt.clone());
    }

    args.push("--mcp-config".to_string());
    args.push(session_path.agent_manifest_path(main_name).display().to_string());

    args.push("--settings".to_string());
    args.push(session_path.agent_settings_path(main_name).display().to_string());

    if let Some(prompt) = &options.prompt {
        args.push("-p".to_string());
        args.push(prompt.clone());
    }

    ("claude".to_string(), args)
}
