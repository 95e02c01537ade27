//! Supervisor (C8): thin OS wrapper around a single child process. Spawns
//! the child, yields its pid to a callback (so the Orchestrator can write
//! `main_pid` and register it for signal forwarding), and waits for it.
//!
//! Grounded on `agent/src/mcps/daemon.rs`'s child-process lifecycle
//! management, generalized from a long-lived MCP server child to a single
//! supervised "main agent" child.

use std::collections::HashMap;
use std::path::Path;

use tokio::process::Command;
use tracing::warn;

use crate::error::CommandFailed;

pub enum Outcome {
    Success,
    CooperativeTimeout,
}

/// Spawn `command args...` in `chdir` with `env` applied on top of the
/// inherited environment, invoke `on_pid` with the child's pid as soon as
/// it is known, then wait for it to exit. Stdin/stdout/stderr are
/// inherited unchanged.
pub async fn system_with_pid(
    command: &str,
    args: &[String],
    chdir: &Path,
    env: &HashMap<String, String>,
    on_pid: impl FnOnce(u32),
) -> Result<Outcome, CommandFailed> {
    let mut cmd = Command::new(command);
    cmd.args(args).current_dir(chdir).envs(env);

    #[cfg(unix)]
    {
        cmd.process_group(0);
    }

    let rendered = render_command(command, args);

    let mut child = cmd.spawn().map_err(|e| CommandFailed {
        status: -1,
        command: format!("{rendered}: failed to spawn: {e}"),
    })?;

    if let Some(pid) = child.id() {
        on_pid(pid);
    }

    let status = child.wait().await.map_err(|e| CommandFailed {
        status: -1,
        command: format!("{rendered}: failed to wait: {e}"),
    })?;

    interpret(status, &rendered)
}

fn interpret(status: std::process::ExitStatus, rendered: &str) -> Result<Outcome, CommandFailed> {
    match status.code() {
        Some(0) => Ok(Outcome::Success),
        Some(143) => {
            warn!(command = %rendered, "command timed out cooperatively (exit 143)");
            Ok(Outcome::CooperativeTimeout)
        }
        Some(code) => Err(CommandFailed {
            status: code,
            command: rendered.to_string(),
        }),
        None => Err(CommandFailed {
            status: -1,
            command: format!("{rendered}: terminated by signal"),
        }),
    }
}

fn render_command(command: &str, args: &[String]) -> String {
    let mut parts = vec![command.to_string()];
    parts.extend(args.iter().cloned());
    parts.join(" ")
}

/// Forward a signal to the child's entire process group. Requires the
/// child to have been spawned with `process_group(0)` (a fresh pgid equal
/// to its own pid).
#[cfg(unix)]
pub fn forward_signal(pid: u32, signal: i32) {
    unsafe {
        libc::kill(-(pid as libc::pid_t), signal);
    }
}

#[cfg(not(unix))]
pub fn forward_signal(_pid: u32, _signal: i32) {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_command_with_args() {
        assert_eq!(render_command("claude", &["-p".to_string(), "hi".to_string()]), "claude -p hi");
    }
}
