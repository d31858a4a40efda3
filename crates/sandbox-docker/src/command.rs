use std::ffi::OsStr;
use std::path::Path;

use tokio::process::Command;
use tracing::trace;

/// Error from a failed command.
#[derive(Debug, thiserror::Error)]
#[error("command failed: {command}\n{detail}")]
pub struct CommandError {
    pub command: String,
    pub detail: String,
    /// The program could not be spawned at all (as opposed to exiting nonzero).
    pub spawn_failed: bool,
}

impl CommandError {
    /// Whether the failure came from missing rights, either on the binary
    /// itself or on the daemon socket it talks to.
    pub fn is_permission_denied(&self) -> bool {
        self.detail.to_ascii_lowercase().contains("permission denied")
    }
}

/// Format a human-readable display string for a direct command invocation.
fn format_command_display(program: &Path, args: &[&str]) -> String {
    let program = program.display().to_string();
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push(program.as_str());
    parts.extend_from_slice(args);
    parts.join(" ")
}

/// Execute a command.
///
/// Invokes the program binary directly with the given arguments.
/// Returns trimmed stdout on success.
pub async fn exec(program: &Path, args: &[&str]) -> Result<String, CommandError> {
    let cmd_display = format_command_display(program, args);
    trace!(command = %cmd_display, "exec");

    let output = Command::new(OsStr::new(program))
        .args(args)
        .output()
        .await
        .map_err(|e| CommandError {
            command: cmd_display.clone(),
            detail: e.to_string(),
            spawn_failed: true,
        })?;

    if output.status.success() {
        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(stdout)
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(CommandError {
            command: cmd_display,
            detail: stderr,
            spawn_failed: false,
        })
    }
}

/// Execute a command, ignoring any errors.
pub async fn exec_ignore_errors(program: &Path, args: &[&str]) {
    let cmd_display = format_command_display(program, args);
    trace!(command = %cmd_display, "exec_ignore_errors");

    match Command::new(OsStr::new(program)).args(args).output().await {
        Ok(o) if !o.status.success() => {
            let stderr = String::from_utf8_lossy(&o.stderr);
            trace!(command = %cmd_display, stderr = %stderr.trim(), "command failed (ignored)");
        }
        Err(e) => {
            trace!(command = %cmd_display, error = %e, "command failed to spawn (ignored)");
        }
        _ => {}
    }
}
