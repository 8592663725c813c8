// ABOUTME: Shared shell command execution for command-backed collaborators.
// ABOUTME: Runs commands with a RELEVO_* environment contract and captured output.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Result of running one shell command.
#[derive(Debug)]
pub(crate) struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Last non-empty stdout line, used for single-value command contracts.
    pub fn last_line(&self) -> Option<&str> {
        self.stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|l| !l.is_empty())
    }

    /// Short failure description for error messages.
    pub fn failure_reason(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("exited with code {:?}", self.exit_code)
        } else {
            format!("exited with code {:?}: {}", self.exit_code, stderr)
        }
    }
}

/// Run one shell command with the given environment.
pub(crate) async fn run_shell(
    command: &str,
    dir: Option<&Path>,
    env: &HashMap<String, String>,
) -> std::io::Result<CommandOutput> {
    tracing::debug!("running command: {}", command);

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .envs(env)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }

    let output = cmd.output().await?;

    let result = CommandOutput {
        success: output.status.success(),
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    };

    if result.success {
        tracing::debug!("command completed successfully");
    } else {
        tracing::warn!("command failed with exit code {:?}", result.exit_code);
    }

    Ok(result)
}
