use crate::error::ApiError;
use log::{info, warn};
use serde::Serialize;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Generous fixed bound on local command execution. There is no cancellation
/// beyond this.
pub const COMMAND_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    #[serde(rename = "exitCode")]
    pub exit_code: Option<i32>,
}

/// Runs a local command with an argv vector. Arguments are passed to the OS
/// verbatim; nothing is ever interpolated into a shell string, so neither
/// user input nor credentials can change what gets executed.
pub async fn run_command(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
) -> Result<CommandOutput, ApiError> {
    info!("Executing: {} {:?}", program, args);

    let mut command = Command::new(program);
    command.args(args).kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let output = match timeout(Duration::from_secs(COMMAND_TIMEOUT_SECS), command.output()).await {
        Ok(result) => result?,
        Err(_) => {
            warn!("Command '{}' exceeded {}s timeout", program, COMMAND_TIMEOUT_SECS);
            return Err(ApiError::Timeout(COMMAND_TIMEOUT_SECS));
        }
    };

    Ok(CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        exit_code: output.status.code(),
    })
}
