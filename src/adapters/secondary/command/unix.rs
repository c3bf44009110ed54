/*
Copyright 2024 San Francisco Compute Company

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

//! Unix command execution adapter

use crate::domain::CommandError;
use crate::ports::{CommandExecutor, CommandOutput, SystemCommand};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

/// Unix-based command executor with optional timeouts
///
/// Commands run once; a failing command is reported to the caller, never retried.
pub struct UnixCommandExecutor {
    /// Timeout applied to commands that don't set their own
    default_timeout: Option<Duration>,
}

impl UnixCommandExecutor {
    /// Create a new Unix command executor
    ///
    /// # Arguments
    /// * `default_timeout` - Timeout for commands without one; `None` waits for exit
    pub fn new(default_timeout: Option<Duration>) -> Self {
        Self { default_timeout }
    }

    /// Create a Unix command executor with default settings (no timeout)
    pub fn with_defaults() -> Self {
        Self::new(None)
    }

    async fn run(&self, command: &SystemCommand) -> Result<CommandOutput, CommandError> {
        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args);

        cmd.stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if command.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        log::debug!("Executing: {}", command.command_line());

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CommandError::NotFound(command.program.clone()),
            _ => CommandError::ExecutionFailed(format!(
                "Failed to execute command '{}': {}",
                command.program, e
            )),
        })?;

        if let (Some(input), Some(mut stdin)) = (command.stdin.as_ref(), child.stdin.take()) {
            stdin.write_all(input.as_bytes()).await.map_err(|e| {
                CommandError::ExecutionFailed(format!(
                    "Failed to write stdin of '{}': {}",
                    command.program, e
                ))
            })?;
            // dropping stdin closes the pipe so the child sees EOF
        }

        let output = match command.timeout.or(self.default_timeout) {
            Some(limit) => timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| CommandError::Timeout {
                    command: command.program.clone(),
                    timeout: limit,
                })?,
            None => child.wait_with_output().await,
        }
        .map_err(|e| {
            CommandError::ExecutionFailed(format!(
                "Failed to execute command '{}': {}",
                command.program, e
            ))
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let success = output.status.success();
        let exit_code = output.status.code();

        if !success {
            log::debug!(
                "Command '{}' exited with {:?}: {}",
                command.program,
                exit_code,
                stderr.trim()
            );
        }

        Ok(CommandOutput {
            stdout,
            stdout_bytes: output.stdout,
            stderr,
            exit_code,
            success,
        })
    }
}

impl Default for UnixCommandExecutor {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[async_trait]
impl CommandExecutor for UnixCommandExecutor {
    async fn execute(&self, command: &SystemCommand) -> Result<CommandOutput, CommandError> {
        self.run(command).await
    }

    async fn is_command_available(&self, command_name: &str) -> Result<bool, CommandError> {
        if command_name.contains('/') {
            return Ok(Path::new(command_name).exists());
        }

        let which_cmd = SystemCommand::new("which")
            .args(&[command_name])
            .timeout(Duration::from_secs(5));

        match self.execute(&which_cmd).await {
            Ok(output) => Ok(output.success && !output.stdout.trim().is_empty()),
            Err(_) => Ok(false), // If 'which' fails, assume command is not available
        }
    }
}
