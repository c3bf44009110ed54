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

//! Command executor that replays recorded outputs
//!
//! Lets reports be rebuilt from captured tool output (e.g. a support bundle
//! from another Mac) and backs the tests of everything above the executor.

use crate::domain::CommandError;
use crate::ports::{CommandExecutor, CommandOutput, SystemCommand};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Executor answering from a table of `program + args` → output
#[derive(Default)]
pub struct CannedCommandExecutor {
    outputs: HashMap<String, CommandOutput>,
    available: HashSet<String>,
    calls: Mutex<Vec<SystemCommand>>,
}

impl CannedCommandExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(program: &str, args: &[String]) -> String {
        let mut key = program.to_string();
        for arg in args {
            key.push('\u{1f}');
            key.push_str(arg);
        }
        key
    }

    /// Register the output returned for `program` invoked with exactly `args`
    ///
    /// The program also becomes available.
    pub fn with_output(mut self, program: &str, args: &[&str], output: CommandOutput) -> Self {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        self.outputs.insert(Self::key(program, &args), output);
        self.available.insert(program.to_string());
        self
    }

    /// Register a successful invocation printing `stdout`
    pub fn with_stdout(self, program: &str, args: &[&str], stdout: &str) -> Self {
        self.with_output(program, args, CommandOutput::new(stdout, "", 0))
    }

    /// Mark a program as installed without registering any output
    pub fn with_available(mut self, program: &str) -> Self {
        self.available.insert(program.to_string());
        self
    }

    /// Commands executed so far, in order
    pub fn calls(&self) -> Vec<SystemCommand> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CommandExecutor for CannedCommandExecutor {
    async fn execute(&self, command: &SystemCommand) -> Result<CommandOutput, CommandError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(command.clone());
        }

        if let Some(output) = self.outputs.get(&Self::key(&command.program, &command.args)) {
            return Ok(output.clone());
        }

        if self.available.contains(&command.program) {
            Err(CommandError::ExecutionFailed(format!(
                "No recorded output for '{}'",
                command.command_line()
            )))
        } else {
            Err(CommandError::NotFound(command.program.clone()))
        }
    }

    async fn is_command_available(&self, command_name: &str) -> Result<bool, CommandError> {
        Ok(self.available.contains(command_name))
    }
}
