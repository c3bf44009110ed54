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

use std::time::Duration;
use thiserror::Error;

/// Domain-level errors that don't expose infrastructure details
#[derive(Debug, Clone, Error)]
pub enum DomainError {
    /// Report information collection failed
    #[error("Report collection failed: {0}")]
    CollectionFailed(String),
    /// System information unavailable
    #[error("System information unavailable: {0}")]
    SystemInfoUnavailable(String),
    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    /// Required system tools missing
    #[error("Missing required dependencies: {}", .0.join(", "))]
    MissingDependencies(Vec<String>),
    /// Data parsing failed
    #[error("Data parsing failed: {0}")]
    ParsingFailed(String),
    /// Operation timed out
    #[error("Operation timed out: {0}")]
    Timeout(String),
}

/// Errors raised while producing or writing a report
#[derive(Debug, Clone, Error)]
pub enum ReportError {
    /// Domain operation failed
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// Requested report format is not one of the supported ones
    #[error(
        "Report format value '{requested}' invalid, must be one of: {}",
        quoted_choices(.valid)
    )]
    InvalidFormat { requested: String, valid: Vec<String> },
    /// A required argument was not supplied for the requested output
    #[error("{func} missing 1 required argument: {arg}")]
    MissingRequiredArgument { func: String, arg: String },
    /// Serialization failed
    #[error("Serialization failed: {0}")]
    SerializationFailed(String),
    /// File system operation failed
    #[error("I/O error: {0}")]
    Io(String),
}

/// Format `["csv", "plist"]` as `'csv' or 'plist'`
fn quoted_choices(valid: &[String]) -> String {
    let quoted: Vec<String> = valid.iter().map(|v| format!("'{v}'")).collect();
    match quoted.split_last() {
        Some((last, rest)) if !rest.is_empty() => format!("{} or {}", rest.join(", "), last),
        _ => quoted.join(", "),
    }
}

/// Command execution errors
///
/// Lets callers tell a missing tool from a failing one and from one whose
/// output could not be decoded.
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    /// The executable does not exist
    #[error("Command not found: {0}")]
    NotFound(String),
    /// The command ran but exited with an unexpected status
    #[error("{}", describe_failure(.command, .exit_code, .stderr))]
    Failed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },
    /// The command succeeded but its output could not be decoded
    #[error("Malformed output from '{command}': {reason}")]
    Malformed { command: String, reason: String },
    /// The command did not finish in time
    #[error("Command '{command}' timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },
    /// The process could not be spawned or waited on
    #[error("Command execution failed: {0}")]
    ExecutionFailed(String),
    /// Invalid command arguments
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

fn describe_failure(command: &str, exit_code: &Option<i32>, stderr: &str) -> String {
    let mut message = format!("Command '{command}' failed");
    if let Some(code) = exit_code {
        message.push_str(&format!(" with exit code {code}"));
    }
    if !stderr.is_empty() {
        message.push_str(&format!(": {stderr}"));
    }
    message
}

/// System-level errors for adapters (not exposed to domain)
#[derive(Debug, Clone, Error)]
pub enum SystemError {
    /// Command invocation failed
    #[error(transparent)]
    Command(#[from] CommandError),
    /// I/O operation failed
    #[error("I/O error: {0}")]
    IoError(String),
    /// Parsing error
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Convert system errors to domain errors (with context loss for abstraction)
impl From<SystemError> for DomainError {
    fn from(err: SystemError) -> Self {
        match err {
            SystemError::Command(CommandError::NotFound(cmd)) => {
                DomainError::MissingDependencies(vec![cmd])
            }
            SystemError::Command(CommandError::Failed { command, .. }) => {
                DomainError::CollectionFailed(format!("System command failed: {command}"))
            }
            SystemError::Command(CommandError::Malformed { command, reason }) => {
                DomainError::ParsingFailed(format!("{command}: {reason}"))
            }
            SystemError::Command(CommandError::Timeout { command, .. }) => {
                DomainError::Timeout(command)
            }
            SystemError::Command(other) => DomainError::SystemInfoUnavailable(other.to_string()),
            SystemError::IoError(msg) => {
                DomainError::SystemInfoUnavailable(format!("I/O error: {msg}"))
            }
            SystemError::ParseError(msg) => DomainError::ParsingFailed(msg),
        }
    }
}

impl From<CommandError> for DomainError {
    fn from(err: CommandError) -> Self {
        SystemError::Command(err).into()
    }
}

/// Preference store errors
#[derive(Debug, Clone, Error)]
pub enum PreferenceError {
    /// Reading or writing a preference file failed
    #[error("I/O error on {path}: {reason}")]
    Io { path: String, reason: String },
    /// A preference file could not be parsed
    #[error("Invalid property list {path}: {reason}")]
    Parse { path: String, reason: String },
    /// Encoding the updated domain failed
    #[error("Serialization failed: {0}")]
    Serialization(String),
    /// Handing the domain to cfprefsd failed
    #[error(transparent)]
    Command(#[from] CommandError),
}
