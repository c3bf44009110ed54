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

//! Wrappers around the system binaries the reports are built from
//!
//! Every tool lives at a fixed absolute path. Output is captured and decoded
//! as text, JSON or a property list depending on the tool and arguments.

use crate::domain::{parse_json_text, parse_plist_bytes, CommandError, OutputKind, ReportValue};
use crate::ports::{CommandExecutor, CommandOutput, SystemCommand};
use std::sync::Arc;
use std::time::Duration;

/// A system tool at a fixed location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binary {
    /// Short name used in logs and dependency reports
    pub name: &'static str,
    /// Candidate absolute paths, first existing one wins
    pub paths: &'static [&'static str],
    /// How stdout is decoded by default
    pub output: OutputKind,
    /// Arguments that switch the tool to property list output
    pub plist_flags: &'static [&'static str],
    /// Third-party tools that are not installed on every Mac
    pub optional: bool,
}

impl Binary {
    const fn text(name: &'static str, paths: &'static [&'static str]) -> Self {
        Self {
            name,
            paths,
            output: OutputKind::Text,
            plist_flags: &[],
            optional: false,
        }
    }

    /// Output kind for the given arguments
    pub fn output_for<S: AsRef<str>>(&self, args: &[S]) -> OutputKind {
        let wants_plist = args
            .iter()
            .any(|arg| self.plist_flags.iter().any(|flag| *flag == arg.as_ref()));
        if wants_plist {
            OutputKind::Plist
        } else {
            self.output
        }
    }
}

pub const AIRPORT: Binary = Binary::text(
    "airport",
    &["/System/Library/PrivateFrameworks/Apple80211.framework/Versions/Current/Resources/airport"],
);
pub const DEFAULTS: Binary = Binary::text("defaults", &["/usr/bin/defaults"]);
pub const DISKUTIL: Binary = Binary {
    plist_flags: &["-plist", "plist"],
    ..Binary::text("diskutil", &["/usr/sbin/diskutil"])
};
pub const FDESETUP: Binary = Binary::text("fdesetup", &["/usr/sbin/fdesetup"]);
pub const LPADMIN: Binary = Binary::text("lpadmin", &["/usr/sbin/lpadmin"]);
pub const LPOPTIONS: Binary = Binary::text("lpoptions", &["/usr/bin/lpoptions"]);
pub const SCUTIL: Binary = Binary::text("scutil", &["/usr/sbin/scutil"]);
pub const SW_VERS: Binary = Binary::text("sw_vers", &["/usr/bin/sw_vers"]);
pub const SYSCTL: Binary = Binary::text("sysctl", &["/usr/sbin/sysctl"]);
pub const SYSTEM_PROFILER: Binary = Binary {
    output: OutputKind::Json,
    ..Binary::text("system_profiler", &["/usr/sbin/system_profiler"])
};
pub const SMARTCTL: Binary = Binary {
    optional: true,
    ..Binary::text("smartctl", &["/usr/local/sbin/smartctl"])
};
pub const SMC: Binary = Binary {
    optional: true,
    ..Binary::text("smc", &["/usr/local/munki/smc", "/usr/local/munkireport/smc"])
};

/// Options for one invocation of a wrapped tool
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub args: Vec<String>,
    pub stdin: Option<String>,
    /// Decoding override; defaults to what the tool and arguments imply
    pub output: Option<OutputKind>,
    /// When false the raw `CommandOutput` is returned undecoded
    pub capture_output: bool,
    /// Exit code that means success
    pub success_code: i32,
    pub timeout: Option<Duration>,
}

impl Invocation {
    pub fn new<S: AsRef<str>>(args: &[S]) -> Self {
        Self {
            args: args.iter().map(|a| a.as_ref().to_string()).collect(),
            stdin: None,
            output: None,
            capture_output: true,
            success_code: 0,
            timeout: None,
        }
    }

    pub fn stdin(mut self, input: &str) -> Self {
        self.stdin = Some(input.to_string());
        self
    }

    pub fn output(mut self, kind: OutputKind) -> Self {
        self.output = Some(kind);
        self
    }

    pub fn capture_output(mut self, capture: bool) -> Self {
        self.capture_output = capture;
        self
    }

    pub fn success_code(mut self, code: i32) -> Self {
        self.success_code = code;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Decoded result of a successful invocation
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// Trimmed standard output
    Text(String),
    /// Parsed JSON or property list
    Value(ReportValue),
    /// Output was not captured; the completed process record
    Completed(CommandOutput),
}

impl Decoded {
    pub fn into_text(self) -> Option<String> {
        match self {
            Decoded::Text(text) => Some(text),
            Decoded::Value(ReportValue::String(text)) => Some(text),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<ReportValue> {
        match self {
            Decoded::Value(value) => Some(value),
            Decoded::Text(text) => Some(ReportValue::String(text)),
            Decoded::Completed(_) => None,
        }
    }
}

/// Runs wrapped tools through a command executor and decodes their output
#[derive(Clone)]
pub struct BinaryRunner {
    executor: Arc<dyn CommandExecutor>,
}

impl BinaryRunner {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self { executor }
    }

    /// First existing path of `binary`
    pub async fn resolve(&self, binary: &Binary) -> Result<&'static str, CommandError> {
        for &path in binary.paths {
            if self.executor.is_command_available(path).await? {
                return Ok(path);
            }
        }
        Err(CommandError::NotFound(binary.name.to_string()))
    }

    /// Whether `binary` is installed
    pub async fn is_available(&self, binary: &Binary) -> bool {
        self.resolve(binary).await.is_ok()
    }

    /// Run `binary` and decode its output
    ///
    /// # Returns
    /// * `Ok(Decoded)` - Decoded output (or the raw record if not captured)
    /// * `Err(CommandError::NotFound)` - The tool is not installed
    /// * `Err(CommandError::Failed)` - The tool exited with an unexpected code
    /// * `Err(CommandError::Malformed)` - The output could not be decoded
    pub async fn run(
        &self,
        binary: &Binary,
        invocation: Invocation,
    ) -> Result<Decoded, CommandError> {
        let path = self.resolve(binary).await?;

        let mut command = SystemCommand::new(path).args(&invocation.args);
        if let Some(ref input) = invocation.stdin {
            command = command.stdin(input);
        }
        if let Some(limit) = invocation.timeout {
            command = command.timeout(limit);
        }

        let output = self.executor.execute(&command).await?;

        if output.exit_code != Some(invocation.success_code) {
            let code = output
                .exit_code
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            log::error!("Error [{}]: {}", code, output.stderr.trim());
            return Err(CommandError::Failed {
                command: command.command_line(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        if !invocation.capture_output {
            return Ok(Decoded::Completed(output));
        }

        let kind = invocation
            .output
            .unwrap_or_else(|| binary.output_for(&invocation.args));
        decode(&command, &output, kind)
    }

    /// Run `binary` and return its trimmed text output
    pub async fn text(&self, binary: &Binary, args: &[&str]) -> Result<String, CommandError> {
        self.run(binary, Invocation::new(args).output(OutputKind::Text))
            .await
            .map(|decoded| decoded.into_text().unwrap_or_default())
    }

    /// Run `binary` and return its decoded structured output
    ///
    /// The output kind follows the tool's convention (e.g. `diskutil -plist`).
    pub async fn value(&self, binary: &Binary, args: &[&str]) -> Result<ReportValue, CommandError> {
        self.run(binary, Invocation::new(args))
            .await
            .map(|decoded| decoded.into_value().unwrap_or_default())
    }

    /// `system_profiler -detaillevel full -json <data_type>`
    ///
    /// JSON output needs macOS 10.15 or later.
    pub async fn system_profiler(&self, data_type: &str) -> Result<ReportValue, CommandError> {
        self.value(
            &SYSTEM_PROFILER,
            &["-detaillevel", "full", "-json", data_type],
        )
        .await
    }
}

fn decode(
    command: &SystemCommand,
    output: &CommandOutput,
    kind: OutputKind,
) -> Result<Decoded, CommandError> {
    let malformed = |reason: String| CommandError::Malformed {
        command: command.command_line(),
        reason,
    };

    match kind {
        OutputKind::Text => Ok(Decoded::Text(output.stdout.trim().to_string())),
        OutputKind::Json => parse_json_text(&output.stdout)
            .map(Decoded::Value)
            .map_err(malformed),
        OutputKind::Plist => parse_plist_bytes(&output.stdout_bytes)
            .map(Decoded::Value)
            .map_err(malformed),
    }
}
