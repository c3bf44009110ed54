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

//! macOS system information provider

use crate::adapters::secondary::command::binaries::{
    Binary, BinaryRunner, Invocation, AIRPORT, SCUTIL, SW_VERS, SYSCTL, SYSTEM_PROFILER,
};
use crate::domain::{parse_strings_table, Localisation, ReportValue, SystemError};
use crate::ports::{CommandExecutor, SystemInfoProvider};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Location of the System Profiler reporter bundles
pub const SYSTEM_PROFILER_ROOT: &str = "/System/Library/SystemProfiler";

/// Tools the built-in reports cannot run without
const REQUIRED_BINARIES: &[Binary] = &[SYSTEM_PROFILER, AIRPORT, SW_VERS, SYSCTL, SCUTIL];

/// macOS system information provider using system_profiler and other macOS tools
pub struct MacOSSystemInfoProvider {
    runner: BinaryRunner,
    profiler_root: PathBuf,
    timeout: Option<Duration>,
}

impl MacOSSystemInfoProvider {
    /// Create a new macOS system information provider
    pub fn new(command_executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            runner: BinaryRunner::new(command_executor),
            profiler_root: PathBuf::from(SYSTEM_PROFILER_ROOT),
            timeout: None,
        }
    }

    /// Read reporter bundles from another root
    pub fn with_profiler_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.profiler_root = root.into();
        self
    }

    /// Limit how long any single tool may run
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn invocation(&self, args: &[&str]) -> Invocation {
        let invocation = Invocation::new(args);
        match self.timeout {
            Some(limit) => invocation.timeout(limit),
            None => invocation,
        }
    }

    async fn text(&self, binary: &Binary, invocation: Invocation) -> Result<String, SystemError> {
        let decoded = self.runner.run(binary, invocation).await?;
        Ok(decoded.into_text().unwrap_or_default())
    }

    fn strings_path(&self, reporter: &str, locale: &str) -> PathBuf {
        self.profiler_root
            .join(reporter)
            .join("Contents")
            .join("Resources")
            .join(format!("{locale}.lproj"))
            .join("Localizable.strings")
    }

    /// Check which of the given tools are missing
    pub async fn check_binaries(&self, binaries: &[Binary]) -> Vec<String> {
        let mut missing = Vec::new();
        for binary in binaries {
            if !self.runner.is_available(binary).await {
                missing.push(binary.name.to_string());
            }
        }
        missing
    }
}

async fn read_strings_table(path: &Path) -> Result<Option<Vec<u8>>, SystemError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SystemError::IoError(format!(
            "Failed to read {}: {}",
            path.display(),
            e
        ))),
    }
}

#[async_trait]
impl SystemInfoProvider for MacOSSystemInfoProvider {
    async fn system_profiler(&self, data_type: &str) -> Result<ReportValue, SystemError> {
        let invocation = self.invocation(&["-detaillevel", "full", "-json", data_type]);
        let decoded = self.runner.run(&SYSTEM_PROFILER, invocation).await?;
        Ok(decoded.into_value().unwrap_or_default())
    }

    async fn airport_info(&self) -> Result<String, SystemError> {
        self.text(&AIRPORT, self.invocation(&["-I"])).await
    }

    async fn sw_vers(&self, option: &str) -> Result<String, SystemError> {
        self.text(&SW_VERS, self.invocation(&[option])).await
    }

    async fn sysctl(&self, name: &str) -> Result<String, SystemError> {
        self.text(&SYSCTL, self.invocation(&["-in", name])).await
    }

    async fn console_user_state(&self) -> Result<String, SystemError> {
        let invocation = self.invocation(&[]).stdin("show State:/Users/ConsoleUser\n");
        self.text(&SCUTIL, invocation).await
    }

    async fn localisation(
        &self,
        reporter: &str,
        locale: &str,
    ) -> Result<Localisation, SystemError> {
        let mut localisation = Localisation::new();
        let path = self.strings_path(reporter, locale);

        match read_strings_table(&path).await? {
            Some(bytes) => {
                let table = parse_strings_table(&bytes).map_err(|e| {
                    SystemError::ParseError(format!("{}: {}", path.display(), e))
                })?;
                log::debug!("Loaded {} strings from {}", table.len(), path.display());
                localisation.insert_table(locale, table);
            }
            None => log::debug!("No string table at {}", path.display()),
        }

        Ok(localisation)
    }

    fn effective_uid(&self) -> u32 {
        // SAFETY: geteuid has no preconditions and cannot fail
        unsafe { libc::geteuid() }
    }

    async fn get_missing_dependencies(&self) -> Result<Vec<String>, SystemError> {
        Ok(self.check_binaries(REQUIRED_BINARIES).await)
    }
}
