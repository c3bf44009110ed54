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

use crate::domain::{Localisation, ReportValue, SystemError};
use async_trait::async_trait;

/// Secondary port - System information provider
///
/// Returns raw tool output; turning it into report records is the job of the
/// pure functions in `domain::parsers`.
#[async_trait]
pub trait SystemInfoProvider: Send + Sync {
    /// Run `system_profiler` for one data type
    ///
    /// # Arguments
    /// * `data_type` - e.g. `SPApplicationsDataType`
    ///
    /// # Returns
    /// * `Ok(ReportValue)` - The decoded JSON document
    /// * `Err(SystemError)` - Error running or decoding system_profiler
    async fn system_profiler(&self, data_type: &str) -> Result<ReportValue, SystemError>;

    /// Current WiFi interface information (`airport -I`)
    async fn airport_info(&self) -> Result<String, SystemError>;

    /// One `sw_vers` value
    ///
    /// # Arguments
    /// * `option` - e.g. `-productVersion`
    async fn sw_vers(&self, option: &str) -> Result<String, SystemError>;

    /// One sysctl value (`sysctl -in <name>`)
    async fn sysctl(&self, name: &str) -> Result<String, SystemError>;

    /// Console user state as printed by `scutil`
    async fn console_user_state(&self) -> Result<String, SystemError>;

    /// String table of a System Profiler reporter bundle for a locale
    ///
    /// A missing bundle yields an empty localisation rather than an error.
    async fn localisation(&self, reporter: &str, locale: &str)
        -> Result<Localisation, SystemError>;

    /// Effective user id of this process
    fn effective_uid(&self) -> u32;

    /// Get list of missing system tools
    ///
    /// # Returns
    /// * `Ok(Vec<String>)` - List of missing commands/tools
    /// * `Err(SystemError)` - Error checking dependencies
    async fn get_missing_dependencies(&self) -> Result<Vec<String>, SystemError>;
}
