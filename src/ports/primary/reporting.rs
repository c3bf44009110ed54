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

use crate::domain::{ReportData, ReportError, ReportKind};
use async_trait::async_trait;
use std::path::PathBuf;

/// Primary port - Main interface offered by the inventory reporting domain
///
/// This is what external systems (CLI, scripts, library consumers) use to
/// collect and write reports.
#[async_trait]
pub trait InventoryReportingService: Send + Sync {
    /// Collect and parse one report without writing it
    ///
    /// # Arguments
    /// * `kind` - The report to collect
    ///
    /// # Returns
    /// * `Ok(ReportData)` - Parsed report records
    /// * `Err(ReportError)` - Error occurred during collection
    async fn collect(&self, kind: ReportKind) -> Result<ReportData, ReportError>;

    /// Collect a report, clean it and write it as a property list
    ///
    /// # Returns
    /// * `Ok(PathBuf)` - Path of the written report file
    /// * `Err(ReportError)` - Error occurred during collection or writing
    async fn run(&self, kind: ReportKind) -> Result<PathBuf, ReportError>;

    /// Collect a report, flatten its records and write them as CSV
    ///
    /// The header is the sorted union of all flattened keys.
    async fn export_csv(&self, kind: ReportKind) -> Result<PathBuf, ReportError>;

    /// List system tools required by the reports that are missing
    async fn missing_dependencies(&self) -> Result<Vec<String>, ReportError>;
}
