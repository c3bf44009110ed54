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

use crate::domain::{PlistEncoding, ReportData, ReportError, ReportValue};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Secondary port - Report writer abstraction
///
/// Writes report data into the client's working directory, where the
/// upstream pipeline picks it up.
#[async_trait]
pub trait ReportWriter: Send + Sync {
    /// Write a report to file
    ///
    /// # Arguments
    /// * `data` - Report data to write
    /// * `file_name` - File name, joined to the working directory
    /// * `format` - `"csv"` or `"plist"`
    /// * `fieldnames` - Column order; required when writing records to CSV
    ///
    /// # Returns
    /// * `Ok(PathBuf)` - Path of the report file
    /// * `Err(ReportError)` - Invalid arguments or write failure
    async fn write_report(
        &self,
        data: &ReportData,
        file_name: &str,
        format: &str,
        fieldnames: Option<&[String]>,
    ) -> Result<PathBuf, ReportError>;
}

/// Secondary port - File repository abstraction
///
/// This interface abstracts file-based storage of property lists and CSV files
#[async_trait]
pub trait FileRepository: Send + Sync {
    /// Save a property list to a file
    ///
    /// # Arguments
    /// * `value` - Property list to save
    /// * `path` - File path to save to
    /// * `encoding` - XML or binary
    ///
    /// # Returns
    /// * `Ok(())` - Property list successfully saved
    /// * `Err(ReportError)` - Error occurred during save
    async fn save_plist(
        &self,
        value: &plist::Value,
        path: &Path,
        encoding: PlistEncoding,
    ) -> Result<(), ReportError>;

    /// Load a property list file
    ///
    /// # Returns
    /// * `Ok(ReportValue)` - Decoded property list
    /// * `Err(ReportError)` - Error occurred during load
    async fn load_plist(&self, path: &Path) -> Result<ReportValue, ReportError>;

    /// Save CSV rows (already rendered to text) to a file
    async fn save_csv(&self, rows: &[Vec<String>], path: &Path) -> Result<(), ReportError>;

    /// Check if a file exists
    ///
    /// # Returns
    /// * `Ok(bool)` - true if file exists
    /// * `Err(ReportError)` - Error checking file existence
    async fn file_exists(&self, path: &Path) -> Result<bool, ReportError>;
}
