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

//! Inventory Report Client Library
//!
//! This library collects device inventory reports on macOS (installed
//! applications, graphics and displays, WiFi state, operating system
//! attributes) using a Ports and Adapters (Hexagonal) architecture.
//!
//! # Architecture
//!
//! - **Domain**: Report records, parsers, transforms and the collection service
//! - **Ports**: Interfaces for tools, preferences and report files
//! - **Adapters**: macOS tool wrappers, plist preference domains, CSV/plist writers
//!
//! # Usage
//!
//! ```rust,no_run
//! use mrclient::{InventoryReportingService, ReportKind};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = mrclient::create_service()?;
//!
//!     // Collect, clean and write /tmp/mrclient/applications.plist
//!     let path = service.run(ReportKind::Applications).await?;
//!     println!("Wrote {}", path.display());
//!     Ok(())
//! }
//! ```
//!
//! Records can also be flattened for CSV export:
//!
//! ```rust
//! use mrclient::{flatten, ReportValue, Record};
//!
//! let mut inner = Record::new();
//! inner.insert("b".into(), ReportValue::from(1));
//! let mut record = Record::new();
//! record.insert("a".into(), ReportValue::Dict(inner));
//!
//! let flat = flatten(&record, ".");
//! assert_eq!(flat.get("a.b"), Some(&ReportValue::from(1)));
//! ```

pub mod adapters;
pub mod container;
pub mod domain;
pub mod ports;

pub use adapters::{
    BinaryRunner, CannedCommandExecutor, FileReportWriter, FileSystemRepository, Invocation,
    MacOSSystemInfoProvider, PlistPreferenceStore, UnixCommandExecutor,
};
pub use container::{ContainerConfig, ContainerConfigBuilder, ServiceContainer, Settings};
pub use domain::{
    bool_to_int, clean, flatten, CommandError, DomainError, Flattener, PlistEncoding,
    PreferenceError, Record, ReportCollectionService, ReportData, ReportError, ReportFormat,
    ReportKind, ReportValue, SequenceLeaves, SystemAttributes, SystemError,
};
pub use ports::{
    CommandExecutor, FileRepository, InventoryReportingService, PreferenceStore, ReportWriter,
    SystemInfoProvider,
};

use std::error::Error;
use std::sync::Arc;

/// Create an inventory reporting service with default configuration
///
/// # Returns
/// * Reporting service writing to `/tmp/mrclient`
pub fn create_service() -> Result<Arc<dyn InventoryReportingService>, Box<dyn Error>> {
    ServiceContainer::default().create_reporting_service()
}

/// Create an inventory reporting service with custom container configuration
///
/// # Arguments
/// * `container_config` - Container configuration for customizing behavior
///
/// # Returns
/// * Configured reporting service
pub fn create_service_with_config(
    container_config: ContainerConfig,
) -> Result<Arc<dyn InventoryReportingService>, Box<dyn Error>> {
    ServiceContainer::new(container_config).create_reporting_service()
}

/// Validate system dependencies
///
/// # Returns
/// * `Ok(missing_deps)` - Names of required tools that are not installed
/// * `Err(Box<dyn Error>)` - Error occurred during validation
///
/// # Example
///
/// ```rust,no_run
/// use mrclient::validate_system;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let missing = validate_system().await?;
///
///     if !missing.is_empty() {
///         println!("Missing dependencies: {:?}", missing);
///     }
///     Ok(())
/// }
/// ```
pub async fn validate_system() -> Result<Vec<String>, Box<dyn Error>> {
    ServiceContainer::default().validate_dependencies().await
}
