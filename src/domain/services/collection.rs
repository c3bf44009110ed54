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

use crate::domain::{
    clean, parse_airport_info, parse_applications, parse_arm64_flag, parse_console_user,
    parse_displays, parse_os_version, parse_sw_vers_value, DomainError, Flattener, Localisation,
    Record, ReportData, ReportError, ReportFormat, ReportKind, SystemAttributes,
    APPLICATIONS_DATA_TYPE, DISPLAYS_DATA_TYPE, DISPLAYS_REPORTER,
};
use crate::ports::{InventoryReportingService, ReportWriter, SystemInfoProvider};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Default locale for localised report values
pub const DEFAULT_LOCALE: &str = "en";

/// Domain service that implements inventory report collection
///
/// This service runs the system tools behind each report, maps their output
/// onto report records and hands the result to the report writer.
pub struct ReportCollectionService {
    /// System information provider (platform-specific)
    system_provider: Arc<dyn SystemInfoProvider>,
    /// Writer for report files
    report_writer: Arc<dyn ReportWriter>,
    /// Locale used to localise display values
    locale: String,
    /// Flattener used for CSV export
    flattener: Flattener,
}

impl ReportCollectionService {
    /// Create a new report collection service
    ///
    /// # Arguments
    /// * `system_provider` - Platform-specific system information provider
    /// * `report_writer` - Writer for report files
    pub fn new(
        system_provider: Arc<dyn SystemInfoProvider>,
        report_writer: Arc<dyn ReportWriter>,
    ) -> Self {
        Self {
            system_provider,
            report_writer,
            locale: DEFAULT_LOCALE.to_string(),
            flattener: Flattener::default(),
        }
    }

    pub fn with_locale(mut self, locale: &str) -> Self {
        self.locale = locale.to_string();
        self
    }

    pub fn with_flattener(mut self, flattener: Flattener) -> Self {
        self.flattener = flattener;
        self
    }

    async fn collect_applications(&self) -> Result<Vec<Record>, DomainError> {
        let document = self
            .system_provider
            .system_profiler(APPLICATIONS_DATA_TYPE)
            .await?;
        Ok(parse_applications(&document))
    }

    async fn collect_displays(&self) -> Result<Vec<Record>, DomainError> {
        let document = self
            .system_provider
            .system_profiler(DISPLAYS_DATA_TYPE)
            .await?;

        let localisation = self
            .system_provider
            .localisation(DISPLAYS_REPORTER, &self.locale)
            .await
            .unwrap_or_else(|e| {
                log::warn!("Display values will not be localised: {}", e);
                Localisation::new()
            });

        Ok(parse_displays(&document, &localisation, &self.locale))
    }

    async fn collect_wifi(&self) -> Result<Record, DomainError> {
        let output = self.system_provider.airport_info().await?;
        Ok(parse_airport_info(&output))
    }

    async fn sw_vers_value(&self, option: &str) -> Option<String> {
        match self.system_provider.sw_vers(option).await {
            Ok(output) => parse_sw_vers_value(&output),
            Err(e) => {
                log::debug!("sw_vers {} unavailable: {}", option, e);
                None
            }
        }
    }

    /// Operating system and session attributes
    ///
    /// Each attribute is collected on its own; one failing tool leaves
    /// only its attribute unset.
    pub async fn system_attributes(&self) -> SystemAttributes {
        let os_version = self
            .sw_vers_value("-productVersion")
            .await
            .and_then(|v| parse_os_version(&v));

        let is_apple_silicon = match self.system_provider.sysctl("hw.optional.arm64").await {
            Ok(output) => parse_arm64_flag(&output),
            Err(e) => {
                log::debug!("hw.optional.arm64 unavailable: {}", e);
                false
            }
        };

        let console_user = match self.system_provider.console_user_state().await {
            Ok(output) => parse_console_user(&output),
            Err(e) => {
                log::debug!("Console user unavailable: {}", e);
                None
            }
        };

        SystemAttributes {
            os_name: self.sw_vers_value("-productName").await,
            os_version,
            os_build: self.sw_vers_value("-buildVersion").await,
            os_rsr: self.sw_vers_value("-productVersionExtra").await,
            is_apple_silicon,
            console_user,
            effective_uid: self.system_provider.effective_uid(),
        }
    }
}

/// Strip null and empty values from every record
fn clean_data(data: ReportData) -> ReportData {
    match data {
        ReportData::Records(records) => ReportData::Records(records.iter().map(clean).collect()),
        ReportData::Single(record) => ReportData::Single(clean(&record)),
        rows @ ReportData::Rows(_) => rows,
    }
}

#[async_trait]
impl InventoryReportingService for ReportCollectionService {
    async fn collect(&self, kind: ReportKind) -> Result<ReportData, ReportError> {
        log::debug!("Collecting {} report", kind);

        let data = match kind {
            ReportKind::Applications => ReportData::Records(self.collect_applications().await?),
            ReportKind::Displays => ReportData::Records(self.collect_displays().await?),
            ReportKind::Wifi => ReportData::Single(self.collect_wifi().await?),
            ReportKind::System => ReportData::Single(self.system_attributes().await.to_record()),
        };
        Ok(data)
    }

    async fn run(&self, kind: ReportKind) -> Result<PathBuf, ReportError> {
        let data = clean_data(self.collect(kind).await?);
        let format = ReportFormat::Plist;

        self.report_writer
            .write_report(&data, &kind.file_name(format), format.extension(), None)
            .await
    }

    async fn export_csv(&self, kind: ReportKind) -> Result<PathBuf, ReportError> {
        let format = ReportFormat::Csv;
        let data = match clean_data(self.collect(kind).await?) {
            rows @ ReportData::Rows(_) => rows,
            other => ReportData::Records(
                other
                    .records()
                    .into_iter()
                    .map(|record| self.flattener.flatten(record))
                    .collect(),
            ),
        };

        let fieldnames: Vec<String> = data
            .records()
            .into_iter()
            .flat_map(|record| record.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        // No records means no header, so the file is left empty
        let data = if fieldnames.is_empty() {
            log::info!("No {} records collected, writing an empty CSV", kind);
            ReportData::Rows(Vec::new())
        } else {
            data
        };

        self.report_writer
            .write_report(
                &data,
                &kind.file_name(format),
                format.extension(),
                Some(&fieldnames),
            )
            .await
    }

    async fn missing_dependencies(&self) -> Result<Vec<String>, ReportError> {
        let missing = self
            .system_provider
            .get_missing_dependencies()
            .await
            .map_err(DomainError::from)?;
        Ok(missing)
    }
}
