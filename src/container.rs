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

//! Dependency injection container for inventory reporting services

use crate::adapters::{
    FileReportWriter, MacOSSystemInfoProvider, PlistPreferenceStore, UnixCommandExecutor,
    SYSTEM_PROFILER_ROOT,
};
use crate::domain::{
    DomainError, Flattener, PlistEncoding, ReportCollectionService, SequenceLeaves,
    DEFAULT_LOCALE, DEFAULT_SEPARATOR,
};
use crate::ports::{
    CommandExecutor, InventoryReportingService, PreferenceStore, ReportWriter, SystemInfoProvider,
};
use serde::Deserialize;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default directory reports are written to
pub const DEFAULT_TMP_DIR: &str = "/tmp/mrclient";

/// Configuration for the dependency injection container
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerConfig {
    /// Directory reports are written to
    pub tmp_dir: PathBuf,
    /// Separator for flattened CSV column names
    pub separator: String,
    /// Locale for localised report values
    pub locale: String,
    /// Collect and validate but do not write report files
    pub dry_run: bool,
    /// Command execution timeout (none waits for the tool to exit)
    pub command_timeout: Option<Duration>,
    /// Enable verbose logging
    pub verbose: bool,
    /// Encoding of written property lists
    pub plist_encoding: PlistEncoding,
    /// Give each scalar sequence element its own CSV column value
    pub flatten_elements: bool,
    /// Where System Profiler reporter bundles live
    pub profiler_root: PathBuf,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            tmp_dir: PathBuf::from(DEFAULT_TMP_DIR),
            separator: DEFAULT_SEPARATOR.to_string(),
            locale: DEFAULT_LOCALE.to_string(),
            dry_run: false,
            command_timeout: None,
            verbose: false,
            plist_encoding: PlistEncoding::default(),
            flatten_elements: false,
            profiler_root: PathBuf::from(SYSTEM_PROFILER_ROOT),
        }
    }
}

/// Settings file contents; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub tmp_dir: Option<PathBuf>,
    pub separator: Option<String>,
    pub locale: Option<String>,
    pub dry_run: Option<bool>,
    pub command_timeout_secs: Option<u64>,
    pub verbose: Option<bool>,
    pub plist_encoding: Option<PlistEncoding>,
    pub flatten_elements: Option<bool>,
    pub profiler_root: Option<PathBuf>,
}

impl Settings {
    /// Parse TOML settings
    pub fn from_toml_str(text: &str) -> Result<Self, DomainError> {
        toml::from_str(text).map_err(|e| DomainError::InvalidConfiguration(e.to_string()))
    }

    /// Read and parse a TOML settings file
    pub fn from_toml_file(path: &Path) -> Result<Self, DomainError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            DomainError::InvalidConfiguration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }
}

impl ContainerConfig {
    /// Default configuration overlaid with a settings file
    pub fn from_toml_file(path: &Path) -> Result<Self, DomainError> {
        let settings = Settings::from_toml_file(path)?;
        Ok(ContainerConfigBuilder::new().settings(settings).build())
    }

    /// Flattener matching this configuration
    pub fn flattener(&self) -> Flattener {
        let leaves = if self.flatten_elements {
            SequenceLeaves::Element
        } else {
            SequenceLeaves::WholeSequence
        };
        Flattener::new(&self.separator).sequence_leaves(leaves)
    }
}

/// Dependency injection container
pub struct ServiceContainer {
    config: ContainerConfig,
}

impl ServiceContainer {
    /// Create a new service container with configuration
    pub fn new(config: ContainerConfig) -> Self {
        Self { config }
    }

    /// Create a service container with default configuration
    pub fn default() -> Self {
        Self::new(ContainerConfig::default())
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.config
    }

    /// Create the command executor
    pub fn create_command_executor(&self) -> Arc<dyn CommandExecutor> {
        Arc::new(UnixCommandExecutor::new(self.config.command_timeout))
    }

    /// Create the system info provider running tools through `command_executor`
    pub fn create_system_info_provider_with(
        &self,
        command_executor: Arc<dyn CommandExecutor>,
    ) -> Arc<dyn SystemInfoProvider> {
        Arc::new(
            MacOSSystemInfoProvider::new(command_executor)
                .with_profiler_root(&self.config.profiler_root)
                .with_timeout(self.config.command_timeout),
        )
    }

    /// Create the platform-specific system info provider
    pub fn create_system_info_provider(
        &self,
    ) -> Result<Arc<dyn SystemInfoProvider>, Box<dyn Error>> {
        if !cfg!(target_os = "macos") {
            return Err("Unsupported operating system".into());
        }
        Ok(self.create_system_info_provider_with(self.create_command_executor()))
    }

    /// Create the report writer
    pub fn create_report_writer(&self) -> Arc<dyn ReportWriter> {
        Arc::new(
            FileReportWriter::new(&self.config.tmp_dir)
                .with_encoding(self.config.plist_encoding)
                .with_dry_run(self.config.dry_run),
        )
    }

    /// Create the preference store
    pub fn create_preference_store(&self) -> Arc<dyn PreferenceStore> {
        Arc::new(PlistPreferenceStore::new(self.create_command_executor()))
    }

    /// Create the reporting service on top of a given system info provider
    pub fn create_reporting_service_with(
        &self,
        system_provider: Arc<dyn SystemInfoProvider>,
    ) -> Arc<dyn InventoryReportingService> {
        let service = ReportCollectionService::new(system_provider, self.create_report_writer())
            .with_locale(&self.config.locale)
            .with_flattener(self.config.flattener());

        Arc::new(service)
    }

    /// Create the complete inventory reporting service
    pub fn create_reporting_service(
        &self,
    ) -> Result<Arc<dyn InventoryReportingService>, Box<dyn Error>> {
        let system_provider = self.create_system_info_provider()?;
        Ok(self.create_reporting_service_with(system_provider))
    }

    /// Get platform name for logging
    pub fn get_platform_name(&self) -> &'static str {
        if cfg!(target_os = "macos") {
            "macOS"
        } else if cfg!(target_os = "linux") {
            "Linux"
        } else {
            "Unknown"
        }
    }

    /// Validate that required system dependencies are available
    pub async fn validate_dependencies(&self) -> Result<Vec<String>, Box<dyn Error>> {
        let system_provider = self.create_system_info_provider()?;
        let missing = system_provider
            .get_missing_dependencies()
            .await
            .map_err(|e| format!("Failed to check dependencies: {}", e))?;
        Ok(missing)
    }
}

/// Builder pattern for container configuration
pub struct ContainerConfigBuilder {
    config: ContainerConfig,
}

impl ContainerConfigBuilder {
    /// Create a new configuration builder
    pub fn new() -> Self {
        Self {
            config: ContainerConfig::default(),
        }
    }

    /// Apply every key present in a settings file
    pub fn settings(mut self, settings: Settings) -> Self {
        let config = &mut self.config;
        if let Some(dir) = settings.tmp_dir {
            config.tmp_dir = dir;
        }
        if let Some(separator) = settings.separator {
            config.separator = separator;
        }
        if let Some(locale) = settings.locale {
            config.locale = locale;
        }
        if let Some(dry_run) = settings.dry_run {
            config.dry_run = dry_run;
        }
        if let Some(secs) = settings.command_timeout_secs {
            config.command_timeout = Some(Duration::from_secs(secs));
        }
        if let Some(verbose) = settings.verbose {
            config.verbose = verbose;
        }
        if let Some(encoding) = settings.plist_encoding {
            config.plist_encoding = encoding;
        }
        if let Some(elements) = settings.flatten_elements {
            config.flatten_elements = elements;
        }
        if let Some(root) = settings.profiler_root {
            config.profiler_root = root;
        }
        self
    }

    /// Set the report directory
    pub fn tmp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.tmp_dir = dir.into();
        self
    }

    /// Set the flattened key separator
    pub fn separator(mut self, separator: &str) -> Self {
        self.config.separator = separator.to_string();
        self
    }

    /// Set the locale
    pub fn locale(mut self, locale: &str) -> Self {
        self.config.locale = locale.to_string();
        self
    }

    /// Skip writing report files
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.config.dry_run = dry_run;
        self
    }

    /// Set command timeout
    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.config.command_timeout = Some(timeout);
        self
    }

    /// Enable verbose logging
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.config.verbose = verbose;
        self
    }

    /// Set property list encoding
    pub fn plist_encoding(mut self, encoding: PlistEncoding) -> Self {
        self.config.plist_encoding = encoding;
        self
    }

    pub fn flatten_elements(mut self, elements: bool) -> Self {
        self.config.flatten_elements = elements;
        self
    }

    pub fn profiler_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.profiler_root = root.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> ContainerConfig {
        self.config
    }
}

impl Default for ContainerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl From<ContainerConfig> for ContainerConfigBuilder {
    fn from(config: ContainerConfig) -> Self {
        Self { config }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::CannedCommandExecutor;
    use crate::domain::ReportKind;

    #[test]
    fn test_container_creation() {
        let container = ServiceContainer::default();
        assert_eq!(
            container.get_platform_name(),
            if cfg!(target_os = "macos") {
                "macOS"
            } else if cfg!(target_os = "linux") {
                "Linux"
            } else {
                "Unknown"
            }
        );
        assert_eq!(container.config().tmp_dir, PathBuf::from("/tmp/mrclient"));
        assert_eq!(container.config().command_timeout, None);
    }

    #[test]
    fn test_config_builder() {
        let config = ContainerConfigBuilder::new()
            .tmp_dir("/var/tmp/reports")
            .separator("/")
            .locale("de")
            .command_timeout(Duration::from_secs(60))
            .verbose(true)
            .plist_encoding(PlistEncoding::Binary)
            .build();

        assert_eq!(config.tmp_dir, PathBuf::from("/var/tmp/reports"));
        assert_eq!(config.separator, "/");
        assert_eq!(config.locale, "de");
        assert_eq!(config.command_timeout, Some(Duration::from_secs(60)));
        assert!(config.verbose);
        assert_eq!(config.plist_encoding, PlistEncoding::Binary);
        assert!(!config.dry_run);
    }

    #[test]
    fn test_settings_overlay() {
        let settings = Settings::from_toml_str(
            r#"
            tmp_dir = "/var/mrclient"
            locale = "fr"
            command_timeout_secs = 20
            plist_encoding = "binary"
            "#,
        )
        .unwrap();

        let config = ContainerConfigBuilder::new().settings(settings).build();
        assert_eq!(config.tmp_dir, PathBuf::from("/var/mrclient"));
        assert_eq!(config.locale, "fr");
        assert_eq!(config.command_timeout, Some(Duration::from_secs(20)));
        assert_eq!(config.plist_encoding, PlistEncoding::Binary);
        // Untouched keys keep their defaults
        assert_eq!(config.separator, ".");
    }

    #[test]
    fn test_settings_reject_unknown_keys() {
        let err = Settings::from_toml_str("retry_count = 3").unwrap_err();
        assert!(matches!(err, DomainError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mrclient.toml");
        std::fs::write(&path, "dry_run = true\nseparator = \"_\"\n").unwrap();

        let config = ContainerConfig::from_toml_file(&path).unwrap();
        assert!(config.dry_run);
        assert_eq!(config.flattener().separator(), "_");

        assert!(ContainerConfig::from_toml_file(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_system_info_provider_creation() {
        let container = ServiceContainer::default();
        let result = container.create_system_info_provider();

        assert_eq!(result.is_ok(), cfg!(target_os = "macos"));
    }

    #[tokio::test]
    async fn test_service_with_replayed_tools() {
        let dir = tempfile::tempdir().unwrap();
        let container = ServiceContainer::new(
            ContainerConfigBuilder::new()
                .tmp_dir(dir.path())
                .build(),
        );
        let executor = Arc::new(CannedCommandExecutor::new().with_stdout(
            "/System/Library/PrivateFrameworks/Apple80211.framework/Versions/Current/Resources/airport",
            &["-I"],
            "AirPort: Off\n",
        ));

        let provider = container.create_system_info_provider_with(executor);
        let service = container.create_reporting_service_with(provider);
        let path = service.run(ReportKind::Wifi).await.unwrap();

        assert_eq!(path, dir.path().join("wifi.plist"));
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("<string>off</string>"));
    }
}
