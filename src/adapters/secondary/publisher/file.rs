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

//! File-based report writer for CSV and property list reports

use crate::domain::{
    parse_plist_bytes, PlistEncoding, Record, ReportData, ReportError, ReportFormat, ReportValue,
};
use crate::ports::{FileRepository, ReportWriter};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

/// File system repository for storing report files
pub struct FileSystemRepository;

impl FileSystemRepository {
    /// Create a new file system repository
    pub fn new() -> Self {
        Self
    }

    async fn write_bytes(path: &Path, bytes: Vec<u8>) -> Result<(), ReportError> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ReportError::Io(format!("Failed to create directory: {}", e)))?;
        }

        fs::write(path, bytes)
            .await
            .map_err(|e| ReportError::Io(format!("Failed to write {}: {}", path.display(), e)))
    }
}

impl Default for FileSystemRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FileRepository for FileSystemRepository {
    async fn save_plist(
        &self,
        value: &plist::Value,
        path: &Path,
        encoding: PlistEncoding,
    ) -> Result<(), ReportError> {
        let mut bytes = Vec::new();
        let encoded = match encoding {
            PlistEncoding::Xml => value.to_writer_xml(&mut bytes),
            PlistEncoding::Binary => value.to_writer_binary(&mut bytes),
        };
        encoded.map_err(|e| {
            ReportError::SerializationFailed(format!("Property list serialization failed: {}", e))
        })?;

        Self::write_bytes(path, bytes).await
    }

    async fn load_plist(&self, path: &Path) -> Result<ReportValue, ReportError> {
        let bytes = fs::read(path)
            .await
            .map_err(|e| ReportError::Io(format!("Failed to read {}: {}", path.display(), e)))?;

        parse_plist_bytes(&bytes).map_err(ReportError::SerializationFailed)
    }

    async fn save_csv(&self, rows: &[Vec<String>], path: &Path) -> Result<(), ReportError> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        for row in rows {
            writer
                .write_record(row)
                .map_err(|e| ReportError::SerializationFailed(format!("CSV write failed: {}", e)))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| ReportError::SerializationFailed(format!("CSV write failed: {}", e)))?;

        Self::write_bytes(path, bytes).await
    }

    async fn file_exists(&self, path: &Path) -> Result<bool, ReportError> {
        fs::try_exists(path)
            .await
            .map_err(|e| ReportError::Io(format!("Failed to check {}: {}", path.display(), e)))
    }
}

/// Writes reports below a working directory
pub struct FileReportWriter {
    working_dir: PathBuf,
    repository: Arc<dyn FileRepository>,
    encoding: PlistEncoding,
    dry_run: bool,
}

impl FileReportWriter {
    /// Create a writer for `working_dir` backed by the file system
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            repository: Arc::new(FileSystemRepository::new()),
            encoding: PlistEncoding::default(),
            dry_run: false,
        }
    }

    pub fn with_repository(mut self, repository: Arc<dyn FileRepository>) -> Self {
        self.repository = repository;
        self
    }

    pub fn with_encoding(mut self, encoding: PlistEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Validate and resolve paths but never touch the file system
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// Render report data as CSV text rows
///
/// Records need a non-empty list of field names; the header comes first and
/// each record is projected onto it.
pub fn csv_rows(
    data: &ReportData,
    fieldnames: Option<&[String]>,
) -> Result<Vec<Vec<String>>, ReportError> {
    let render =
        |row: &[ReportValue]| -> Vec<String> { row.iter().map(ReportValue::to_string).collect() };

    let records: Vec<&Record> = match data {
        ReportData::Rows(rows) => return Ok(rows.iter().map(|row| render(row.as_slice())).collect()),
        ReportData::Records(_) | ReportData::Single(_) => data.records(),
    };

    let fieldnames = fieldnames
        .filter(|names| !names.is_empty())
        .ok_or_else(|| ReportError::MissingRequiredArgument {
            func: "write_report".to_string(),
            arg: "fieldnames".to_string(),
        })?;

    let mut rows = Vec::with_capacity(records.len() + 1);
    rows.push(fieldnames.to_vec());
    for record in records {
        rows.push(
            fieldnames
                .iter()
                .map(|name| record.get(name).map(ReportValue::to_string).unwrap_or_default())
                .collect(),
        );
    }
    Ok(rows)
}

#[async_trait]
impl ReportWriter for FileReportWriter {
    async fn write_report(
        &self,
        data: &ReportData,
        file_name: &str,
        format: &str,
        fieldnames: Option<&[String]>,
    ) -> Result<PathBuf, ReportError> {
        let format: ReportFormat = format.parse()?;
        let rows = match format {
            ReportFormat::Csv => Some(csv_rows(data, fieldnames)?),
            ReportFormat::Plist => None,
        };

        let path = self.working_dir.join(file_name);
        if self.dry_run {
            log::info!("Dry run, not writing {}", path.display());
            return Ok(path);
        }

        match rows {
            Some(rows) => self.repository.save_csv(&rows, &path).await?,
            None => {
                self.repository
                    .save_plist(&data.to_plist(), &path, self.encoding)
                    .await?
            }
        }

        log::info!("Wrote {} report to {}", format, path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(entries: &[(&str, ReportValue)]) -> Record {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[tokio::test]
    async fn test_csv_records_follow_fieldnames() {
        let temp_dir = tempdir().unwrap();
        let writer = FileReportWriter::new(temp_dir.path());
        let data = ReportData::Records(vec![
            record(&[
                ("name", "Safari".into()),
                ("has64bit", 1.into()),
                ("ignored", "x".into()),
            ]),
            record(&[("name", "Xcode".into()), ("signed", true.into())]),
        ]);

        let fields = names(&["name", "has64bit", "signed"]);
        let path = writer
            .write_report(&data, "applications.csv", "csv", Some(&fields))
            .await
            .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "name,has64bit,signed\nSafari,1,\nXcode,,True\n");
    }

    #[tokio::test]
    async fn test_csv_rows_without_header() {
        let temp_dir = tempdir().unwrap();
        let writer = FileReportWriter::new(temp_dir.path());
        let data = ReportData::Rows(vec![
            vec!["en0".into(), ReportValue::Null, 42.into()],
            vec!["a,b".into()],
        ]);

        let path = writer.write_report(&data, "rows.csv", "csv", None).await.unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "en0,,42\n\"a,b\"\n");
    }

    #[tokio::test]
    async fn test_nested_values_render_as_json() {
        let data = ReportData::Single(record(&[(
            "displays",
            ReportValue::Array(vec![record(&[("name", "LG".into())]).into()]),
        )]));

        let rows = csv_rows(&data, Some(&names(&["displays"]))).unwrap();
        assert_eq!(rows[1], vec![r#"[{"name":"LG"}]"#.to_string()]);
    }

    #[tokio::test]
    async fn test_invalid_format_is_rejected_before_io() {
        let temp_dir = tempdir().unwrap();
        let working_dir = temp_dir.path().join("reports");
        let writer = FileReportWriter::new(&working_dir);

        let err = writer
            .write_report(&ReportData::Records(vec![]), "x.xml", "xml", None)
            .await
            .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Report format value 'xml' invalid, must be one of: 'csv' or 'plist'"
        );
        assert!(!working_dir.exists());
    }

    #[tokio::test]
    async fn test_csv_records_require_fieldnames() {
        let temp_dir = tempdir().unwrap();
        let working_dir = temp_dir.path().join("reports");
        let writer = FileReportWriter::new(&working_dir);
        let data = ReportData::Records(vec![record(&[("name", "Safari".into())])]);

        let err = writer
            .write_report(&data, "applications.csv", "csv", None)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReportError::MissingRequiredArgument { ref func, ref arg }
                if func == "write_report" && arg == "fieldnames"
        ));
        assert!(!working_dir.exists());
    }

    #[tokio::test]
    async fn test_csv_records_reject_empty_fieldnames() {
        let temp_dir = tempdir().unwrap();
        let working_dir = temp_dir.path().join("reports");
        let writer = FileReportWriter::new(&working_dir);

        for data in [
            ReportData::Records(vec![record(&[("name", "Safari".into())])]),
            ReportData::Records(Vec::new()),
        ] {
            let err = writer
                .write_report(&data, "applications.csv", "csv", Some(&[]))
                .await
                .unwrap_err();
            assert!(matches!(err, ReportError::MissingRequiredArgument { .. }));
        }
        assert!(!working_dir.exists());
    }

    #[tokio::test]
    async fn test_plist_report_omits_nulls() {
        let temp_dir = tempdir().unwrap();
        let working_dir = temp_dir.path().join("nested").join("reports");
        let writer = FileReportWriter::new(&working_dir);
        let data = ReportData::Single(record(&[
            ("state", "running".into()),
            ("ssid", ReportValue::Null),
            ("snr", 35.into()),
        ]));

        let path = writer
            .write_report(&data, "wifi.plist", "plist", None)
            .await
            .unwrap();
        assert_eq!(path, working_dir.join("wifi.plist"));

        let loaded = FileSystemRepository::new().load_plist(&path).await.unwrap();
        let expected = record(&[("state", "running".into()), ("snr", 35.into())]);
        assert_eq!(loaded, ReportValue::Dict(expected));
    }

    #[tokio::test]
    async fn test_binary_plist_encoding() {
        let temp_dir = tempdir().unwrap();
        let writer = FileReportWriter::new(temp_dir.path()).with_encoding(PlistEncoding::Binary);
        let data = ReportData::Records(vec![record(&[("name", "Safari".into())])]);

        let path = writer
            .write_report(&data, "applications.plist", "plist", None)
            .await
            .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"bplist00"));
        let loaded = FileSystemRepository::new().load_plist(&path).await.unwrap();
        assert_eq!(loaded.as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let temp_dir = tempdir().unwrap();
        let writer = FileReportWriter::new(temp_dir.path()).with_dry_run(true);
        let repository = FileSystemRepository::new();

        let path = writer
            .write_report(&ReportData::Records(vec![]), "displays.plist", "plist", None)
            .await
            .unwrap();

        assert_eq!(path, temp_dir.path().join("displays.plist"));
        assert!(!repository.file_exists(&path).await.unwrap());

        // Validation still applies
        assert!(writer
            .write_report(&ReportData::Records(vec![]), "d.json", "json", None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_report_is_overwritten() {
        let temp_dir = tempdir().unwrap();
        let writer = FileReportWriter::new(temp_dir.path());
        let fields = names(&["name"]);

        for name in ["first", "second"] {
            let data = ReportData::Single(record(&[("name", name.into())]));
            writer
                .write_report(&data, "system.csv", "csv", Some(&fields))
                .await
                .unwrap();
        }

        let text = std::fs::read_to_string(temp_dir.path().join("system.csv")).unwrap();
        assert_eq!(text, "name\nsecond\n");
    }
}
