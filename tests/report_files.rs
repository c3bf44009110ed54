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

use assert_fs::prelude::*;
use mrclient::{
    CannedCommandExecutor, ContainerConfigBuilder, FileReportWriter, PlistPreferenceStore,
    PreferenceStore, Record, ReportData, ReportKind, ReportValue, ReportWriter, ServiceContainer,
};
use predicates::prelude::*;
use std::sync::Arc;

const PROFILER: &str = "/usr/sbin/system_profiler";

const DISPLAYS_JSON: &str = r#"{"SPDisplaysDataType": [
  {
    "_name": "Apple M2 Pro",
    "sppci_cores": "19",
    "sppci_model": "Apple M2 Pro",
    "spdisplays_vendor": "sppci_vendor_Apple",
    "spdisplays_ndrvs": [
      {
        "_name": "Color LCD",
        "spdisplays_main": "spdisplays_yes",
        "spdisplays_online": "spdisplays_yes",
        "spdisplays_pixelresolution": "spdisplays_3456x2234Retina"
      },
      {
        "_name": "DELL U2720Q",
        "_spdisplays_display-serial-number": "",
        "_spdisplays_display-year": "2021"
      }
    ]
  }
]}"#;

fn record(entries: &[(&str, ReportValue)]) -> Record {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn replayed_displays() -> Arc<CannedCommandExecutor> {
    Arc::new(CannedCommandExecutor::new().with_stdout(
        PROFILER,
        &["-detaillevel", "full", "-json", "SPDisplaysDataType"],
        DISPLAYS_JSON,
    ))
}

#[tokio::test]
async fn csv_report_has_header_and_projected_rows() {
    let temp = assert_fs::TempDir::new().unwrap();
    let writer = FileReportWriter::new(temp.path());
    let data = ReportData::Records(vec![
        record(&[("name", "Safari".into()), ("version", "16.5".into())]),
        record(&[("name", "Numbers".into()), ("obtained_from", "mac_app_store".into())]),
    ]);
    let fields: Vec<String> = ["name", "version"].iter().map(|s| s.to_string()).collect();

    writer
        .write_report(&data, "applications.csv", "csv", Some(&fields))
        .await
        .unwrap();

    temp.child("applications.csv")
        .assert("name,version\nSafari,16.5\nNumbers,\n");
    temp.close().unwrap();
}

#[tokio::test]
async fn rejected_reports_leave_no_files() {
    let temp = assert_fs::TempDir::new().unwrap();
    let reports = temp.child("reports");
    let writer = FileReportWriter::new(reports.path());
    let data = ReportData::Single(record(&[("state", "off".into())]));

    let err = writer
        .write_report(&data, "wifi.xml", "xml", None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("'csv' or 'plist'"));

    let err = writer
        .write_report(&data, "wifi.csv", "csv", None)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "write_report missing 1 required argument: fieldnames"
    );

    reports.assert(predicate::path::missing());
}

#[tokio::test]
async fn displays_report_runs_from_replayed_tools() {
    let temp = assert_fs::TempDir::new().unwrap();
    let profiler_root = temp.child("SystemProfiler");
    profiler_root
        .child("SPDisplaysReporter.spreporter/Contents/Resources/en.lproj/Localizable.strings")
        .write_str("\"spdisplays_yes\" = \"Yes\";\n")
        .unwrap();

    let container = ServiceContainer::new(
        ContainerConfigBuilder::new()
            .tmp_dir(temp.child("out").path())
            .profiler_root(profiler_root.path())
            .build(),
    );
    let provider = container.create_system_info_provider_with(replayed_displays());
    let service = container.create_reporting_service_with(provider);

    service.run(ReportKind::Displays).await.unwrap();
    service.export_csv(ReportKind::Displays).await.unwrap();

    let report = temp.child("out/displays.plist");
    report.assert(predicate::path::is_file());
    report.assert(predicate::str::contains("<string>Yes</string>"));
    // Empty serial number is cleaned away
    report.assert(predicate::str::contains("display_serial").not());

    let csv = temp.child("out/displays.csv");
    csv.assert(predicate::str::starts_with("displays.1.is_online,"));
    csv.assert(predicate::str::contains("displays.2.mfg_year"));
    csv.assert(predicate::str::contains("DELL U2720Q"));
}

#[tokio::test]
async fn dry_run_collects_without_writing() {
    let temp = assert_fs::TempDir::new().unwrap();
    let container = ServiceContainer::new(
        ContainerConfigBuilder::new()
            .tmp_dir(temp.path())
            .dry_run(true)
            .build(),
    );
    let provider = container.create_system_info_provider_with(replayed_displays());
    let service = container.create_reporting_service_with(provider);

    let path = service.run(ReportKind::Displays).await.unwrap();

    assert_eq!(path, temp.path().join("displays.plist"));
    temp.child("displays.plist").assert(predicate::path::missing());
}

#[tokio::test]
async fn preference_read_prefers_user_over_system_domain() {
    let temp = assert_fs::TempDir::new().unwrap();
    let root = temp.child("root");
    let home = temp.child("home");

    let mut system = plist::Dictionary::new();
    system.insert("BaseUrl".into(), "https://reports.example.com/".into());
    system.insert("ReportItems".into(), plist::Value::Array(vec!["wifi".into()]));
    root.child("Library/Preferences").create_dir_all().unwrap();
    plist::Value::Dictionary(system)
        .to_file_xml(root.child("Library/Preferences/MunkiReport.plist").path())
        .unwrap();

    home.child("Library/Preferences/MunkiReport.plist")
        .write_str(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<plist version="1.0"><dict><key>BaseUrl</key><string>https://user.example.com/</string></dict></plist>"#,
        )
        .unwrap();

    let store = PlistPreferenceStore::new(Arc::new(CannedCommandExecutor::new()))
        .with_root(root.path())
        .with_home(home.path());

    assert_eq!(
        store.read("MunkiReport", "BaseUrl").await.unwrap(),
        Some(ReportValue::from("https://user.example.com/"))
    );
    assert_eq!(
        store.read("MunkiReport", "ReportItems").await.unwrap(),
        Some(ReportValue::Array(vec!["wifi".into()]))
    );
}
