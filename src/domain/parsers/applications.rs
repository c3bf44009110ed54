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

//! Applications report parsing (`SPApplicationsDataType`)

use super::common::{map_attributes, system_profiler_items};
use crate::domain::{bool_to_int, Record, ReportValue};

/// System Profiler data type for installed applications
pub const APPLICATIONS_DATA_TYPE: &str = "SPApplicationsDataType";

/// system_profiler key → report column
pub const SP_APPLICATION_ATTRS: &[(&str, &str)] = &[
    ("_name", "name"),
    ("arch", "arch"),
    ("arch_kind", "arch"),
    ("info", "info"),
    ("lastModified", "last_modified"),
    ("obtained_from", "obtained_from"),
    ("path", "path"),
    ("runtime_environment", "runtime_environment"),
    ("signed_by", "signed_by"),
    ("version", "version"),
];

/// `arch_kind` values that mean the app ships 64-bit code
const ARCH_64_VALUES: &[&str] = &["arch_i64", "arch_i32_i64", "arch_arm_i64"];

/// Whether an application has 64-bit Intel or ARM code
pub fn app_has_64bit_code(app: &Record) -> bool {
    let intel64 = app
        .get("has64BitIntelCode")
        .and_then(ReportValue::as_str)
        .is_some_and(|v| v == "yes");
    let arch64 = app
        .get("arch_kind")
        .and_then(ReportValue::as_str)
        .is_some_and(|kind| ARCH_64_VALUES.contains(&kind));

    intel64 || arch64
}

/// Join the signing authority chain into one `"; "` separated string
fn join_signed_by(value: &ReportValue) -> ReportValue {
    match value {
        ReportValue::Array(items) => ReportValue::String(
            items
                .iter()
                .map(|item| item.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        ),
        other => other.clone(),
    }
}

/// Parse one application entry
pub fn parse_application(app: &Record) -> Record {
    let mut data = map_attributes(app, SP_APPLICATION_ATTRS, |key, value| match key {
        "signed_by" => join_signed_by(value),
        _ => value.clone(),
    });
    data.insert(
        "has64bit".to_string(),
        ReportValue::Integer(bool_to_int(app_has_64bit_code(app))),
    );
    data
}

/// Parse the `system_profiler -json SPApplicationsDataType` document
pub fn parse_applications(document: &ReportValue) -> Vec<Record> {
    system_profiler_items(document, APPLICATIONS_DATA_TYPE)
        .into_iter()
        .map(parse_application)
        .collect()
}
