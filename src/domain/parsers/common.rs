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

//! Common parsing utilities and helper functions

use crate::domain::{Record, ReportValue};
use std::io::Cursor;

/// Parse a key-value pair from system output
///
/// # Arguments
/// * `line` - Line to parse (e.g., "agrCtlRSSI: -55")
/// * `separator` - Separator character (usually ':')
///
/// # Returns
/// * `Ok((String, String))` - Key-value pair
/// * `Err(String)` - Parse error
pub fn parse_key_value(line: &str, separator: char) -> Result<(String, String), String> {
    if let Some(pos) = line.find(separator) {
        let key = line[..pos].trim().to_string();
        let value = line[pos + 1..].trim().to_string();
        Ok((key, value))
    } else {
        Err(format!("No separator '{separator}' found in line: {line}"))
    }
}

/// Clean and normalize a string value
pub fn clean_value(value: &str) -> String {
    value
        .trim()
        .replace("  ", " ") // Replace multiple spaces with single space
        .replace("\t", " ") // Replace tabs with spaces
        .to_string()
}

/// Turn a text value into an integer when it looks like one
pub fn parse_scalar(value: &str) -> ReportValue {
    match value.parse::<i64>() {
        Ok(i) => ReportValue::Integer(i),
        Err(_) => ReportValue::String(value.to_string()),
    }
}

/// Items of a `system_profiler -json` document for one data type
///
/// The document is `{"<DataType>": [ {...}, ... ]}`; anything that is not a
/// dictionary is skipped.
pub fn system_profiler_items<'a>(document: &'a ReportValue, data_type: &str) -> Vec<&'a Record> {
    document
        .get(data_type)
        .and_then(ReportValue::as_array)
        .map(|items| items.iter().filter_map(ReportValue::as_dict).collect())
        .unwrap_or_default()
}

/// Rename the keys of `source` found in `attrs`, applying `normalize` to each value
///
/// Keys missing from the table are dropped. When several source keys map to
/// the same target, the one listed last in the table wins.
pub fn map_attributes<F>(source: &Record, attrs: &[(&str, &str)], mut normalize: F) -> Record
where
    F: FnMut(&str, &ReportValue) -> ReportValue,
{
    let mut result = Record::new();
    for (source_key, target_key) in attrs {
        if let Some(value) = source.get(*source_key) {
            result.insert(target_key.to_string(), normalize(source_key, value));
        }
    }
    result
}

/// Decode property list bytes (XML or binary)
pub fn parse_plist_bytes(bytes: &[u8]) -> Result<ReportValue, String> {
    plist::Value::from_reader(Cursor::new(bytes))
        .map(ReportValue::from)
        .map_err(|e| e.to_string())
}

/// Decode a JSON document
pub fn parse_json_text(text: &str) -> Result<ReportValue, String> {
    serde_json::from_str::<serde_json::Value>(text.trim())
        .map(ReportValue::from)
        .map_err(|e| e.to_string())
}
