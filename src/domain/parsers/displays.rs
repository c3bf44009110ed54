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

//! Displays report parsing (`SPDisplaysDataType`)
//!
//! Each graphics device carries the displays attached to it under
//! `spdisplays_ndrvs`. Values such as `spdisplays_yes` are System Profiler
//! string keys and are replaced by their localised text when a table is
//! available.

use super::common::{map_attributes, system_profiler_items};
use crate::domain::{Localisation, Record, ReportValue};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::io::Cursor;

lazy_static! {
    static ref STRINGS_ENTRY_RE: Regex =
        Regex::new(r#""((?:[^"\\]|\\.)*)"\s*=\s*"((?:[^"\\]|\\.)*)"\s*;"#).unwrap();
}

/// System Profiler data type for graphics devices and displays
pub const DISPLAYS_DATA_TYPE: &str = "SPDisplaysDataType";

/// Reporter bundle holding the display string tables
pub const DISPLAYS_REPORTER: &str = "SPDisplaysReporter.spreporter";

/// Graphics card attributes
pub const SP_GRAPHICS_ATTRS: &[(&str, &str)] = &[
    ("_name", "name"),
    ("spdisplays_mtlgpufamilysupport", "metal_support"),
    ("spdisplays_vendor", "vendor"),
    ("sppci_bus", "bus"),
    ("sppci_cores", "gpu_cores"),
    ("sppci_device_type", "device_type"),
    ("sppci_model", "model"),
];

/// Attached display attributes
pub const SP_DISPLAYS_ATTRS: &[(&str, &str)] = &[
    ("_name", "name"),
    ("_spdisplays_display-serial-number", "display_serial"),
    ("_spdisplays_display-week", "mfg_week"),
    ("_spdisplays_display-year", "mfg_year"),
    ("_spdisplays_displayID", "display_id"),
    ("_spdisplays_virtualdevice", "virtual_device"),
    ("spdisplays_main", "main_display"),
    ("spdisplays_online", "is_online"),
    ("spdisplays_pixelresolution", "pixel_resolution"),
    ("spdisplays_resolution", "resolution"),
];

/// Substitute a localised string for `value` when one exists
pub fn localise(value: &ReportValue, localisation: &Localisation, locale: &str) -> ReportValue {
    value
        .as_str()
        .and_then(|s| localisation.lookup(locale, s))
        .map(ReportValue::from)
        .unwrap_or_else(|| value.clone())
}

fn parse_graphics_or_display(
    item: &Record,
    attrs: &[(&str, &str)],
    localisation: &Localisation,
    locale: &str,
) -> Record {
    map_attributes(item, attrs, |_, value| localise(value, localisation, locale))
}

/// Parse one graphics device and the displays attached to it
pub fn parse_graphics(item: &Record, localisation: &Localisation, locale: &str) -> Record {
    let mut graphics = parse_graphics_or_display(item, SP_GRAPHICS_ATTRS, localisation, locale);

    let displays: Vec<ReportValue> = item
        .get("spdisplays_ndrvs")
        .and_then(ReportValue::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(ReportValue::as_dict)
                .map(|display| {
                    ReportValue::Dict(parse_graphics_or_display(
                        display,
                        SP_DISPLAYS_ATTRS,
                        localisation,
                        locale,
                    ))
                })
                .collect()
        })
        .unwrap_or_default();

    graphics.insert("displays".to_string(), ReportValue::Array(displays));
    graphics
}

/// Parse the `system_profiler -json SPDisplaysDataType` document
pub fn parse_displays(
    document: &ReportValue,
    localisation: &Localisation,
    locale: &str,
) -> Vec<Record> {
    system_profiler_items(document, DISPLAYS_DATA_TYPE)
        .into_iter()
        .map(|item| parse_graphics(item, localisation, locale))
        .collect()
}

/// Parse a `Localizable.strings` table
///
/// Reporter bundles ship these either as property lists or as
/// `"key" = "value";` text in UTF-8 or UTF-16.
pub fn parse_strings_table(bytes: &[u8]) -> Result<HashMap<String, String>, String> {
    if let Ok(plist::Value::Dictionary(dict)) = plist::Value::from_reader(Cursor::new(bytes)) {
        return Ok(dict
            .into_iter()
            .filter_map(|(key, value)| value.into_string().map(|s| (key, s)))
            .collect());
    }

    let text = decode_strings_text(bytes)?;
    let table: HashMap<String, String> = STRINGS_ENTRY_RE
        .captures_iter(&text)
        .map(|caps| (unescape(&caps[1]), unescape(&caps[2])))
        .collect();

    if table.is_empty() && !text.trim().is_empty() {
        return Err("No string entries found".to_string());
    }
    Ok(table)
}

fn decode_strings_text(bytes: &[u8]) -> Result<String, String> {
    let utf16 = |data: &[u8], little_endian: bool| -> Result<String, String> {
        let units: Vec<u16> = data
            .chunks_exact(2)
            .map(|pair| {
                if little_endian {
                    u16::from_le_bytes([pair[0], pair[1]])
                } else {
                    u16::from_be_bytes([pair[0], pair[1]])
                }
            })
            .collect();
        String::from_utf16(&units).map_err(|e| format!("Invalid UTF-16: {e}"))
    };

    match bytes {
        [0xFF, 0xFE, rest @ ..] => utf16(rest, true),
        [0xFE, 0xFF, rest @ ..] => utf16(rest, false),
        [0xEF, 0xBB, 0xBF, rest @ ..] => {
            String::from_utf8(rest.to_vec()).map_err(|e| format!("Invalid UTF-8: {e}"))
        }
        _ => String::from_utf8(bytes.to_vec()).map_err(|e| format!("Invalid UTF-8: {e}")),
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
