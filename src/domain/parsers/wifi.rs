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

//! WiFi report parsing (`airport -I`)
//!
//! BSSID values are never reported, and neither is known network or channel
//! history: SSID history can be used to track where a user has been.

use super::common::{parse_key_value, parse_scalar};
use crate::domain::{Record, ReportValue};

/// airport key → report column, applied before key normalization
pub const AIRPORT_ATTRS: &[(&str, &str)] = &[("802.11 auth", "x802_11_auth")];

/// Output fragments airport prints when the interface is powered off
const AIRPORT_OFF_MARKERS: &[&str] = &["AirPort: Off", "AirPort is Off"];

/// Normalize an airport output key into a report column name
pub fn clean_airport_key(key: &str) -> String {
    let mapped = AIRPORT_ATTRS
        .iter()
        .find(|(from, _)| *from == key)
        .map_or(key, |(_, to)| *to);

    mapped.to_lowercase().replace(['.', ' '], "_")
}

/// Signal to noise ratio from the RSSI and noise readings
pub fn calc_snr(rssi: i64, noise: i64) -> i64 {
    rssi - noise
}

fn integer_field(record: &Record, key: &str) -> i64 {
    match record.get(key) {
        Some(ReportValue::Integer(i)) => *i,
        Some(ReportValue::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

/// Parse `airport -I` output
pub fn parse_airport_info(output: &str) -> Record {
    let mut result = Record::new();
    result.insert("state".to_string(), ReportValue::from("off"));

    if AIRPORT_OFF_MARKERS.iter().any(|marker| output.contains(marker)) {
        return result;
    }

    for line in output.lines() {
        let Ok((key, value)) = parse_key_value(line.trim(), ':') else {
            continue;
        };
        if key.is_empty() || value.is_empty() {
            continue;
        }
        result.insert(clean_airport_key(&key), parse_scalar(&value));
    }

    let rssi = integer_field(&result, "agrctlrssi");
    let noise = integer_field(&result, "agrctlnoise");
    result.insert("snr".to_string(), ReportValue::Integer(calc_snr(rssi, noise)));

    result.remove("bssid");
    result
}
