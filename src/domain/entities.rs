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

use crate::domain::ReportError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// A single report record: collected attributes keyed by report column name
///
/// Keys are kept sorted so that written reports are deterministic.
pub type Record = BTreeMap<String, ReportValue>;

/// A node in a report record tree
///
/// Mirrors the shapes that `system_profiler -json`, property lists and
/// the text parsers produce.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportValue {
    /// Absent value
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    String(String),
    /// Raw bytes (property list `<data>`)
    Data(Vec<u8>),
    Array(Vec<ReportValue>),
    Dict(Record),
}

impl ReportValue {
    /// Truthiness as the upstream reporting pipeline understands it
    ///
    /// Null, `false`, zero, the empty string and empty containers are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            ReportValue::Null => false,
            ReportValue::Bool(b) => *b,
            ReportValue::Integer(i) => *i != 0,
            ReportValue::Real(r) => *r != 0.0,
            ReportValue::String(s) => !s.is_empty(),
            ReportValue::Data(d) => !d.is_empty(),
            ReportValue::Array(a) => !a.is_empty(),
            ReportValue::Dict(d) => !d.is_empty(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ReportValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ReportValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ReportValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<ReportValue>> {
        match self {
            ReportValue::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&Record> {
        match self {
            ReportValue::Dict(d) => Some(d),
            _ => None,
        }
    }

    /// Look up a key when this value is a dictionary
    pub fn get(&self, key: &str) -> Option<&ReportValue> {
        self.as_dict().and_then(|d| d.get(key))
    }

    /// Convert to a property list value
    ///
    /// Property lists have no null, so `Null` yields `None` and null
    /// entries inside containers are skipped.
    pub fn to_plist(&self) -> Option<plist::Value> {
        match self {
            ReportValue::Null => None,
            ReportValue::Bool(b) => Some(plist::Value::Boolean(*b)),
            ReportValue::Integer(i) => Some(plist::Value::Integer((*i).into())),
            ReportValue::Real(r) => Some(plist::Value::Real(*r)),
            ReportValue::String(s) => Some(plist::Value::String(s.clone())),
            ReportValue::Data(d) => Some(plist::Value::Data(d.clone())),
            ReportValue::Array(items) => Some(plist::Value::Array(
                items.iter().filter_map(ReportValue::to_plist).collect(),
            )),
            ReportValue::Dict(record) => Some(plist::Value::Dictionary(record_to_plist(record))),
        }
    }
}

/// Convert a record into a property list dictionary, dropping null entries
pub fn record_to_plist(record: &Record) -> plist::Dictionary {
    let mut dict = plist::Dictionary::new();
    for (key, value) in record {
        if let Some(v) = value.to_plist() {
            dict.insert(key.clone(), v);
        }
    }
    dict
}

impl Default for ReportValue {
    fn default() -> Self {
        ReportValue::Null
    }
}

/// Renders a value the way it appears in a CSV cell
impl fmt::Display for ReportValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportValue::Null => Ok(()),
            ReportValue::Bool(true) => write!(f, "True"),
            ReportValue::Bool(false) => write!(f, "False"),
            ReportValue::Integer(i) => write!(f, "{i}"),
            ReportValue::Real(r) => write!(f, "{r}"),
            ReportValue::String(s) => write!(f, "{s}"),
            other => {
                let json = serde_json::to_string(other).map_err(|_| fmt::Error)?;
                write!(f, "{json}")
            }
        }
    }
}

impl From<&str> for ReportValue {
    fn from(s: &str) -> Self {
        ReportValue::String(s.to_string())
    }
}

impl From<String> for ReportValue {
    fn from(s: String) -> Self {
        ReportValue::String(s)
    }
}

impl From<bool> for ReportValue {
    fn from(b: bool) -> Self {
        ReportValue::Bool(b)
    }
}

impl From<i64> for ReportValue {
    fn from(i: i64) -> Self {
        ReportValue::Integer(i)
    }
}

impl From<i32> for ReportValue {
    fn from(i: i32) -> Self {
        ReportValue::Integer(i64::from(i))
    }
}

impl From<u32> for ReportValue {
    fn from(i: u32) -> Self {
        ReportValue::Integer(i64::from(i))
    }
}

impl From<f64> for ReportValue {
    fn from(r: f64) -> Self {
        ReportValue::Real(r)
    }
}

impl From<Record> for ReportValue {
    fn from(record: Record) -> Self {
        ReportValue::Dict(record)
    }
}

impl From<Vec<ReportValue>> for ReportValue {
    fn from(items: Vec<ReportValue>) -> Self {
        ReportValue::Array(items)
    }
}

impl<T: Into<ReportValue>> From<Option<T>> for ReportValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ReportValue::Null, Into::into)
    }
}

/// Integers beyond `i64` keep their decimal text instead of being rounded
impl From<serde_json::Value> for ReportValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ReportValue::Null,
            serde_json::Value::Bool(b) => ReportValue::Bool(b),
            serde_json::Value::Number(n) => match (n.as_i64(), n.is_u64()) {
                (Some(i), _) => ReportValue::Integer(i),
                (None, true) => ReportValue::String(n.to_string()),
                (None, false) => ReportValue::Real(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => ReportValue::String(s),
            serde_json::Value::Array(items) => {
                ReportValue::Array(items.into_iter().map(ReportValue::from).collect())
            }
            serde_json::Value::Object(map) => ReportValue::Dict(
                map.into_iter()
                    .map(|(k, v)| (k, ReportValue::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Unsigned integers beyond `i64` keep their decimal text
impl From<plist::Value> for ReportValue {
    fn from(value: plist::Value) -> Self {
        match value {
            plist::Value::Boolean(b) => ReportValue::Bool(b),
            plist::Value::Integer(i) => match i.as_signed() {
                Some(v) => ReportValue::Integer(v),
                None => ReportValue::String(i.as_unsigned().unwrap_or_default().to_string()),
            },
            plist::Value::Real(r) => ReportValue::Real(r),
            plist::Value::String(s) => ReportValue::String(s),
            plist::Value::Data(d) => ReportValue::Data(d),
            plist::Value::Date(d) => ReportValue::String(d.to_xml_format()),
            plist::Value::Uid(uid) => match i64::try_from(uid.get()) {
                Ok(v) => ReportValue::Integer(v),
                Err(_) => ReportValue::String(uid.get().to_string()),
            },
            plist::Value::Array(items) => {
                ReportValue::Array(items.into_iter().map(ReportValue::from).collect())
            }
            plist::Value::Dictionary(dict) => ReportValue::Dict(
                dict.into_iter()
                    .map(|(k, v)| (k, ReportValue::from(v)))
                    .collect(),
            ),
            _ => ReportValue::Null,
        }
    }
}

/// Data handed to the report writer
#[derive(Debug, Clone, PartialEq)]
pub enum ReportData {
    /// Plain rows, written to CSV as-is
    Rows(Vec<Vec<ReportValue>>),
    /// One record per device/application/etc.
    Records(Vec<Record>),
    /// A report that is a single record (e.g. WiFi)
    Single(Record),
}

impl ReportData {
    pub fn is_empty(&self) -> bool {
        match self {
            ReportData::Rows(rows) => rows.is_empty(),
            ReportData::Records(records) => records.is_empty(),
            ReportData::Single(record) => record.is_empty(),
        }
    }

    /// Records contained in this data, in order
    pub fn records(&self) -> Vec<&Record> {
        match self {
            ReportData::Rows(_) => Vec::new(),
            ReportData::Records(records) => records.iter().collect(),
            ReportData::Single(record) => vec![record],
        }
    }

    /// Convert to a property list value (array for rows/records, dictionary for a single record)
    pub fn to_plist(&self) -> plist::Value {
        match self {
            ReportData::Rows(rows) => plist::Value::Array(
                rows.iter()
                    .map(|row| plist::Value::Array(row.iter().filter_map(ReportValue::to_plist).collect()))
                    .collect(),
            ),
            ReportData::Records(records) => plist::Value::Array(
                records
                    .iter()
                    .map(|r| plist::Value::Dictionary(record_to_plist(r)))
                    .collect(),
            ),
            ReportData::Single(record) => plist::Value::Dictionary(record_to_plist(record)),
        }
    }

    /// Convert to a report value tree
    pub fn to_value(&self) -> ReportValue {
        match self {
            ReportData::Rows(rows) => ReportValue::Array(
                rows.iter().map(|row| ReportValue::Array(row.clone())).collect(),
            ),
            ReportData::Records(records) => {
                ReportValue::Array(records.iter().cloned().map(ReportValue::Dict).collect())
            }
            ReportData::Single(record) => ReportValue::Dict(record.clone()),
        }
    }
}

/// Report types the client knows how to collect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Applications,
    Displays,
    Wifi,
    System,
}

impl ReportKind {
    /// All report kinds, in collection order
    pub const ALL: [ReportKind; 4] = [
        ReportKind::Applications,
        ReportKind::Displays,
        ReportKind::Wifi,
        ReportKind::System,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ReportKind::Applications => "applications",
            ReportKind::Displays => "displays",
            ReportKind::Wifi => "wifi",
            ReportKind::System => "system",
        }
    }

    /// Report file name for the given format, e.g. `applications.plist`
    pub fn file_name(&self, format: ReportFormat) -> String {
        format!("{}.{}", self.name(), format.extension())
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                let names: Vec<&str> = ReportKind::ALL.iter().map(|k| k.name()).collect();
                format!("Unknown report '{}', expected one of: {}", s, names.join(", "))
            })
    }
}

/// Report file formats accepted by the writer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    Csv,
    #[default]
    Plist,
}

impl ReportFormat {
    pub const VALID: [&'static str; 2] = ["csv", "plist"];

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Csv => "csv",
            ReportFormat::Plist => "plist",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "csv" => Ok(ReportFormat::Csv),
            "plist" => Ok(ReportFormat::Plist),
            _ => Err(ReportError::InvalidFormat {
                requested: s.to_string(),
                valid: ReportFormat::VALID.iter().map(|f| f.to_string()).collect(),
            }),
        }
    }
}

/// Property list encoding for written plist reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlistEncoding {
    #[default]
    Xml,
    Binary,
}

/// How a command's standard output is decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputKind {
    /// Trimmed text
    #[default]
    Text,
    /// JSON document
    Json,
    /// Property list (XML or binary)
    Plist,
}

/// Localised strings from a System Profiler reporter bundle, keyed by locale
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Localisation {
    tables: HashMap<String, HashMap<String, String>>,
}

impl Localisation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the string table for a locale
    pub fn insert_table(&mut self, locale: &str, table: HashMap<String, String>) {
        self.tables.insert(locale.to_string(), table);
    }

    /// Look up the localised form of `value` for `locale`
    pub fn lookup(&self, locale: &str, value: &str) -> Option<&str> {
        self.tables
            .get(locale)
            .and_then(|table| table.get(value))
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.tables.values().all(HashMap::is_empty)
    }
}

/// Operating system and session attributes of the managed Mac
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SystemAttributes {
    /// Product name, e.g. "macOS"
    pub os_name: Option<String>,
    /// Product version, e.g. 13.4.0
    pub os_version: Option<semver::Version>,
    /// Build version, e.g. "22F66"
    pub os_build: Option<String>,
    /// Rapid security response suffix, e.g. "(a)"
    pub os_rsr: Option<String>,
    pub is_apple_silicon: bool,
    /// Logged in console user, if any
    pub console_user: Option<String>,
    pub effective_uid: u32,
}

impl SystemAttributes {
    pub fn is_root(&self) -> bool {
        self.effective_uid == 0
    }

    pub fn has_console_user(&self) -> bool {
        self.console_user.is_some()
    }

    /// Report record for the system report
    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert("os_name".into(), self.os_name.clone().into());
        record.insert(
            "os_version".into(),
            self.os_version.as_ref().map(|v| v.to_string()).into(),
        );
        record.insert("os_build".into(), self.os_build.clone().into());
        record.insert("os_rsr".into(), self.os_rsr.clone().into());
        record.insert(
            "is_apple_silicon".into(),
            crate::domain::bool_to_int(self.is_apple_silicon).into(),
        );
        record.insert("console_user".into(), self.console_user.clone().into());
        record.insert(
            "has_console_user".into(),
            crate::domain::bool_to_int(self.has_console_user()).into(),
        );
        record.insert("effective_uid".into(), self.effective_uid.into());
        record.insert(
            "is_root".into(),
            crate::domain::bool_to_int(self.is_root()).into(),
        );
        record
    }
}
