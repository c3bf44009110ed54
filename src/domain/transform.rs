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

//! Record transforms applied before reports are written
//!
//! `flatten` turns nested records into single-level records with composite
//! keys (for CSV export), `clean` strips absent and empty values (property
//! lists cannot hold null).

use crate::domain::{Record, ReportValue};

/// Default separator between composite key segments
pub const DEFAULT_SEPARATOR: &str = ".";

/// What a flattened sequence element that is not a dictionary maps to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequenceLeaves {
    /// Every positional key holds the whole original sequence.
    ///
    /// This is what the upstream reporting pipeline has always received.
    #[default]
    WholeSequence,
    /// Each positional key holds its own element
    Element,
}

/// Flattens nested records into composite-key records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flattener {
    separator: String,
    sequence_leaves: SequenceLeaves,
}

impl Default for Flattener {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR)
    }
}

impl Flattener {
    pub fn new(separator: &str) -> Self {
        Self {
            separator: separator.to_string(),
            sequence_leaves: SequenceLeaves::default(),
        }
    }

    /// Choose how non-dictionary sequence elements are flattened
    pub fn sequence_leaves(mut self, mode: SequenceLeaves) -> Self {
        self.sequence_leaves = mode;
        self
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// Flatten `record` with an empty parent key
    pub fn flatten(&self, record: &Record) -> Record {
        self.flatten_with_parent(record, "")
    }

    /// Flatten `record`, prefixing every produced key with `parent`
    pub fn flatten_with_parent(&self, record: &Record, parent: &str) -> Record {
        let mut result = Record::new();
        self.flatten_into(record, parent, &mut result);
        result
    }

    fn flatten_into(&self, record: &Record, parent: &str, result: &mut Record) {
        let sep = &self.separator;

        for (key, value) in record {
            match value {
                ReportValue::Dict(inner) if value.is_truthy() => {
                    self.flatten_into(inner, &format!("{parent}{key}{sep}"), result);
                }
                ReportValue::Array(items) if value.is_truthy() => {
                    for (position, item) in (1..).zip(items) {
                        match item {
                            ReportValue::Dict(inner) if item.is_truthy() => {
                                let nested = format!("{parent}{key}{sep}{position}{sep}");
                                self.flatten_into(inner, &nested, result);
                            }
                            _ => {
                                let leaf = match self.sequence_leaves {
                                    SequenceLeaves::WholeSequence => value.clone(),
                                    SequenceLeaves::Element => item.clone(),
                                };
                                result.insert(format!("{parent}{key}{sep}{position}"), leaf);
                            }
                        }
                    }
                }
                _ => {
                    result.insert(format!("{parent}{key}"), value.clone());
                }
            }
        }
    }
}

/// Flatten a record with the given separator and default sequence handling
pub fn flatten(record: &Record, separator: &str) -> Record {
    Flattener::new(separator).flatten(record)
}

/// Return a copy of `record` without null or empty-string values
///
/// Dictionaries and arrays are cleaned recursively; containers left empty by
/// cleaning are dropped too.
pub fn clean(record: &Record) -> Record {
    record
        .iter()
        .filter_map(|(key, value)| clean_value(value).map(|v| (key.clone(), v)))
        .collect()
}

fn clean_value(value: &ReportValue) -> Option<ReportValue> {
    match value {
        ReportValue::Null => None,
        ReportValue::String(s) if s.is_empty() => None,
        ReportValue::Dict(inner) => {
            let cleaned = clean(inner);
            (!cleaned.is_empty()).then_some(ReportValue::Dict(cleaned))
        }
        ReportValue::Array(items) => {
            let cleaned: Vec<ReportValue> = items.iter().filter_map(clean_value).collect();
            (!cleaned.is_empty()).then_some(ReportValue::Array(cleaned))
        }
        other => Some(other.clone()),
    }
}

/// 1 for true, 0 for false
pub fn bool_to_int(b: bool) -> i64 {
    if b {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: Vec<(&str, ReportValue)>) -> Record {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn int(i: i64) -> ReportValue {
        ReportValue::Integer(i)
    }

    #[test]
    fn test_flatten_nested_dict() {
        let input = record(vec![(
            "a",
            ReportValue::Dict(record(vec![("b", int(1)), ("c", int(2))])),
        )]);

        let flat = flatten(&input, ".");
        assert_eq!(flat, record(vec![("a.b", int(1)), ("a.c", int(2))]));
    }

    #[test]
    fn test_flatten_flat_record_is_identity() {
        let input = record(vec![
            ("name", ReportValue::from("Safari")),
            ("version", ReportValue::from("17.0")),
            ("has64bit", int(1)),
            ("empty", ReportValue::from("")),
        ]);
        assert_eq!(flatten(&input, "."), input);
    }

    #[test]
    fn test_flatten_sequence_of_dicts() {
        let input = record(vec![(
            "displays",
            ReportValue::Array(vec![
                ReportValue::Dict(record(vec![("name", ReportValue::from("LG"))])),
                ReportValue::Dict(record(vec![("name", ReportValue::from("Color LCD"))])),
            ]),
        )]);

        let flat = flatten(&input, "_");
        assert_eq!(flat.len(), 2);
        assert_eq!(flat["displays_1_name"], ReportValue::from("LG"));
        assert_eq!(flat["displays_2_name"], ReportValue::from("Color LCD"));
    }

    #[test]
    fn test_flatten_sequence_leaves_whole_sequence() {
        let list = ReportValue::Array(vec![ReportValue::from("x"), ReportValue::from("y")]);
        let input = record(vec![("tags", list.clone())]);

        let flat = flatten(&input, ".");
        assert_eq!(flat["tags.1"], list);
        assert_eq!(flat["tags.2"], list);
    }

    #[test]
    fn test_flatten_sequence_leaves_element() {
        let input = record(vec![(
            "tags",
            ReportValue::Array(vec![ReportValue::from("x"), ReportValue::from("y")]),
        )]);

        let flat = Flattener::new(".")
            .sequence_leaves(SequenceLeaves::Element)
            .flatten(&input);
        assert_eq!(flat["tags.1"], ReportValue::from("x"));
        assert_eq!(flat["tags.2"], ReportValue::from("y"));
    }

    #[test]
    fn test_flatten_falsy_values_kept_under_plain_key() {
        let input = record(vec![
            ("empty_dict", ReportValue::Dict(Record::new())),
            ("empty_list", ReportValue::Array(vec![])),
            ("zero", int(0)),
            ("none", ReportValue::Null),
        ]);
        assert_eq!(flatten(&input, "."), input);
    }

    #[test]
    fn test_flatten_with_parent_prefix() {
        let input = record(vec![("b", int(1))]);
        let flat = Flattener::default().flatten_with_parent(&input, "a.");
        assert_eq!(flat, record(vec![("a.b", int(1))]));
    }

    #[test]
    fn test_flatten_key_paths_reconstruct() {
        let input = record(vec![
            (
                "gpu",
                ReportValue::Dict(record(vec![
                    ("vendor", ReportValue::from("Apple")),
                    (
                        "bus",
                        ReportValue::Dict(record(vec![("kind", ReportValue::from("builtin"))])),
                    ),
                ])),
            ),
            ("tags", ReportValue::Array(vec![ReportValue::from("a")])),
        ]);

        let flat = Flattener::new("/")
            .sequence_leaves(SequenceLeaves::Element)
            .flatten(&input);

        let mut paths: Vec<Vec<&str>> = flat.keys().map(|k| k.split('/').collect()).collect();
        paths.sort();
        assert_eq!(
            paths,
            vec![
                vec!["gpu", "bus", "kind"],
                vec!["gpu", "vendor"],
                vec!["tags", "1"],
            ]
        );
    }

    #[test]
    fn test_clean_example() {
        let input = record(vec![
            ("a", ReportValue::Null),
            ("b", ReportValue::from("")),
            ("c", int(1)),
            ("d", ReportValue::Dict(Record::new())),
        ]);
        assert_eq!(clean(&input), record(vec![("c", int(1))]));
    }

    #[test]
    fn test_clean_nested_containers() {
        let input = record(vec![
            (
                "list",
                ReportValue::Array(vec![
                    ReportValue::Null,
                    ReportValue::from(""),
                    ReportValue::from("kept"),
                    ReportValue::Dict(record(vec![("x", ReportValue::Null)])),
                    ReportValue::Array(vec![ReportValue::Null]),
                ]),
            ),
            (
                "nested",
                ReportValue::Dict(record(vec![(
                    "inner",
                    ReportValue::Dict(record(vec![("gone", ReportValue::from(""))])),
                )])),
            ),
            ("all_empty", ReportValue::Array(vec![ReportValue::Null])),
            ("flag", ReportValue::Bool(false)),
        ]);

        let cleaned = clean(&input);
        assert_eq!(
            cleaned,
            record(vec![
                ("list", ReportValue::Array(vec![ReportValue::from("kept")])),
                ("flag", ReportValue::Bool(false)),
            ])
        );
    }

    #[test]
    fn test_clean_is_idempotent() {
        let input = record(vec![
            ("a", ReportValue::Null),
            (
                "b",
                ReportValue::Array(vec![
                    ReportValue::Dict(record(vec![("c", ReportValue::from("")), ("d", int(0))])),
                    ReportValue::Dict(Record::new()),
                ]),
            ),
            ("e", ReportValue::from("value")),
        ]);

        let once = clean(&input);
        assert_eq!(clean(&once), once);
    }

    #[test]
    fn test_clean_does_not_mutate_input() {
        let input = record(vec![("a", ReportValue::Null)]);
        let _ = clean(&input);
        assert_eq!(input.len(), 1);
    }

    #[test]
    fn test_bool_to_int() {
        assert_eq!(bool_to_int(true), 1);
        assert_eq!(bool_to_int(false), 0);
    }
}
