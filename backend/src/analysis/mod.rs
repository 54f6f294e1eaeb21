//! Schema Analyzer
//!
//! Infers a flat field → type map, a short preview, and advisory warnings
//! from an unknown payload. Results feed the agent prompt and the UI; they
//! never influence execution.
//!
//! Fields are reported at the top level and one nested level
//! (`customer.name`). Large lists are sampled.

pub mod fingerprint;

use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use crate::models::{AnalysisResult, Issue};

pub use fingerprint::fingerprint;

/// Analyzer tuning
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzerOptions {
    /// Maximum number of records inspected
    pub sample_size: usize,
    /// Number of records returned as preview
    pub preview_rows: usize,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            sample_size: 100,
            preview_rows: 3,
        }
    }
}

#[derive(Debug, Default)]
struct FieldStats {
    types: BTreeSet<&'static str>,
    seen: usize,
    empty: usize,
}

impl FieldStats {
    fn observe(&mut self, value: &Value) {
        self.seen += 1;
        match value {
            Value::Null => self.empty += 1,
            Value::String(s) if s.is_empty() => {
                self.empty += 1;
                self.types.insert("string");
            }
            other => {
                self.types.insert(type_name(other));
            }
        }
    }

    fn inferred(&self) -> &'static str {
        match self.types.len() {
            0 => "null",
            1 => self.types.iter().next().copied().unwrap_or("null"),
            _ => "mixed",
        }
    }
}

/// Analyze a payload with default options
pub fn analyze(payload: &Value) -> AnalysisResult {
    analyze_with(payload, &AnalyzerOptions::default())
}

/// Analyze a payload
///
/// # Arguments
/// * `payload` - An object, or a list of objects
/// * `options` - Sample and preview sizes
pub fn analyze_with(payload: &Value, options: &AnalyzerOptions) -> AnalysisResult {
    let records = records_of(payload);
    let sample: Vec<&Map<String, Value>> =
        records.iter().copied().take(options.sample_size).collect();

    let mut result = AnalysisResult {
        preview: records
            .iter()
            .take(options.preview_rows)
            .map(|r| Value::Object((*r).clone()))
            .collect(),
        ..Default::default()
    };

    if records.is_empty() {
        if !matches!(payload, Value::Array(items) if items.is_empty()) {
            result.issues.push(Issue::warning(
                "$",
                "payload has no object records to analyze",
            ));
        }
        return result;
    }

    // field -> stats, plus how many records could have carried it
    let mut stats: BTreeMap<String, FieldStats> = BTreeMap::new();
    let mut parents: BTreeMap<String, usize> = BTreeMap::new();

    for record in &sample {
        for (key, value) in record.iter() {
            stats.entry(key.clone()).or_default().observe(value);
            if let Value::Object(nested) = value {
                *parents.entry(key.clone()).or_default() += 1;
                for (child, child_value) in nested {
                    stats
                        .entry(format!("{}.{}", key, child))
                        .or_default()
                        .observe(child_value);
                }
            }
        }
    }

    for (field, field_stats) in &stats {
        result
            .schema
            .insert(field.clone(), field_stats.inferred().to_string());

        if field_stats.types.len() > 1 {
            let names: Vec<&str> = field_stats.types.iter().copied().collect();
            result.issues.push(Issue::warning(
                field,
                format!("Mixed value types detected ({}).", names.join(", ")),
            ));
        }

        let possible = match field.split_once('.') {
            Some((parent, _)) => parents.get(parent).copied().unwrap_or(0),
            None => sample.len(),
        };
        if field_stats.seen < possible {
            result.issues.push(Issue::warning(
                field,
                format!(
                    "present in {} of {} sampled records",
                    field_stats.seen, possible
                ),
            ));
        }

        if field_stats.empty > 0 {
            result.issues.push(Issue::warning(
                field,
                format!("{} sample rows missing values.", field_stats.empty),
            ));
        }
    }

    result
}

/// Object records of a payload: list elements, or the payload itself.
fn records_of(payload: &Value) -> Vec<&Map<String, Value>> {
    match payload {
        Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
        Value::Object(map) => vec![map],
        _ => Vec::new(),
    }
}

/// Coarse type name used in analysis output
fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IssueLevel;
    use serde_json::json;

    fn messages_for<'a>(result: &'a AnalysisResult, field: &str) -> Vec<&'a str> {
        result
            .issues
            .iter()
            .filter(|i| i.field == field)
            .map(|i| i.message.as_str())
            .collect()
    }

    #[test]
    fn test_infers_types() {
        let payload = json!([
            {"id": 1, "name": "a", "active": true, "tags": ["x"], "customer": {"name": "Ana", "age": 30}},
            {"id": 2, "name": "b", "active": false, "tags": [], "customer": {"name": "Bo", "age": 41}}
        ]);
        let result = analyze(&payload);

        assert_eq!(result.schema["id"], "number");
        assert_eq!(result.schema["name"], "string");
        assert_eq!(result.schema["active"], "boolean");
        assert_eq!(result.schema["tags"], "array");
        assert_eq!(result.schema["customer"], "object");
        assert_eq!(result.schema["customer.name"], "string");
        assert_eq!(result.schema["customer.age"], "number");
        assert!(result.issues.is_empty());
        assert_eq!(result.preview.len(), 2);
    }

    #[test]
    fn test_mixed_type_warning() {
        let payload = json!([{"id": 1}, {"id": "2"}]);
        let result = analyze(&payload);

        assert_eq!(result.schema["id"], "mixed");
        assert_eq!(
            messages_for(&result, "id"),
            vec!["Mixed value types detected (number, string)."]
        );
        assert!(result.issues.iter().all(|i| i.level == IssueLevel::Warning));
    }

    #[test]
    fn test_partial_coverage_warning() {
        let payload = json!([
            {"id": 1, "customer": {"name": "Ana"}},
            {"id": 2, "customer": {"name": "Bo", "vip": true}},
            {"id": 3}
        ]);
        let result = analyze(&payload);

        assert_eq!(
            messages_for(&result, "customer"),
            vec!["present in 2 of 3 sampled records"]
        );
        assert_eq!(
            messages_for(&result, "customer.vip"),
            vec!["present in 1 of 2 sampled records"]
        );
        assert!(messages_for(&result, "customer.name").is_empty());
        assert!(messages_for(&result, "id").is_empty());
    }

    #[test]
    fn test_empty_values_warning() {
        let payload = json!([{"note": null}, {"note": ""}, {"note": "x"}]);
        let result = analyze(&payload);

        assert_eq!(result.schema["note"], "string");
        assert_eq!(messages_for(&result, "note"), vec!["2 sample rows missing values."]);
    }

    #[test]
    fn test_only_null_field() {
        let result = analyze(&json!({"gone": null}));
        assert_eq!(result.schema["gone"], "null");
    }

    #[test]
    fn test_sample_and_preview_bounds() {
        let items: Vec<Value> = (0..500)
            .map(|i| if i < 10 { json!({"id": i}) } else { json!({"id": i, "late": true}) })
            .collect();
        let options = AnalyzerOptions {
            sample_size: 10,
            preview_rows: 3,
        };
        let result = analyze_with(&Value::Array(items), &options);

        assert_eq!(result.preview.len(), 3);
        assert!(!result.schema.contains_key("late"));
    }

    #[test]
    fn test_non_record_payloads() {
        let result = analyze(&json!(42));
        assert!(result.schema.is_empty());
        assert_eq!(result.issues.len(), 1);

        let result = analyze(&json!([]));
        assert!(result.schema.is_empty());
        assert!(result.issues.is_empty());
    }
}
