//! Target schema validation for mapped records.
//!
//! Checks executor output against a [`TargetSchema`] using JSON Schema
//! Draft 7 fragments, one per declared field.
//!
//! # Rules
//!
//! - A required field that is absent (or `null`) in every record is an error.
//! - A field whose values have the wrong type is flagged once per run, with
//!   the number of offending records in the message.
//! - Fields not declared in the schema are removed by [`drop_undeclared`]
//!   without raising anything.
//! - [`record_violations`] gives a stricter per-record report for records
//!   produced elsewhere.
//!
//! # Example
//!
//! ```rust,ignore
//! use roaster::mapping::{execute, example_spec};
//! use roaster::validation::{drop_undeclared, validate};
//!
//! let spec = example_spec();
//! let schema = spec.target_schema.clone().unwrap();
//! let mut result = execute(&payload, &spec);
//! drop_undeclared(&mut result, &schema);
//! let issues = validate(&result, &schema);
//! ```

use chrono::NaiveDate;
use jsonschema::Validator;
use serde_json::Value;

use crate::mapping::{FieldType, TargetSchema};
use crate::models::{ExecutionResult, Issue, Record};

/// Compiled type check for one declared field type
pub struct TypeCheck {
    field_type: FieldType,
    validator: Validator,
}

impl TypeCheck {
    /// Compile the Draft 7 fragment of `field_type`
    pub fn new(field_type: FieldType) -> Result<Self, String> {
        let validator = jsonschema::draft7::new(&field_type.json_schema())
            .map_err(|e| format!("Invalid schema for {}: {}", field_type, e))?;
        Ok(Self {
            field_type,
            validator,
        })
    }

    /// Check a single non-null value against the declared type.
    pub fn conforms(&self, value: &Value) -> bool {
        if !self.validator.is_valid(value) {
            return false;
        }
        match (self.field_type, value) {
            (FieldType::Date, Value::String(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
            _ => true,
        }
    }
}

/// Validate executor output against the declared target schema.
///
/// Each declared field is compiled once and checked against every record.
///
/// # Returns
/// Issues in field-name order; an empty list when every record conforms.
/// A run with no records yields nothing.
pub fn validate(result: &ExecutionResult, schema: &TargetSchema) -> Vec<Issue> {
    let mut issues = Vec::new();
    let total = result.records.len();
    if total == 0 {
        return issues;
    }

    for (field, decl) in schema.fields() {
        let present: Vec<&Value> = result
            .records
            .iter()
            .filter_map(|record| record.get(field))
            .filter(|value| !value.is_null())
            .collect();

        if present.is_empty() {
            if decl.required {
                issues.push(Issue::error(field, "missing required field"));
            }
            continue;
        }

        let check = match TypeCheck::new(decl.field_type) {
            Ok(check) => check,
            Err(message) => {
                issues.push(Issue::error(field, message));
                continue;
            }
        };

        let mismatched = present.iter().filter(|value| !check.conforms(value)).count();
        if mismatched > 0 {
            issues.push(Issue::error(
                field,
                format!(
                    "expected {}, found mismatched values in {} of {} records",
                    decl.field_type, mismatched, total
                ),
            ));
        }
    }

    issues
}

/// Remove fields not declared in the schema from every record.
///
/// # Returns
/// The number of values dropped.
pub fn drop_undeclared(result: &mut ExecutionResult, schema: &TargetSchema) -> usize {
    let mut dropped = 0;
    for record in &mut result.records {
        let before = record.len();
        record.retain(|field, _| schema.contains(field));
        dropped += before - record.len();
    }
    dropped
}

/// Strict per-record check against the whole-record JSON Schema.
///
/// Unlike [`validate`], a `null` in a typed field and any undeclared field
/// count as violations. The schema is compiled once for all records.
///
/// # Returns
/// * `Ok(violations)` with `(record index, messages)` for every failing record
/// * `Err(message)` if the generated schema does not compile
pub fn record_violations(
    schema: &TargetSchema,
    records: &[Record],
) -> Result<Vec<(usize, Vec<String>)>, String> {
    let validator = jsonschema::draft7::new(&schema.to_json_schema())
        .map_err(|e| format!("Invalid schema: {}", e))?;

    Ok(records
        .iter()
        .enumerate()
        .filter_map(|(idx, record)| {
            let value = Value::Object(record.clone());
            let errors: Vec<String> = validator.iter_errors(&value).map(|e| e.to_string()).collect();
            (!errors.is_empty()).then_some((idx, errors))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{example_spec, execute};
    use crate::models::{IssueLevel, Record};
    use serde_json::json;

    fn result_of(records: Vec<Value>) -> ExecutionResult {
        ExecutionResult {
            records: records
                .into_iter()
                .map(|v| match v {
                    Value::Object(map) => map,
                    _ => Record::new(),
                })
                .collect(),
            issues: Vec::new(),
        }
    }

    #[test]
    fn test_example_order_missing_total() {
        let spec = example_spec();
        let schema = spec.target_schema.clone().unwrap();
        let result = execute(&json!({"order_id": 7, "customer": {"name": "Ana"}}), &spec);

        let issues = validate(&result, &schema);
        assert_eq!(issues, vec![Issue::error("order_total", "missing required field")]);
    }

    #[test]
    fn test_required_absent_only_when_missing_everywhere() {
        let schema = TargetSchema::new().with_field("id", FieldType::Integer, true);

        let partial = result_of(vec![json!({"id": 1}), json!({})]);
        assert!(validate(&partial, &schema).is_empty());

        let nulls = result_of(vec![json!({"id": null}), json!({})]);
        assert_eq!(validate(&nulls, &schema).len(), 1);
    }

    #[test]
    fn test_optional_field_may_be_absent() {
        let schema = TargetSchema::new().with_field("note", FieldType::String, false);
        let result = result_of(vec![json!({})]);
        assert!(validate(&result, &schema).is_empty());
    }

    #[test]
    fn test_type_mismatch_aggregated() {
        let schema = TargetSchema::new().with_field("amount", FieldType::Number, true);
        let result = result_of(vec![
            json!({"amount": 1.5}),
            json!({"amount": "2"}),
            json!({"amount": "x"}),
        ]);

        let issues = validate(&result, &schema);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].level, IssueLevel::Error);
        assert_eq!(
            issues[0].message,
            "expected number, found mismatched values in 2 of 3 records"
        );
    }

    #[test]
    fn test_no_records_no_issues() {
        let schema = example_spec().target_schema.unwrap();
        assert!(validate(&ExecutionResult::new(), &schema).is_empty());
    }

    #[test]
    fn test_type_checks() {
        let check = |t| TypeCheck::new(t).unwrap();
        assert!(check(FieldType::Integer).conforms(&json!(3)));
        assert!(!check(FieldType::Integer).conforms(&json!(3.5)));
        assert!(check(FieldType::Number).conforms(&json!(3)));
        let date = check(FieldType::Date);
        assert!(date.conforms(&json!("2024-02-29")));
        assert!(!date.conforms(&json!("2023-02-29")));
        assert!(!date.conforms(&json!("29/02/2024")));
        assert!(check(FieldType::Object).conforms(&json!({"a": 1})));
        assert!(check(FieldType::Any).conforms(&json!([1])));
        assert!(!check(FieldType::Boolean).conforms(&json!("true")));
    }

    #[test]
    fn test_many_records_many_fields() {
        let mut schema = TargetSchema::new();
        for i in 0..10 {
            let field_type = if i % 2 == 0 { FieldType::Date } else { FieldType::Integer };
            schema = schema.with_field(&format!("f{}", i), field_type, true);
        }
        let records: Vec<Value> = (0..5_000)
            .map(|n| {
                let mut record = serde_json::Map::new();
                for i in 0..10 {
                    let value = match (i % 2, n) {
                        (0, 0) => json!("2024-13-01"),
                        (0, _) => json!("2024-01-31"),
                        (_, 1) => json!("one"),
                        _ => json!(n),
                    };
                    record.insert(format!("f{}", i), value);
                }
                Value::Object(record)
            })
            .collect();

        let issues = validate(&result_of(records), &schema);

        assert_eq!(issues.len(), 10);
        assert_eq!(
            issues[0].message,
            "expected date, found mismatched values in 1 of 5000 records"
        );
        assert_eq!(
            issues[1].message,
            "expected integer, found mismatched values in 1 of 5000 records"
        );
    }

    #[test]
    fn test_drop_undeclared() {
        let schema = TargetSchema::new().with_field("id", FieldType::Integer, true);
        let mut result = result_of(vec![json!({"id": 1, "extra": true}), json!({"extra": 2})]);

        assert_eq!(drop_undeclared(&mut result, &schema), 2);
        assert!(result.records.iter().all(|r| !r.contains_key("extra")));
        assert!(validate(&result, &schema).is_empty());
    }

    #[test]
    fn test_record_violations() {
        let schema = example_spec().target_schema.unwrap();
        let result = result_of(vec![
            json!({"external_id": "7", "customer_name": "Ana", "order_total": 10}),
            json!({"external_id": 7}),
            json!({"external_id": "8", "customer_name": null, "order_total": 1}),
        ]);

        let violations = record_violations(&schema, &result.records).unwrap();

        let failing: Vec<usize> = violations.iter().map(|(idx, _)| *idx).collect();
        assert_eq!(failing, vec![1, 2]);
        assert!(violations[0].1.len() >= 3);
    }
}
