//! Mapping Executor
//!
//! Applies a [`MappingSpecification`] to a JSON payload to produce target
//! records. Data problems become [`Issue`]s; nothing here fails.

use serde_json::Value;

use super::path::Resolved;
use super::spec::{MappingEntry, MappingSpecification};
use super::transforms::TransformOutcome;
use crate::models::{ExecutionResult, Issue, Record};

/// Execute a mapping specification on a payload
///
/// # Arguments
/// * `payload` - An object, or a list of objects executed element by element
/// * `spec` - The mapping specification to apply
///
/// # Returns
/// One record per list element (a single record for anything else), and the
/// issues raised, ordered by element index then by entry declaration order.
pub fn execute(payload: &Value, spec: &MappingSpecification) -> ExecutionResult {
    let mut result = ExecutionResult::new();

    match payload {
        Value::Array(elements) => {
            for (idx, element) in elements.iter().enumerate() {
                let (record, issues) = execute_element(element, spec, Some(idx));
                result.records.push(record);
                result.issues.extend(issues);
            }
        }
        element => {
            let (record, issues) = execute_element(element, spec, None);
            result.records.push(record);
            result.issues.extend(issues);
        }
    }

    result
}

/// Map a single payload element into one record
fn execute_element(
    element: &Value,
    spec: &MappingSpecification,
    index: Option<usize>,
) -> (Record, Vec<Issue>) {
    let mut record: Record = spec
        .defaults
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let mut issues = Vec::new();

    if !element.is_object() {
        issues.push(
            Issue::warning("$", format!("expected an object, found {}", kind_of(element)))
                .at_record(index),
        );
    }

    for entry in &spec.mappings {
        if let Some(issue) = apply_entry(element, entry, &mut record) {
            issues.push(issue.at_record(index));
        }
    }

    for target in spec.required_targets() {
        if !record.contains_key(target) {
            issues.push(Issue::error(target, "missing required field").at_record(index));
        }
    }

    (record, issues)
}

/// Run one entry against an element, writing into `record`
fn apply_entry(element: &Value, entry: &MappingEntry, record: &mut Record) -> Option<Issue> {
    if let Some(condition) = &entry.condition {
        if !condition.matches(element) {
            return None;
        }
    }

    let resolved = match entry.source.resolve(element) {
        Resolved::Absent => Resolved::One(entry.default.clone()?),
        found => found,
    };

    let Some(transform) = entry.transform else {
        if let Some(value) = resolved.into_value() {
            record.insert(entry.target.clone(), value);
        }
        return None;
    };

    let outcome = match &resolved {
        Resolved::Absent => return None,
        Resolved::One(value) => transform.apply(value),
        Resolved::Many(values) => transform.apply_each(values),
    };

    match outcome {
        TransformOutcome::Value(value) => {
            record.insert(entry.target.clone(), value);
            None
        }
        TransformOutcome::Lossy { value, note } => {
            record.insert(entry.target.clone(), value);
            Some(Issue::warning(&entry.target, note))
        }
        TransformOutcome::Failed => Some(Issue::error(
            &entry.target,
            format!("{} transform failed", transform),
        )),
    }
}

/// JSON type name of a value
pub fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
