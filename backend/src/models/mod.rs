//! Shared data types for the mapping engine.
//!
//! - [`Issue`] - a field-level warning or error
//! - [`ExecutionResult`] - records produced by a mapping run, plus issues
//! - [`AnalysisResult`] - inferred schema and preview of an input payload
//!
//! All of these are plain values: created per call and handed to the caller.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A target record: field name to value.
pub type Record = Map<String, Value>;

// =============================================================================
// Issues
// =============================================================================

/// Severity of an [`Issue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueLevel {
    Warning,
    Error,
}

/// A field-level problem found during analysis, execution or validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Field the issue is about (target field, or source key for analysis).
    pub field: String,
    pub level: IssueLevel,
    pub message: String,
    /// Element index when the payload was a list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<usize>,
}

impl Issue {
    pub fn warning(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            level: IssueLevel::Warning,
            message: message.into(),
            record: None,
        }
    }

    pub fn error(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            level: IssueLevel::Error,
            message: message.into(),
            record: None,
        }
    }

    /// Scope the issue to a payload element.
    pub fn at_record(mut self, record: Option<usize>) -> Self {
        self.record = record;
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == IssueLevel::Error
    }
}

// =============================================================================
// Execution Result
// =============================================================================

/// Output of executing a mapping specification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// One record per payload element (one for an object payload).
    pub records: Vec<Record>,
    pub issues: Vec<Issue>,
}

impl ExecutionResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn error_count(&self) -> usize {
        self.issues.iter().filter(|i| i.is_error()).count()
    }

    /// Check if the run produced no issues at all
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Get summary statistics
    pub fn summary(&self) -> String {
        format!(
            "Mapped: {} records, {} issues ({} errors)",
            self.records.len(),
            self.issues.len(),
            self.error_count()
        )
    }
}

// =============================================================================
// Analysis Result
// =============================================================================

/// Structural description of an input payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Field (or `parent.child`) to inferred type name.
    pub schema: BTreeMap<String, String>,
    /// First few records of the payload.
    pub preview: Vec<Value>,
    /// Advisory warnings; never gate execution.
    pub issues: Vec<Issue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_issue_serialization() {
        let issue = Issue::error("order_total", "missing required field");
        let value = serde_json::to_value(&issue).unwrap();
        assert_eq!(
            value,
            json!({"field": "order_total", "level": "error", "message": "missing required field"})
        );

        let scoped = Issue::warning("price", "lossy").at_record(Some(2));
        let value = serde_json::to_value(&scoped).unwrap();
        assert_eq!(value["record"], 2);
        assert_eq!(value["level"], "warning");
    }

    #[test]
    fn test_execution_result_summary() {
        let mut result = ExecutionResult::new();
        result.records.push(Record::new());
        result.issues.push(Issue::warning("a", "w"));
        result.issues.push(Issue::error("b", "e"));
        assert_eq!(result.error_count(), 1);
        assert!(!result.is_clean());
        assert_eq!(result.summary(), "Mapped: 1 records, 2 issues (1 errors)");
    }
}
