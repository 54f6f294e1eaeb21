//! REST API request and response types.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::agent::{AgentOptions, AgentOutcome, StopReason};
use crate::analysis::AnalyzerOptions;
use crate::models::{ExecutionResult, Issue, Record};

/// `POST /api/analyze`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeRequest {
    pub data: Value,
    #[serde(default)]
    pub options: AnalyzerOptions,
}

/// `POST /api/execute`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    pub data: Value,
    /// Mapping specification, parsed on arrival
    pub mapping: Value,
}

/// `POST /api/map`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapRequest {
    pub data: Value,
    pub mapping: Value,
    /// Agent settings; the agent is off when this is absent
    #[serde(default)]
    pub mapping_agent: Option<AgentOptions>,
}

/// Response for a single execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    pub job_id: String,
    /// "ready" when clean, "warning" otherwise
    pub status: String,
    pub records: Vec<Record>,
    pub issues: Vec<Issue>,
    pub summary: String,
}

/// Response for an agent run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapResponse {
    pub job_id: String,
    pub status: String,
    pub records: Vec<Record>,
    pub issues: Vec<Issue>,
    /// Specification that produced `records`
    pub mapping: Value,
    pub stop_reason: StopReason,
    pub iterations: usize,
    pub issue_counts: Vec<usize>,
}

fn status_for(result: &ExecutionResult) -> &'static str {
    if result.is_clean() {
        "ready"
    } else {
        "warning"
    }
}

impl From<ExecutionResult> for ExecuteResponse {
    fn from(result: ExecutionResult) -> Self {
        Self {
            job_id: Uuid::new_v4().to_string(),
            status: status_for(&result).to_string(),
            summary: result.summary(),
            records: result.records,
            issues: result.issues,
        }
    }
}

impl From<AgentOutcome> for MapResponse {
    fn from(outcome: AgentOutcome) -> Self {
        Self {
            job_id: outcome.run_id.to_string(),
            status: status_for(&outcome.result).to_string(),
            mapping: outcome.spec.to_value().unwrap_or(Value::Null),
            records: outcome.result.records,
            issues: outcome.result.issues,
            stop_reason: outcome.stop_reason,
            iterations: outcome.iterations,
            issue_counts: outcome.issue_counts,
        }
    }
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "jobId": Uuid::new_v4().to_string(),
        "status": "error",
        "error": error,
        "records": [],
        "issues": []
    })
}
