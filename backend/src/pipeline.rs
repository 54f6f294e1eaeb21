//! High-level pipeline API for JSON mapping.
//!
//! Combines the steps callers usually want in one place: load payloads and
//! specifications, execute + project + validate, and optionally hand the
//! run to the mapping agent.
//!
//! # Example
//!
//! ```rust,ignore
//! use roaster::agent::{proposer_from_env, AgentOptions};
//! use roaster::pipeline::map_files;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let outcome = map_files(
//!         Path::new("orders.json"),
//!         Path::new("orders.spec.json"),
//!         &AgentOptions::from_env(),
//!         proposer_from_env(),
//!     )
//!     .await?;
//!
//!     println!("{}: {}", outcome.stop_reason, outcome.result.summary());
//!     Ok(())
//! }
//! ```

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::agent::{AgentOptions, AgentOutcome, MappingAgent, ProposalPort};
use crate::analysis::{analyze_with, AnalyzerOptions};
use crate::api::logs::{log_info, log_success, log_warning};
use crate::error::PipelineResult;
use crate::mapping::{execute, MappingSpecification};
use crate::models::{AnalysisResult, ExecutionResult};
use crate::validation::{drop_undeclared, validate};

/// Execute a specification, project onto its target schema, and validate.
///
/// Executor and validator issues are returned together, executor first.
/// Without a target schema the executor output is returned as is.
pub fn run_mapping(payload: &Value, spec: &MappingSpecification) -> ExecutionResult {
    let mut result = execute(payload, spec);

    if let Some(schema) = &spec.target_schema {
        drop_undeclared(&mut result, schema);
        let issues = validate(&result, schema);
        result.issues.extend(issues);
    }

    result
}

/// Check a caller-supplied specification, then run it once.
pub fn execute_checked(
    payload: &Value,
    spec: &MappingSpecification,
) -> PipelineResult<ExecutionResult> {
    spec.check()?;
    let result = run_mapping(payload, spec);
    log_result(&result);
    Ok(result)
}

/// Check a caller-supplied specification, then run it through the agent.
pub async fn map_payload(
    payload: &Value,
    spec: MappingSpecification,
    options: &AgentOptions,
    port: Arc<dyn ProposalPort>,
) -> PipelineResult<AgentOutcome> {
    spec.check()?;
    log_info(format!(
        "Mapping {} entries onto {} targets (agent {}, max {} iterations)",
        spec.mappings.len(),
        spec.target_fields().len(),
        if options.enabled { "on" } else { "off" },
        options.max_iterations
    ));

    let agent = MappingAgent::new(port, options.clone());
    let outcome = agent.run(payload, spec).await;
    log_result(&outcome.result);
    Ok(outcome)
}

/// Analyze a payload with logging
pub fn analyze_payload(payload: &Value, options: &AnalyzerOptions) -> AnalysisResult {
    let analysis = analyze_with(payload, options);
    log_info(format!(
        "Analyzed {} fields ({} warnings)",
        analysis.schema.len(),
        analysis.issues.len()
    ));
    analysis
}

/// Read a JSON payload from disk
pub fn load_json_file(path: &Path) -> PipelineResult<Value> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

/// Read and parse a mapping specification from disk
pub fn load_spec_file(path: &Path) -> PipelineResult<MappingSpecification> {
    let content = std::fs::read_to_string(path)?;
    Ok(MappingSpecification::from_json(&content)?)
}

/// Load a payload and a specification, then map with the agent.
pub async fn map_files(
    payload_path: &Path,
    spec_path: &Path,
    options: &AgentOptions,
    port: Arc<dyn ProposalPort>,
) -> PipelineResult<AgentOutcome> {
    log_info(format!("Reading payload {}", payload_path.display()));
    let payload = load_json_file(payload_path)?;
    log_info(format!("Reading specification {}", spec_path.display()));
    let spec = load_spec_file(spec_path)?;

    map_payload(&payload, spec, options, port).await
}

fn log_result(result: &ExecutionResult) {
    if result.error_count() == 0 {
        log_success(result.summary());
    } else {
        log_warning(result.summary());
    }
}
