//! Mapping Agent
//!
//! Supervises repeated executor + validator passes and asks a proposal
//! service for a revised specification between passes.
//!
//! ## States
//!
//! ```text
//!            ┌──────────── revision accepted ───────────┐
//!            ▼                                          │
//! RUNNING ── pass ──┬── no issues ──────────────▶ CONVERGED
//!                   ├── cancelled ──────────────▶ CANCELLED
//!                   ├── attempts used up ───────▶ MAX_ITERATIONS
//!                   └── propose ──┬── unreachable / timeout ──▶ NO_MODEL
//!                                 ├── empty / unparseable ────▶ EMPTY_RESPONSE
//!                                 ├── unknown targets ────────▶ next attempt (counted)
//!                                 └── not fewer issues ───────▶ NO_IMPROVEMENT
//! ```
//!
//! Every exit returns a result; proposal failures never reach the caller.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use roaster::agent::{proposer_from_env, AgentOptions, MappingAgent};
//!
//! let agent = MappingAgent::new(proposer_from_env(), AgentOptions::default());
//! let outcome = agent.run(&payload, spec).await;
//! println!("{} after {} iterations", outcome.stop_reason, outcome.iterations);
//! ```

pub mod client;
pub mod prompt;
pub mod proposal;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::api::logs::{log_event, log_info, log_warning, AgentEvent, LogLevel};
use crate::error::SpecError;
use crate::mapping::MappingSpecification;
use crate::models::{ExecutionResult, Issue};
use crate::pipeline::run_mapping;

pub use client::{proposer_from_env, AnthropicProposer};
pub use proposal::{parse_revision, NullProposer, ProposalPort, ProposalRequest, Rejection};

/// Agent run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StopReason {
    Running,
    Converged,
    NoModel,
    EmptyResponse,
    NoImprovement,
    MaxIterations,
    Cancelled,
}

impl StopReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Running => "RUNNING",
            StopReason::Converged => "CONVERGED",
            StopReason::NoModel => "NO_MODEL",
            StopReason::EmptyResponse => "EMPTY_RESPONSE",
            StopReason::NoImprovement => "NO_IMPROVEMENT",
            StopReason::MaxIterations => "MAX_ITERATIONS",
            StopReason::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Agent configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AgentOptions {
    /// When false, no proposal service is consulted
    pub enabled: bool,
    /// Upper bound on executor + validator passes
    pub max_iterations: usize,
    /// Deadline for one proposal call
    #[serde(rename = "proposalTimeoutSecs", deserialize_with = "deserialize_secs")]
    pub proposal_timeout: Duration,
    /// Payload records shown to the proposal service
    pub sample_rows: usize,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            max_iterations: 3,
            proposal_timeout: Duration::from_secs(30),
            sample_rows: 5,
        }
    }
}

impl AgentOptions {
    /// Defaults, with the proposal timeout read from
    /// `ROASTER_PROPOSAL_TIMEOUT_SECS` when set
    pub fn from_env() -> Self {
        let mut options = Self::default();
        if let Some(secs) = std::env::var("ROASTER_PROPOSAL_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
        {
            options.proposal_timeout = Duration::from_secs(secs);
        }
        options
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_proposal_timeout(mut self, timeout: Duration) -> Self {
        self.proposal_timeout = timeout;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

fn deserialize_secs<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let secs = f64::deserialize(deserializer)?;
    if !secs.is_finite() || secs < 0.0 {
        return Err(serde::de::Error::custom("timeout must be a non-negative number of seconds"));
    }
    Ok(Duration::from_secs_f64(secs))
}

/// Cooperative cancellation, checked between passes
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// State of one agent invocation; owned by that invocation only
#[derive(Debug, Clone)]
pub struct AgentRun {
    pub run_id: Uuid,
    /// Current (last accepted) specification
    pub spec: MappingSpecification,
    /// Passes and consumed attempts so far
    pub iteration: usize,
    /// Issues of every pass and rejected attempt
    pub issues_history: Vec<Vec<Issue>>,
    pub stop_reason: StopReason,
}

impl AgentRun {
    fn new(spec: MappingSpecification) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            spec,
            iteration: 0,
            issues_history: Vec::new(),
            stop_reason: StopReason::Running,
        }
    }

    /// Count a pass and log it
    fn record(&mut self, result: &ExecutionResult) {
        self.push_iteration(result.issues.clone());
    }

    /// Count a rejected revision as an attempt and log it
    fn record_rejection(&mut self, issues: Vec<Issue>) {
        self.push_iteration(issues);
    }

    fn push_iteration(&mut self, issues: Vec<Issue>) {
        self.iteration += 1;
        let issue_count = issues.len();
        let error_count = issues.iter().filter(|i| i.is_error()).count();
        self.issues_history.push(issues);
        log_event(
            LogLevel::Info,
            format!(
                "Iteration {}: {} issues ({} errors)",
                self.iteration, issue_count, error_count
            ),
            AgentEvent::Iteration {
                run_id: self.run_id,
                iteration: self.iteration,
                issue_count,
            },
        );
    }
}

/// What an agent run hands back
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentOutcome {
    pub run_id: Uuid,
    pub result: ExecutionResult,
    pub spec: MappingSpecification,
    pub stop_reason: StopReason,
    pub iterations: usize,
    /// Issue count of each iteration, in order
    pub issue_counts: Vec<usize>,
}

/// Iterative mapping repair
pub struct MappingAgent {
    port: Arc<dyn ProposalPort>,
    options: AgentOptions,
}

impl MappingAgent {
    /// Create an agent; a disabled agent never calls `port`.
    pub fn new(port: Arc<dyn ProposalPort>, options: AgentOptions) -> Self {
        let port: Arc<dyn ProposalPort> = if options.enabled {
            port
        } else {
            Arc::new(NullProposer)
        };
        Self { port, options }
    }

    /// Run to a terminal state
    pub async fn run(&self, payload: &Value, spec: MappingSpecification) -> AgentOutcome {
        self.run_with_cancel(payload, spec, &CancelFlag::new()).await
    }

    /// Run to a terminal state, stopping early once `cancel` is set
    pub async fn run_with_cancel(
        &self,
        payload: &Value,
        spec: MappingSpecification,
        cancel: &CancelFlag,
    ) -> AgentOutcome {
        let max_iterations = self.options.max_iterations.max(1);
        let mut run = AgentRun::new(spec);
        let schema = run.spec.target_schema.clone();
        let allowed: BTreeSet<String> = run.spec.allowed_targets();
        let sample = sample_records(payload, self.options.sample_rows);

        let mut current = run_mapping(payload, &run.spec);
        run.record(&current);
        let mut rejection: Option<Issue> = None;

        let stop = loop {
            if current.issues.is_empty() {
                break StopReason::Converged;
            }
            if cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            if run.iteration >= max_iterations {
                break StopReason::MaxIterations;
            }

            let mut issues = current.issues.clone();
            issues.extend(rejection.take());
            let request = ProposalRequest {
                current_spec: run.spec.clone(),
                target_schema: schema.clone(),
                sample: sample.clone(),
                issues,
            };

            let reply = tokio::time::timeout(
                self.options.proposal_timeout,
                self.port.propose(&request),
            )
            .await;

            let text = match reply {
                Err(_) => {
                    log_warning(format!(
                        "Proposal service timed out after {:?}",
                        self.options.proposal_timeout
                    ));
                    break StopReason::NoModel;
                }
                Ok(Err(e)) if e.is_unreachable() => {
                    log_warning(format!("Proposal service unavailable: {}", e));
                    break StopReason::NoModel;
                }
                Ok(Err(e)) => {
                    log_warning(format!("Proposal service reply unusable: {}", e));
                    break StopReason::EmptyResponse;
                }
                Ok(Ok(text)) => text,
            };

            let revision = match parse_revision(&text, schema.as_ref()) {
                Ok((revision, repairs)) => {
                    for repair in repairs {
                        log_info(repair);
                    }
                    revision
                }
                Err(rejected) => {
                    log_warning(format!("Proposal rejected: {}", rejected));
                    break StopReason::EmptyResponse;
                }
            };

            let unknown = revision.unknown_targets(&allowed);
            if !unknown.is_empty() {
                let error = SpecError::UnknownTargets(unknown);
                log_warning(format!("Proposal rejected: {}", error));
                let issue = Issue::error("mappings", format!("Previous proposal rejected: {}", error));
                let mut attempted = current.issues.clone();
                attempted.push(issue.clone());
                run.record_rejection(attempted);
                if run.iteration >= max_iterations {
                    break StopReason::EmptyResponse;
                }
                rejection = Some(issue);
                continue;
            }

            let candidate = run_mapping(payload, &revision);
            run.record(&candidate);
            if candidate.issues.len() >= current.issues.len() {
                break StopReason::NoImprovement;
            }

            run.spec = revision;
            current = candidate;
        };

        run.stop_reason = stop;
        let level = match stop {
            StopReason::Converged => LogLevel::Success,
            _ => LogLevel::Warning,
        };
        log_event(
            level,
            format!("Agent stopped: {} after {} iterations", stop, run.iteration),
            AgentEvent::Finished {
                run_id: run.run_id,
                stop_reason: stop,
                total_iterations: run.iteration,
            },
        );

        AgentOutcome {
            run_id: run.run_id,
            issue_counts: run.issues_history.iter().map(Vec::len).collect(),
            result: current,
            spec: run.spec,
            stop_reason: stop,
            iterations: run.iteration,
        }
    }
}

/// First `limit` object records of a payload
pub fn sample_records(payload: &Value, limit: usize) -> Vec<Value> {
    match payload {
        Value::Array(items) => items
            .iter()
            .filter(|item| item.is_object())
            .take(limit)
            .cloned()
            .collect(),
        Value::Object(_) => vec![payload.clone()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::logs::LOG_BROADCASTER;
    use crate::error::{ProposalError, ProposalResult};
    use crate::mapping::example_spec;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::broadcast;

    /// Replies from a script and records every request
    #[derive(Default)]
    struct ScriptedProposer {
        replies: Mutex<VecDeque<ProposalResult<String>>>,
        requests: Mutex<Vec<ProposalRequest>>,
    }

    impl ScriptedProposer {
        fn new(replies: Vec<ProposalResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ProposalPort for ScriptedProposer {
        async fn propose(&self, request: &ProposalRequest) -> ProposalResult<String> {
            self.requests.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProposalError::ApiError("script exhausted".into())))
        }
    }

    struct SlowProposer;

    #[async_trait]
    impl ProposalPort for SlowProposer {
        async fn propose(&self, _request: &ProposalRequest) -> ProposalResult<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(String::new())
        }
    }

    fn order_payload() -> Value {
        json!({"order_id": 7, "customer": {"name": "Ana"}, "grand_total": "19.90"})
    }

    fn fixed_reply(total_source: &str) -> ProposalResult<String> {
        Ok(json!({
            "mappings": [
                {"source": "order_id", "target": "external_id", "transform": "string"},
                {"source": "customer.name", "target": "customer_name"},
                {"source": total_source, "target": "order_total", "transform": "number"}
            ]
        })
        .to_string())
    }

    fn agent(port: Arc<dyn ProposalPort>, max_iterations: usize) -> MappingAgent {
        MappingAgent::new(
            port,
            AgentOptions::default().with_max_iterations(max_iterations),
        )
    }

    #[tokio::test]
    async fn test_converges_on_first_pass() {
        let port = ScriptedProposer::new(vec![]);
        let spec = MappingSpecification::from_value(&json!({
            "targetSchema": {"external_id": "string", "customer_name": "string", "order_total": "number"},
            "mappings": [
                {"source": "order_id", "target": "external_id", "transform": "string"},
                {"source": "customer.name", "target": "customer_name"},
                {"source": "grand_total", "target": "order_total", "transform": "number"}
            ]
        }))
        .unwrap();

        let outcome = agent(port.clone(), 3).run(&order_payload(), spec).await;

        assert_eq!(outcome.stop_reason, StopReason::Converged);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.issue_counts, vec![0]);
        assert_eq!(port.calls(), 0);
    }

    #[tokio::test]
    async fn test_no_model_returns_deterministic_result() {
        let payload = json!({"order_id": 7, "customer": {"name": "Ana"}});
        let direct = run_mapping(&payload, &example_spec());

        let outcome = agent(Arc::new(NullProposer), 3)
            .run(&payload, example_spec())
            .await;

        assert_eq!(outcome.stop_reason, StopReason::NoModel);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.result, direct);
        assert_eq!(outcome.spec, example_spec());
        assert_eq!(
            outcome.result.issues,
            vec![Issue::error("order_total", "missing required field")]
        );
    }

    #[tokio::test]
    async fn test_max_iterations_of_one() {
        let port = ScriptedProposer::new(vec![fixed_reply("grand_total")]);
        let outcome = agent(port.clone(), 1)
            .run(&order_payload(), example_spec())
            .await;

        assert_eq!(outcome.stop_reason, StopReason::MaxIterations);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(port.calls(), 0);
        assert_eq!(outcome.result.issues.len(), 1);
    }

    #[tokio::test]
    async fn test_accepted_revision_converges() {
        let port = ScriptedProposer::new(vec![fixed_reply("grand_total")]);
        let outcome = agent(port.clone(), 3)
            .run(&order_payload(), example_spec())
            .await;

        assert_eq!(outcome.stop_reason, StopReason::Converged);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.issue_counts, vec![1, 0]);
        assert_eq!(outcome.result.records[0]["order_total"], 19.9);
        assert_eq!(outcome.spec.mappings.len(), 3);
        assert_eq!(outcome.spec.target_schema, example_spec().target_schema);

        let requests = port.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].issues[0].field, "order_total");
        assert_eq!(requests[0].sample, vec![order_payload()]);
    }

    #[tokio::test]
    async fn test_runs_out_of_iterations_while_improving() {
        let payload = json!({"a": "x", "b": "y"});
        let spec = MappingSpecification::from_value(&json!({
            "targetSchema": {"a": "integer", "b": "integer"},
            "mappings": [
                {"source": "a", "target": "a", "transform": "integer"},
                {"source": "b", "target": "b", "transform": "integer"}
            ]
        }))
        .unwrap();
        let better = json!({
            "mappings": [
                {"source": "a", "target": "a", "transform": "integer"},
                {"source": "missing", "target": "b", "default": 0}
            ]
        })
        .to_string();
        let port = ScriptedProposer::new(vec![Ok(better)]);

        let outcome = agent(port, 2).run(&payload, spec).await;

        assert_eq!(outcome.stop_reason, StopReason::MaxIterations);
        assert_eq!(outcome.iterations, 2);
        assert!(outcome.issue_counts[1] < outcome.issue_counts[0]);
        assert_eq!(outcome.result.records[0]["b"], 0);
    }

    #[tokio::test]
    async fn test_empty_and_unparseable_replies() {
        for reply in ["", "   ", "I could not find a better mapping."] {
            let port = ScriptedProposer::new(vec![Ok(reply.to_string())]);
            let outcome = agent(port, 3).run(&order_payload(), example_spec()).await;
            assert_eq!(outcome.stop_reason, StopReason::EmptyResponse);
            assert_eq!(outcome.iterations, 1);
            assert_eq!(outcome.spec, example_spec());
        }

        let port = ScriptedProposer::new(vec![Err(ProposalError::InvalidResponse("bad".into()))]);
        let outcome = agent(port, 3).run(&order_payload(), example_spec()).await;
        assert_eq!(outcome.stop_reason, StopReason::EmptyResponse);

        let port = ScriptedProposer::new(vec![Ok(r#"{"mappings": []}"#.to_string())]);
        let outcome = agent(port, 3).run(&order_payload(), example_spec()).await;
        assert_eq!(outcome.stop_reason, StopReason::EmptyResponse);
    }

    #[tokio::test]
    async fn test_service_errors_mean_no_model() {
        let port = ScriptedProposer::new(vec![Err(ProposalError::ApiError("HTTP 529".into()))]);
        let outcome = agent(port, 3).run(&order_payload(), example_spec()).await;
        assert_eq!(outcome.stop_reason, StopReason::NoModel);
    }

    #[tokio::test]
    async fn test_timeout_means_no_model() {
        let agent = MappingAgent::new(
            Arc::new(SlowProposer),
            AgentOptions::default().with_proposal_timeout(Duration::from_millis(20)),
        );
        let outcome = agent.run(&order_payload(), example_spec()).await;
        assert_eq!(outcome.stop_reason, StopReason::NoModel);
        assert_eq!(outcome.iterations, 1);
    }

    #[tokio::test]
    async fn test_no_improvement_keeps_earlier_result() {
        let port = ScriptedProposer::new(vec![fixed_reply("total")]);
        let outcome = agent(port, 3).run(&order_payload(), example_spec()).await;

        assert_eq!(outcome.stop_reason, StopReason::NoImprovement);
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.issue_counts, vec![1, 1]);
        assert_eq!(outcome.spec, example_spec());
        assert!(!outcome.result.records[0].contains_key("order_total"));
    }

    #[tokio::test]
    async fn test_unknown_targets_consume_an_attempt() {
        let invented = json!({
            "mappings": [{"source": "grand_total", "target": "bogus", "transform": "number"}]
        })
        .to_string();
        let port = ScriptedProposer::new(vec![Ok(invented), fixed_reply("grand_total")]);

        let outcome = agent(port.clone(), 3)
            .run(&order_payload(), example_spec())
            .await;

        assert_eq!(outcome.stop_reason, StopReason::Converged);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.issue_counts, vec![1, 2, 0]);

        let requests = port.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        let rejection = requests[1].issues.last().unwrap();
        assert_eq!(rejection.field, "mappings");
        assert!(rejection.message.contains("bogus"));
    }

    #[tokio::test]
    async fn test_every_iteration_is_logged() {
        let mut rx = LOG_BROADCASTER.subscribe();
        let invented = json!({"mappings": [{"source": "x", "target": "bogus"}]}).to_string();
        let port = ScriptedProposer::new(vec![Ok(invented), fixed_reply("grand_total")]);

        let outcome = agent(port, 3).run(&order_payload(), example_spec()).await;

        let mut iterations = Vec::new();
        let mut finished = None;
        loop {
            match rx.try_recv() {
                Ok(entry) => match entry.event {
                    Some(AgentEvent::Iteration {
                        run_id,
                        iteration,
                        issue_count,
                    }) if run_id == outcome.run_id => iterations.push((iteration, issue_count)),
                    Some(AgentEvent::Finished {
                        run_id,
                        stop_reason,
                        total_iterations,
                    }) if run_id == outcome.run_id => finished = Some((stop_reason, total_iterations)),
                    _ => {}
                },
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }

        assert_eq!(iterations, vec![(1, 1), (2, 2), (3, 0)]);
        assert_eq!(finished, Some((StopReason::Converged, 3)));
    }

    #[tokio::test]
    async fn test_unknown_targets_exhaust_attempts() {
        let invented = json!({"mappings": [{"source": "x", "target": "bogus"}]}).to_string();
        let port = ScriptedProposer::new(vec![Ok(invented)]);

        let outcome = agent(port, 2).run(&order_payload(), example_spec()).await;

        assert_eq!(outcome.stop_reason, StopReason::EmptyResponse);
        assert_eq!(outcome.spec, example_spec());
    }

    #[tokio::test]
    async fn test_cancelled_before_repair() {
        let port = ScriptedProposer::new(vec![fixed_reply("grand_total")]);
        let cancel = CancelFlag::new();
        cancel.cancel();

        let outcome = agent(port.clone(), 3)
            .run_with_cancel(&order_payload(), example_spec(), &cancel)
            .await;

        assert_eq!(outcome.stop_reason, StopReason::Cancelled);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(outcome.result.records.len(), 1);
        assert_eq!(port.calls(), 0);
    }

    #[tokio::test]
    async fn test_finished_work_is_converged_even_when_cancelled() {
        let port = ScriptedProposer::new(vec![]);
        let spec = MappingSpecification::from_value(&json!({
            "targetSchema": {"external_id": "string"},
            "mappings": [{"source": "order_id", "target": "external_id", "transform": "string"}]
        }))
        .unwrap();
        let cancel = CancelFlag::new();
        cancel.cancel();

        let outcome = agent(port.clone(), 3)
            .run_with_cancel(&order_payload(), spec, &cancel)
            .await;

        assert_eq!(outcome.stop_reason, StopReason::Converged);
        assert_eq!(outcome.iterations, 1);
        assert_eq!(port.calls(), 0);
    }

    #[tokio::test]
    async fn test_disabled_agent_never_calls_port() {
        let port = ScriptedProposer::new(vec![fixed_reply("grand_total")]);
        let agent = MappingAgent::new(port.clone(), AgentOptions::default().disabled());

        let outcome = agent.run(&order_payload(), example_spec()).await;

        assert_eq!(outcome.stop_reason, StopReason::NoModel);
        assert_eq!(port.calls(), 0);
    }

    #[tokio::test]
    async fn test_undeclared_fields_never_returned() {
        let spec = MappingSpecification::from_value(&json!({
            "targetSchema": {"id": "string"},
            "mappings": [
                {"source": "order_id", "target": "id", "transform": "string"},
                {"source": "order_id", "target": "extra"}
            ]
        }))
        .unwrap();

        let outcome = agent(Arc::new(NullProposer), 3)
            .run(&json!([{"order_id": 1}, {"order_id": 2}]), spec)
            .await;

        assert_eq!(outcome.stop_reason, StopReason::Converged);
        assert!(outcome.result.records.iter().all(|r| !r.contains_key("extra")));
    }

    #[test]
    fn test_options_deserialize() {
        let options: AgentOptions =
            serde_json::from_value(json!({"enabled": false, "maxIterations": 5, "proposalTimeoutSecs": 1.5}))
                .unwrap();
        assert!(!options.enabled);
        assert_eq!(options.max_iterations, 5);
        assert_eq!(options.proposal_timeout, Duration::from_millis(1500));
        assert_eq!(options.sample_rows, 5);

        let defaults: AgentOptions = serde_json::from_value(json!({})).unwrap();
        assert!(defaults.enabled);
        assert_eq!(defaults.max_iterations, 3);
    }

    #[test]
    fn test_stop_reason_wire_names() {
        assert_eq!(serde_json::to_value(StopReason::NoImprovement).unwrap(), "NO_IMPROVEMENT");
        assert_eq!(StopReason::MaxIterations.to_string(), "MAX_ITERATIONS");
        assert_eq!(serde_json::to_value(StopReason::Cancelled).unwrap(), "CANCELLED");
    }

    #[test]
    fn test_sample_records() {
        let payload = json!([1, {"a": 1}, {"a": 2}, {"a": 3}]);
        assert_eq!(sample_records(&payload, 2), vec![json!({"a": 1}), json!({"a": 2})]);
        assert_eq!(sample_records(&json!({"a": 1}), 2).len(), 1);
        assert!(sample_records(&json!("x"), 2).is_empty());
    }
}
