//! # Roaster - Mapping and repair engine for partner JSON payloads
//!
//! Roaster converts schema-less JSON payloads received from partners into
//! records of a fixed target schema, driven by a declarative mapping
//! specification. When a mapping produces issues, an optional agent asks a
//! language model for a revised specification and keeps it only if it does
//! strictly better.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Payload   │────▶│  Analyzer   │     │  Executor   │────▶│  Validator  │
//! │   (JSON)    │────▶│ (structure) │     │ (spec+path) │     │  (schema)   │
//! └─────────────┘     └─────────────┘     └──────▲──────┘     └──────┬──────┘
//!                                                │   revised spec    │ issues
//!                                         ┌──────┴──────┐            │
//!                                         │    Agent    │◀───────────┘
//!                                         │ (LLM repair)│
//!                                         └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use roaster::{example_spec, run_mapping};
//! use serde_json::json;
//!
//! let result = run_mapping(&json!({"order_id": 7, "customer": {"name": "Ana"}}), &example_spec());
//! println!("{}", result.summary());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Records, issues and results
//! - [`mapping`] - Paths, specifications, transforms and execution
//! - [`analysis`] - Payload structure inference
//! - [`validation`] - Target schema validation
//! - [`agent`] - Iterative mapping repair
//! - [`pipeline`] - File and payload entry points
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Mapping
pub mod mapping;

// Analysis
pub mod analysis;

// Validation
pub mod validation;

// Agent
pub mod agent;

// Entry points
pub mod pipeline;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    PipelineError, PipelineResult, ProposalError, ProposalResult, ServerError, SpecError,
    SpecResult,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{AnalysisResult, ExecutionResult, Issue, IssueLevel, Record};

// =============================================================================
// Re-exports - Mapping
// =============================================================================

pub use mapping::{
    example_spec, execute, transforms_description, FieldType, MappingEntry,
    MappingSpecification, SourcePath, SourceSpec, TargetSchema, TransformKind,
};

// =============================================================================
// Re-exports - Analysis
// =============================================================================

pub use analysis::{analyze, analyze_with, fingerprint, AnalyzerOptions};

// =============================================================================
// Re-exports - Validation
// =============================================================================

pub use validation::{drop_undeclared, record_violations, validate, TypeCheck};

// =============================================================================
// Re-exports - Agent
// =============================================================================

pub use agent::{
    proposer_from_env, AgentOptions, AgentOutcome, AnthropicProposer, CancelFlag, MappingAgent,
    NullProposer, ProposalPort, ProposalRequest, StopReason,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use pipeline::{
    analyze_payload, execute_checked, load_json_file, load_spec_file, map_files, map_payload,
    run_mapping,
};

// =============================================================================
// Re-exports - Server
// =============================================================================

pub use api::server;
