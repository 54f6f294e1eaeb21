//! Error types for the Roaster mapping engine.
//!
//! This module defines a hierarchy of error types, one per layer:
//!
//! - [`SpecError`] - malformed mapping specifications (configuration errors)
//! - [`ProposalError`] - proposal service failures
//! - [`PipelineError`] - top-level orchestration errors (files, JSON, specs)
//! - [`ServerError`] - HTTP layer errors
//!
//! Problems found in payload data are never errors: they are recorded as
//! [`crate::models::Issue`]s. Proposal failures never leave the agent either;
//! they become a [`crate::agent::StopReason`].

use thiserror::Error;

// =============================================================================
// Specification Errors
// =============================================================================

/// A mapping specification that cannot be executed.
#[derive(Debug, Error)]
pub enum SpecError {
    /// The `mappings` list is empty.
    #[error("Mapping specification has no mappings")]
    EmptyMappings,

    /// A `transform` tag that the registry does not know.
    #[error("Unknown transform: {0}")]
    UnknownTransform(String),

    /// An entry whose `source` is empty.
    #[error("Mapping for '{target}' has an empty source")]
    EmptySource { target: String },

    /// A source path that cannot be parsed.
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    /// A target name that is not a legal field identifier.
    #[error("Illegal target field: '{0}'")]
    IllegalTarget(String),

    /// A target schema declaration with an unknown type.
    #[error("Unknown type '{tag}' declared for field '{field}'")]
    UnknownFieldType { field: String, tag: String },

    /// Targets outside the declared target schema.
    #[error("Targets not declared in target schema: {}", .0.join(", "))]
    UnknownTargets(Vec<String>),

    /// The specification is not valid JSON for its shape.
    #[error("Invalid mapping specification: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Proposal Service Errors
// =============================================================================

/// Failures of the external proposal service.
#[derive(Debug, Error)]
pub enum ProposalError {
    /// No proposal service is configured.
    #[error("No proposal service configured")]
    NotConfigured,

    /// Missing API key.
    #[error("Missing ANTHROPIC_API_KEY environment variable")]
    MissingApiKey,

    /// HTTP request failed before a response arrived.
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    /// The service answered with a non-success status.
    #[error("API error: {0}")]
    ApiError(String),

    /// The call exceeded its deadline.
    #[error("Request timed out")]
    Timeout,

    /// The response envelope could not be decoded.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProposalError {
    /// Whether the service should be considered unreachable for this call.
    ///
    /// Undecodable envelopes are the only failures that count as a reply.
    pub fn is_unreachable(&self) -> bool {
        !matches!(self, ProposalError::InvalidResponse(_))
    }
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level errors for file-based and programmatic entry points.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Specification error.
    #[error("Specification error: {0}")]
    Spec(#[from] SpecError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error in a payload file.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Specification error.
    #[error("Specification error: {0}")]
    Spec(#[from] SpecError),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for specification parsing.
pub type SpecResult<T> = Result<T, SpecError>;

/// Result type for proposal service calls.
pub type ProposalResult<T> = Result<T, ProposalError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let spec_err = SpecError::UnknownTransform("currency".into());
        let pipeline_err: PipelineError = spec_err.into();
        assert!(pipeline_err.to_string().contains("currency"));

        let spec_err = SpecError::EmptyMappings;
        let server_err: ServerError = spec_err.into();
        assert!(server_err.to_string().contains("no mappings"));
    }

    #[test]
    fn test_unknown_targets_format() {
        let err = SpecError::UnknownTargets(vec!["extra".into(), "bogus".into()]);
        assert_eq!(
            err.to_string(),
            "Targets not declared in target schema: extra, bogus"
        );
    }

    #[test]
    fn test_unreachable_classification() {
        assert!(ProposalError::Timeout.is_unreachable());
        assert!(ProposalError::NotConfigured.is_unreachable());
        assert!(ProposalError::ApiError("HTTP 500".into()).is_unreachable());
        assert!(!ProposalError::InvalidResponse("no content".into()).is_unreachable());
    }
}
