//! Declarative JSON-to-JSON mapping
//!
//! This module provides:
//! - `path`: Source path parsing and resolution
//! - `spec`: Mapping specification definition (what callers and the model supply)
//! - `transforms`: Built-in type transforms
//! - `executor`: Execute specifications on payloads
//!
//! ## Usage Flow
//!
//! ```text
//! JSON payload → MappingSpecification::from_json → executor::execute → records + issues → validate
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use roaster::mapping::{execute, MappingSpecification};
//! use roaster::validation::validate;
//!
//! let spec = MappingSpecification::from_json(spec_json)?;
//! let result = execute(&payload, &spec);
//!
//! if let Some(schema) = &spec.target_schema {
//!     for issue in validate(&result, schema) {
//!         println!("{}: {}", issue.field, issue.message);
//!     }
//! }
//! ```

pub mod executor;
pub mod path;
pub mod spec;
pub mod transforms;

// Re-exports for convenience
pub use executor::{execute, kind_of};
pub use path::{resolve, Resolved, Segment, SourcePath};
pub use spec::{
    example_spec, is_legal_field, FieldDecl, FieldType, MappingEntry, MappingSpecification,
    MatchCondition, RawMappingEntry, RawMappingSpecification, RawSource, SourceSpec, TargetSchema,
};
pub use transforms::{transforms_description, TransformKind, TransformOutcome};
