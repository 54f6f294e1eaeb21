//! Mapping specification definition
//!
//! The specification is the declarative program run against a payload: an
//! ordered list of [`MappingEntry`] values projecting source paths onto
//! target fields, spec-level defaults, and an optional [`TargetSchema`].
//!
//! Specs arrive as loosely-typed JSON (from callers or from a model) and are
//! parsed once into the typed form here. Anything malformed is rejected with a
//! [`SpecError`] before execution begins.
//!
//! ```json
//! {
//!   "targetSchema": { "external_id": "string", "note": "string?" },
//!   "mappings": [
//!     { "source": "order_id", "target": "external_id", "transform": "string", "required": true },
//!     { "source": ["notes.public", "comment"], "target": "note" },
//!     { "source": "total", "target": "amount", "transform": "number", "match": { "currency": "EUR" } }
//!   ],
//!   "defaults": { "note": "" }
//! }
//! ```

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use super::path::{Resolved, SourcePath};
use super::transforms::TransformKind;
use crate::error::{SpecError, SpecResult};

static FIELD_IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_\-]*$").expect("identifier pattern is valid")
});

/// Whether `name` may be used as a target field.
pub fn is_legal_field(name: &str) -> bool {
    FIELD_IDENTIFIER.is_match(name)
}

// =============================================================================
// Specification
// =============================================================================

/// A complete, validated mapping specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMappingSpecification", into = "RawMappingSpecification")]
pub struct MappingSpecification {
    /// Declared output contract, used by validation and the agent
    pub target_schema: Option<TargetSchema>,

    /// Entries in declaration order; last write wins per target
    pub mappings: Vec<MappingEntry>,

    /// Values seeded into every record before entries run
    pub defaults: BTreeMap<String, Value>,
}

/// Where an entry reads its value from.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceSpec {
    /// A single path
    Single(SourcePath),
    /// Candidate paths; the first one that resolves wins
    Fallback(Vec<SourcePath>),
}

/// Entry-level condition: every path must resolve to the given value.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCondition {
    clauses: Vec<(SourcePath, Value)>,
}

/// Projection of one source onto one target field
#[derive(Debug, Clone, PartialEq)]
pub struct MappingEntry {
    pub target: String,
    pub source: SourceSpec,
    pub transform: Option<TransformKind>,
    pub required: bool,
    /// Used when the source is absent
    pub default: Option<Value>,
    /// Entry is skipped unless this holds
    pub condition: Option<MatchCondition>,
}

impl SourceSpec {
    /// Resolve against a payload element.
    pub fn resolve(&self, payload: &Value) -> Resolved {
        match self {
            SourceSpec::Single(path) => path.resolve(payload),
            SourceSpec::Fallback(paths) => paths
                .iter()
                .map(|p| p.resolve(payload))
                .find(|r| !r.is_absent())
                .unwrap_or(Resolved::Absent),
        }
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSpec::Single(path) => write!(f, "{}", path),
            SourceSpec::Fallback(paths) => {
                let joined: Vec<&str> = paths.iter().map(|p| p.as_str()).collect();
                write!(f, "[{}]", joined.join(" | "))
            }
        }
    }
}

impl MatchCondition {
    pub fn new(clauses: Vec<(SourcePath, Value)>) -> Self {
        Self { clauses }
    }

    /// True when every clause resolves to exactly its expected value.
    pub fn matches(&self, payload: &Value) -> bool {
        self.clauses.iter().all(|(path, expected)| {
            path.resolve(payload).into_value().as_ref() == Some(expected)
        })
    }
}

impl MappingEntry {
    /// Create an entry reading a single path
    pub fn from_path(target: &str, path: &str) -> SpecResult<Self> {
        Self::build(target, SourceSpec::Single(SourcePath::parse(path)?))
    }

    /// Create an entry with a first-match-wins list of paths
    pub fn from_paths(target: &str, paths: &[&str]) -> SpecResult<Self> {
        if paths.is_empty() {
            return Err(SpecError::EmptySource {
                target: target.to_string(),
            });
        }
        let parsed = paths
            .iter()
            .map(|p| SourcePath::parse(p))
            .collect::<SpecResult<Vec<_>>>()?;
        Self::build(target, SourceSpec::Fallback(parsed))
    }

    fn build(target: &str, source: SourceSpec) -> SpecResult<Self> {
        if !is_legal_field(target) {
            return Err(SpecError::IllegalTarget(target.to_string()));
        }
        Ok(Self {
            target: target.to_string(),
            source,
            transform: None,
            required: false,
            default: None,
            condition: None,
        })
    }

    pub fn with_transform(mut self, transform: TransformKind) -> Self {
        self.transform = Some(transform);
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    /// Mark as required
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_condition(mut self, condition: MatchCondition) -> Self {
        self.condition = Some(condition);
        self
    }
}

impl MappingSpecification {
    /// Build and check a specification from parts.
    pub fn new(
        mappings: Vec<MappingEntry>,
        defaults: BTreeMap<String, Value>,
        target_schema: Option<TargetSchema>,
    ) -> SpecResult<Self> {
        let spec = Self {
            target_schema,
            mappings,
            defaults,
        };
        spec.check()?;
        Ok(spec)
    }

    /// Parse a specification from a JSON string
    pub fn from_json(json: &str) -> SpecResult<Self> {
        let raw: RawMappingSpecification = serde_json::from_str(json)?;
        Self::try_from(raw)
    }

    /// Parse a specification from a JSON value
    pub fn from_value(value: &Value) -> SpecResult<Self> {
        let raw = RawMappingSpecification::deserialize(value)?;
        Self::try_from(raw)
    }

    /// Serialize to a pretty JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Serialize to a JSON value
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }

    /// Re-check invariants of a programmatically built specification.
    pub fn check(&self) -> SpecResult<()> {
        if self.mappings.is_empty() {
            return Err(SpecError::EmptyMappings);
        }
        for entry in &self.mappings {
            if !is_legal_field(&entry.target) {
                return Err(SpecError::IllegalTarget(entry.target.clone()));
            }
            if let SourceSpec::Fallback(paths) = &entry.source {
                if paths.is_empty() {
                    return Err(SpecError::EmptySource {
                        target: entry.target.clone(),
                    });
                }
            }
        }
        if let Some(bad) = self.defaults.keys().find(|k| !is_legal_field(k)) {
            return Err(SpecError::IllegalTarget(bad.clone()));
        }
        Ok(())
    }

    /// Target fields in first-declaration order
    pub fn target_fields(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.mappings
            .iter()
            .map(|m| m.target.as_str())
            .filter(|t| seen.insert(*t))
            .collect()
    }

    /// Targets marked required by at least one entry, in declaration order
    pub fn required_targets(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.mappings
            .iter()
            .filter(|m| m.required)
            .map(|m| m.target.as_str())
            .filter(|t| seen.insert(*t))
            .collect()
    }

    /// Targets written by entries or defaults that are not in `allowed`.
    pub fn unknown_targets(&self, allowed: &BTreeSet<String>) -> Vec<String> {
        let mut unknown: Vec<String> = self
            .mappings
            .iter()
            .map(|m| m.target.as_str())
            .chain(self.defaults.keys().map(|k| k.as_str()))
            .filter(|t| !allowed.contains(*t))
            .map(str::to_string)
            .collect();
        unknown.sort();
        unknown.dedup();
        unknown
    }

    /// Fields a revision of this spec may write to: the declared schema,
    /// or, without one, whatever this spec already writes.
    pub fn allowed_targets(&self) -> BTreeSet<String> {
        match &self.target_schema {
            Some(schema) => schema.field_names().map(str::to_string).collect(),
            None => self
                .mappings
                .iter()
                .map(|m| m.target.clone())
                .chain(self.defaults.keys().cloned())
                .collect(),
        }
    }
}

// =============================================================================
// Target Schema
// =============================================================================

/// Declared type of a target field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    /// `YYYY-MM-DD` string
    Date,
    Object,
    Array,
    Any,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Integer => "integer",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Object => "object",
            FieldType::Array => "array",
            FieldType::Any => "any",
        }
    }

    /// JSON Schema fragment checking a single value of this type.
    pub fn json_schema(&self) -> Value {
        match self {
            FieldType::Date => json!({ "type": "string", "pattern": r"^\d{4}-\d{2}-\d{2}$" }),
            FieldType::Any => json!({}),
            other => json!({ "type": other.as_str() }),
        }
    }
}

impl FromStr for FieldType {
    type Err = String;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "string" | "text" => Ok(FieldType::String),
            "number" | "float" => Ok(FieldType::Number),
            "integer" | "int" => Ok(FieldType::Integer),
            "boolean" | "bool" => Ok(FieldType::Boolean),
            "date" => Ok(FieldType::Date),
            "object" => Ok(FieldType::Object),
            "array" | "list" => Ok(FieldType::Array),
            "any" => Ok(FieldType::Any),
            _ => Err(tag.to_string()),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One declared target field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDecl {
    pub field_type: FieldType,
    pub required: bool,
}

/// Declared output contract: field name to type and optionality.
///
/// A bare type (`"number"`) is required; `"number?"` or
/// `{"type": "number", "required": false}` is optional.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "RawTargetSchema", into = "RawTargetSchema")]
pub struct TargetSchema {
    fields: BTreeMap<String, FieldDecl>,
}

impl TargetSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field declaration
    pub fn with_field(mut self, name: &str, field_type: FieldType, required: bool) -> Self {
        self.fields.insert(
            name.to_string(),
            FieldDecl {
                field_type,
                required,
            },
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<&FieldDecl> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDecl)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whole-record JSON Schema (draft 7) equivalent of this declaration.
    pub fn to_json_schema(&self) -> Value {
        let properties: serde_json::Map<String, Value> = self
            .fields
            .iter()
            .map(|(name, decl)| (name.clone(), decl.field_type.json_schema()))
            .collect();
        let required: Vec<&str> = self
            .fields
            .iter()
            .filter(|(_, decl)| decl.required)
            .map(|(name, _)| name.as_str())
            .collect();

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false
        })
    }
}

// =============================================================================
// Wire representation
// =============================================================================

/// Loosely-typed wire form of [`MappingSpecification`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMappingSpecification {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_schema: Option<RawTargetSchema>,

    #[serde(default)]
    pub mappings: Vec<RawMappingEntry>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defaults: Option<BTreeMap<String, Value>>,
}

/// Wire form of [`MappingEntry`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMappingEntry {
    #[serde(default)]
    pub source: Option<RawSource>,

    pub target: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<BTreeMap<String, Value>>,
}

/// A path or list of paths
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSource {
    One(String),
    Many(Vec<String>),
}

/// A field declaration: `"number"`, `"number?"` or `{"type": ..., "required": ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawFieldDecl {
    Tag(String),
    Detailed {
        #[serde(rename = "type")]
        field_type: String,
        #[serde(default)]
        required: Option<bool>,
        #[serde(default)]
        optional: Option<bool>,
    },
}

/// Wire form of [`TargetSchema`]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawTargetSchema(pub BTreeMap<String, RawFieldDecl>);

impl TryFrom<RawMappingSpecification> for MappingSpecification {
    type Error = SpecError;

    fn try_from(raw: RawMappingSpecification) -> Result<Self, Self::Error> {
        let mappings = raw
            .mappings
            .into_iter()
            .map(MappingEntry::try_from)
            .collect::<SpecResult<Vec<_>>>()?;

        let target_schema = raw.target_schema.map(TargetSchema::try_from).transpose()?;

        Self::new(mappings, raw.defaults.unwrap_or_default(), target_schema)
    }
}

impl TryFrom<RawMappingEntry> for MappingEntry {
    type Error = SpecError;

    fn try_from(raw: RawMappingEntry) -> Result<Self, Self::Error> {
        let target = raw.target.trim().to_string();
        let empty = || SpecError::EmptySource {
            target: target.clone(),
        };

        let mut entry = match raw.source {
            None => return Err(empty()),
            Some(RawSource::One(path)) if path.trim().is_empty() => return Err(empty()),
            Some(RawSource::One(path)) => MappingEntry::from_path(&target, &path)?,
            Some(RawSource::Many(paths)) => {
                if paths.is_empty() {
                    return Err(empty());
                }
                let refs: Vec<&str> = paths.iter().map(String::as_str).collect();
                MappingEntry::from_paths(&target, &refs)?
            }
        };

        if let Some(tag) = raw.transform.as_deref() {
            entry = entry.with_transform(TransformKind::from_str(tag)?);
        }
        if raw.required {
            entry = entry.required();
        }
        if let Some(default) = raw.default {
            entry = entry.with_default(default);
        }
        if let Some(clauses) = raw.condition {
            let parsed = clauses
                .into_iter()
                .map(|(path, expected)| Ok((SourcePath::parse(&path)?, expected)))
                .collect::<SpecResult<Vec<_>>>()?;
            entry = entry.with_condition(MatchCondition::new(parsed));
        }

        Ok(entry)
    }
}

impl From<MappingSpecification> for RawMappingSpecification {
    fn from(spec: MappingSpecification) -> Self {
        Self {
            target_schema: spec.target_schema.map(RawTargetSchema::from),
            mappings: spec.mappings.into_iter().map(RawMappingEntry::from).collect(),
            defaults: (!spec.defaults.is_empty()).then_some(spec.defaults),
        }
    }
}

impl From<MappingEntry> for RawMappingEntry {
    fn from(entry: MappingEntry) -> Self {
        let source = match entry.source {
            SourceSpec::Single(path) => RawSource::One(path.as_str().to_string()),
            SourceSpec::Fallback(paths) => {
                RawSource::Many(paths.iter().map(|p| p.as_str().to_string()).collect())
            }
        };
        Self {
            source: Some(source),
            target: entry.target,
            transform: entry.transform.map(|t| t.as_str().to_string()),
            required: entry.required,
            default: entry.default,
            condition: entry.condition.map(|c| {
                c.clauses
                    .into_iter()
                    .map(|(path, value)| (path.as_str().to_string(), value))
                    .collect()
            }),
        }
    }
}

impl TryFrom<RawTargetSchema> for TargetSchema {
    type Error = SpecError;

    fn try_from(raw: RawTargetSchema) -> Result<Self, Self::Error> {
        let mut fields = BTreeMap::new();
        for (name, decl) in raw.0 {
            if !is_legal_field(&name) {
                return Err(SpecError::IllegalTarget(name));
            }
            let (tag, required) = match decl {
                RawFieldDecl::Tag(tag) => match tag.trim().strip_suffix('?') {
                    Some(base) => (base.to_string(), false),
                    None => (tag, true),
                },
                RawFieldDecl::Detailed {
                    field_type,
                    required,
                    optional,
                } => {
                    let required = required.unwrap_or(!optional.unwrap_or(false));
                    (field_type, required)
                }
            };
            let field_type = FieldType::from_str(&tag).map_err(|tag| SpecError::UnknownFieldType {
                field: name.clone(),
                tag,
            })?;
            fields.insert(
                name,
                FieldDecl {
                    field_type,
                    required,
                },
            );
        }
        Ok(Self { fields })
    }
}

impl From<TargetSchema> for RawTargetSchema {
    fn from(schema: TargetSchema) -> Self {
        RawTargetSchema(
            schema
                .fields
                .into_iter()
                .map(|(name, decl)| {
                    let tag = if decl.required {
                        decl.field_type.as_str().to_string()
                    } else {
                        format!("{}?", decl.field_type.as_str())
                    };
                    (name, RawFieldDecl::Tag(tag))
                })
                .collect(),
        )
    }
}

/// The order-import specification used in documentation and the CLI
pub fn example_spec() -> MappingSpecification {
    let schema = TargetSchema::new()
        .with_field("external_id", FieldType::String, true)
        .with_field("customer_name", FieldType::String, true)
        .with_field("order_total", FieldType::Number, true);

    MappingSpecification {
        target_schema: Some(schema),
        mappings: vec![
            MappingEntry {
                target: "external_id".to_string(),
                source: SourceSpec::Single(SourcePath::from_keys(&["order_id"])),
                transform: Some(TransformKind::String),
                required: false,
                default: None,
                condition: None,
            },
            MappingEntry {
                target: "customer_name".to_string(),
                source: SourceSpec::Single(SourcePath::from_keys(&["customer", "name"])),
                transform: None,
                required: false,
                default: None,
                condition: None,
            },
        ],
        defaults: BTreeMap::new(),
    }
}
