//! Proposal service port and reply parsing.
//!
//! The agent talks to a model through [`ProposalPort`], which has a single
//! method. [`NullProposer`] stands for "no model configured", so a missing
//! service is an ordinary outcome of the call.
//!
//! Replies are free text. [`parse_revision`] digs the first JSON object out
//! of it, tidies the usual model slips (`$.`-prefixed or `[]`-suffixed
//! targets, entries with no source), and parses the result as a
//! [`MappingSpecification`].

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{ProposalError, ProposalResult, SpecError};
use crate::mapping::{MappingSpecification, TargetSchema};
use crate::models::Issue;

/// Everything the proposal service sees
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalRequest {
    pub current_spec: MappingSpecification,
    pub target_schema: Option<TargetSchema>,
    /// A few payload records
    pub sample: Vec<Value>,
    pub issues: Vec<Issue>,
}

/// A service that proposes revised mapping specifications.
///
/// Implementations return the raw reply text. Transport failures are
/// reported as [`ProposalError`]s; the agent decides what they mean.
#[async_trait]
pub trait ProposalPort: Send + Sync {
    async fn propose(&self, request: &ProposalRequest) -> ProposalResult<String>;
}

/// No proposal service configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NullProposer;

#[async_trait]
impl ProposalPort for NullProposer {
    async fn propose(&self, _request: &ProposalRequest) -> ProposalResult<String> {
        Err(ProposalError::NotConfigured)
    }
}

/// Why a reply could not be turned into a specification
#[derive(Debug)]
pub enum Rejection {
    /// Blank reply
    Empty,
    /// No JSON object in the reply
    NoJson,
    /// JSON found but not a usable specification
    Invalid(SpecError),
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Empty => write!(f, "empty reply"),
            Rejection::NoJson => write!(f, "no JSON object in reply"),
            Rejection::Invalid(e) => write!(f, "{}", e),
        }
    }
}

/// Parse a reply into a revised specification.
///
/// The caller's target schema always replaces whatever schema the reply
/// carries.
///
/// # Returns
/// The revision plus the list of repairs applied to it
pub fn parse_revision(
    text: &str,
    target_schema: Option<&TargetSchema>,
) -> Result<(MappingSpecification, Vec<String>), Rejection> {
    if text.trim().is_empty() {
        return Err(Rejection::Empty);
    }

    let object = extract_json_object(text).ok_or(Rejection::NoJson)?;
    let mut object = unwrap_spec(object);
    object.remove("targetSchema");
    let repairs = normalize_proposal(&mut object);

    let mut spec =
        MappingSpecification::from_value(&Value::Object(object)).map_err(Rejection::Invalid)?;
    spec.target_schema = target_schema.cloned();
    Ok((spec, repairs))
}

/// Find the first JSON object in free text.
///
/// Accepts a bare object, an object inside a markdown code block, or an
/// object surrounded by prose.
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    let body = strip_code_fence(text).unwrap_or(text).trim();

    if body.starts_with('{') && body.ends_with('}') {
        if let Ok(Value::Object(map)) = serde_json::from_str(body) {
            return Some(map);
        }
    }

    let start = body.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in body[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let candidate = &body[start..start + offset + 1];
                    return match serde_json::from_str(candidate) {
                        Ok(Value::Object(map)) => Some(map),
                        _ => None,
                    };
                }
            }
            _ => {}
        }
    }

    None
}

/// Contents of the first ``` block, if any
fn strip_code_fence(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let content_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let content = &after[content_start..];
    let end = content.find("```")?;
    Some(&content[..end])
}

/// Accept `{"spec": {...}}`-style wrappers around the specification
fn unwrap_spec(object: Map<String, Value>) -> Map<String, Value> {
    if object.contains_key("mappings") {
        return object;
    }
    for key in ["mappingSpec", "spec", "mapping"] {
        if let Some(Value::Object(inner)) = object.get(key) {
            if inner.contains_key("mappings") {
                return inner.clone();
            }
        }
    }
    object
}

/// Repair common slips in model-written specs; returns what was changed.
pub fn normalize_proposal(spec: &mut Map<String, Value>) -> Vec<String> {
    let mut repairs = Vec::new();

    if let Some(Value::Array(entries)) = spec.get_mut("mappings") {
        entries.retain(|entry| {
            let keep = match entry.get("source") {
                None | Some(Value::Null) => false,
                Some(Value::String(s)) => !s.trim().is_empty(),
                Some(Value::Array(items)) => !items.is_empty(),
                Some(_) => true,
            };
            if !keep {
                let target = entry.get("target").and_then(Value::as_str).unwrap_or("?");
                repairs.push(format!("Dropped mapping for '{}' with no source", target));
            }
            keep
        });

        for entry in entries.iter_mut() {
            if let Some(Value::String(target)) = entry.get_mut("target") {
                let normalized = normalize_target(target.as_str());
                if normalized != *target {
                    repairs.push(format!("Normalized target '{}' -> '{}'", target, normalized));
                    *target = normalized;
                }
            }
        }
    }

    if spec.get("defaults").is_some_and(|d| !d.is_object()) {
        spec.remove("defaults");
        repairs.push("Removed defaults that were not an object".to_string());
    }

    if let Some(Value::Object(defaults)) = spec.get_mut("defaults") {
        let renamed: Vec<(String, String)> = defaults
            .keys()
            .map(|k| (k.clone(), normalize_target(k)))
            .filter(|(k, n)| k != n)
            .collect();
        for (old, new) in renamed {
            if let Some(value) = defaults.remove(&old) {
                repairs.push(format!("Normalized default '{}' -> '{}'", old, new));
                defaults.insert(new, value);
            }
        }
    }

    repairs
}

/// `$.items[].sku` -> `items.sku`
fn normalize_target(target: &str) -> String {
    let trimmed = target.trim();
    let stripped = trimmed
        .strip_prefix("$.")
        .or_else(|| trimmed.strip_prefix('$'))
        .unwrap_or(trimmed);
    stripped.replace("[*]", "").replace("[]", "")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{example_spec, FieldType};
    use serde_json::json;

    #[tokio::test]
    async fn test_null_proposer_is_not_configured() {
        let request = ProposalRequest {
            current_spec: example_spec(),
            target_schema: None,
            sample: vec![],
            issues: vec![],
        };
        let err = NullProposer.propose(&request).await.unwrap_err();
        assert!(matches!(err, ProposalError::NotConfigured));
        assert!(err.is_unreachable());
    }

    #[test]
    fn test_extract_from_code_block() {
        let reply = r#"Here is the fix:

```json
{"mappings": [{"source": "a", "target": "b"}]}
```

Done!"#;
        let object = extract_json_object(reply).unwrap();
        assert!(object.contains_key("mappings"));
    }

    #[test]
    fn test_extract_from_prose() {
        let reply = r#"Sure. {"mappings": [{"source": "a}", "target": "b"}], "defaults": {}} Hope that helps {x}"#;
        let object = extract_json_object(reply).unwrap();
        assert_eq!(object["mappings"][0]["source"], "a}");
    }

    #[test]
    fn test_extract_nothing() {
        assert!(extract_json_object("no json here").is_none());
        assert!(extract_json_object("{ broken").is_none());
        assert!(extract_json_object("[1, 2]").is_none());
    }

    #[test]
    fn test_parse_revision_repairs() {
        let schema = TargetSchema::new().with_field("sku", FieldType::String, true);
        let reply = json!({
            "targetSchema": {"anything": "string"},
            "mappings": [
                {"source": "$.lines[].sku", "target": "$.sku"},
                {"source": null, "target": "price"}
            ],
            "defaults": {"sku[]": "n/a"}
        })
        .to_string();

        let (spec, repairs) = parse_revision(&reply, Some(&schema)).unwrap();
        assert_eq!(spec.mappings.len(), 1);
        assert_eq!(spec.mappings[0].target, "sku");
        assert_eq!(spec.defaults["sku"], "n/a");
        assert_eq!(spec.target_schema, Some(schema));
        assert_eq!(repairs.len(), 3);
    }

    #[test]
    fn test_parse_revision_wrapped() {
        let reply = r#"{"spec": {"mappings": [{"source": "a", "target": "b"}]}}"#;
        let (spec, _) = parse_revision(reply, None).unwrap();
        assert_eq!(spec.mappings[0].target, "b");
    }

    #[test]
    fn test_parse_revision_rejections() {
        assert!(matches!(parse_revision("   ", None), Err(Rejection::Empty)));
        assert!(matches!(parse_revision("I cannot help", None), Err(Rejection::NoJson)));
        assert!(matches!(
            parse_revision(r#"{"mappings": []}"#, None),
            Err(Rejection::Invalid(SpecError::EmptyMappings))
        ));
        assert!(matches!(
            parse_revision(r#"{"mappings": [{"source": "a", "target": "b", "transform": "upper"}]}"#, None),
            Err(Rejection::Invalid(SpecError::UnknownTransform(_)))
        ));
    }
}
