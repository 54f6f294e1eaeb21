//! Prompt generation for mapping repair
//!
//! Builds the messages sent to the model: the current specification, the
//! target schema, a payload sample, and the issues to fix.

use serde_json::{json, Value};

use super::proposal::ProposalRequest;
use crate::analysis::fingerprint;
use crate::mapping::transforms_description;

/// Generate the system prompt for mapping repair
pub fn system_prompt() -> String {
    format!(
        r#"You are a data integration expert. Your task is to repair a JSON mapping specification so that it converts partner payloads into a fixed target schema without issues.

## Mapping Specification Format

```json
{{
  "mappings": [
    {{ "source": "customer.name", "target": "customer_name" }},
    {{ "source": ["total", "amount.value"], "target": "order_total", "transform": "number", "required": true }},
    {{ "source": "status", "target": "status", "default": "new", "match": {{ "type": "order" }} }}
  ],
  "defaults": {{ "channel": "api" }}
}}
```

- `source`: a dotted path into one payload record, or a list of paths (the first one that exists wins)
- Paths step into lists automatically: `lines.sku` collects `sku` from every element of `lines`
- `target`: a field of the target schema
- `transform`: optional type conversion (see below)
- `required`: the field must be produced for every record
- `default`: value used when the source is missing
- `match`: only apply the entry when every listed path equals the given value
- `defaults`: values every record starts with

## Transforms

{transforms}

## Rules

1. Use ONLY source paths that exist in the payload sample
2. Do not invent fields that are not in the target schema
3. Use a transform whenever the sample value type differs from the declared target type
4. Keep entries that already work unchanged
5. Return ONLY the JSON object, no explanations or markdown"#,
        transforms = transforms_description()
    )
}

/// Generate the user prompt for one repair attempt
pub fn user_prompt(request: &ProposalRequest) -> String {
    let spec_json = serde_json::to_string_pretty(&request.current_spec).unwrap_or_default();
    let schema_json = request
        .target_schema
        .as_ref()
        .and_then(|s| serde_json::to_string_pretty(s).ok())
        .unwrap_or_else(|| "(none declared: keep the current targets)".to_string());
    let sample_json = serde_json::to_string_pretty(&request.sample).unwrap_or_default();
    let structure = fingerprint(&Value::Array(request.sample.clone()), Some(10));
    let structure_json = serde_json::to_string_pretty(&structure).unwrap_or_default();

    let issues = if request.issues.is_empty() {
        "(none)".to_string()
    } else {
        request
            .issues
            .iter()
            .map(|issue| {
                let scope = issue
                    .record
                    .map(|r| format!(" (record {})", r))
                    .unwrap_or_default();
                let level = if issue.is_error() { "error" } else { "warning" };
                format!("- [{}] **{}**{}: {}", level, issue.field, scope, issue.message)
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"## Current Mapping Specification

```json
{spec_json}
```

## Target Schema (field -> type, `?` means optional)

```json
{schema_json}
```

## Payload Sample ({count} records)

```json
{sample_json}
```

## Payload Structure (path -> type)

```json
{structure_json}
```

## Issues To Fix

{issues}

## Task

Return a revised mapping specification that resolves these issues.
Return ONLY the JSON object. No explanations."#,
        count = request.sample.len()
    )
}

/// Build the message list for the messages API
pub fn build_messages(request: &ProposalRequest) -> Vec<Value> {
    vec![json!({
        "role": "user",
        "content": user_prompt(request)
    })]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::example_spec;
    use crate::models::Issue;

    #[test]
    fn test_system_prompt_lists_transforms() {
        let prompt = system_prompt();
        assert!(prompt.contains("| integer |"));
        assert!(prompt.contains("| date |"));
        assert!(prompt.contains("Do not invent fields"));
    }

    #[test]
    fn test_user_prompt_includes_context() {
        let spec = example_spec();
        let request = ProposalRequest {
            target_schema: spec.target_schema.clone(),
            current_spec: spec,
            sample: vec![json!({"order_id": 7, "grand_total": "19.90"})],
            issues: vec![Issue::error("order_total", "missing required field").at_record(Some(0))],
        };

        let prompt = user_prompt(&request);
        assert!(prompt.contains("grand_total"));
        assert!(prompt.contains("\"order_total\": \"number\""));
        assert!(prompt.contains("- [error] **order_total** (record 0): missing required field"));
        assert!(prompt.contains("$[].order_id"));
        assert_eq!(build_messages(&request).len(), 1);
    }
}
