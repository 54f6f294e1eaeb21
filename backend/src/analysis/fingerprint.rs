//! Structural fingerprint of a JSON payload.
//!
//! Every leaf path is reported with its type, using `[]` for list levels:
//!
//! ```text
//! {"id": 1, "lines": [{"sku": "A"}], "tags": []}
//!
//! $.id            number
//! $.lines[]       array<object>
//! $.lines[].sku   string
//! $.tags[]        array (empty)
//! ```
//!
//! Two payloads with the same fingerprint can share a mapping specification.

use serde_json::Value;
use std::collections::BTreeMap;

/// Fingerprint a payload.
///
/// `max_items_per_array` caps how many elements of each list are inspected;
/// `None` inspects them all.
pub fn fingerprint(payload: &Value, max_items_per_array: Option<usize>) -> BTreeMap<String, String> {
    let mut schema = BTreeMap::new();
    walk(payload, "$".to_string(), max_items_per_array, &mut schema);
    schema
}

fn walk(value: &Value, prefix: String, cap: Option<usize>, out: &mut BTreeMap<String, String>) {
    match value {
        Value::Object(map) if map.is_empty() => {
            out.insert(prefix, "object (empty)".to_string());
        }
        Value::Object(map) => {
            for (key, child) in map {
                walk(child, format!("{}.{}", prefix, key), cap, out);
            }
        }
        Value::Array(items) => {
            let array_prefix = format!("{}[]", prefix);
            if items.is_empty() {
                out.insert(array_prefix, "array (empty)".to_string());
                return;
            }

            let limit = cap.unwrap_or(items.len()).max(1);
            let mut primitive: Option<&'static str> = None;
            let mut container: Option<&'static str> = None;

            for item in items.iter().take(limit) {
                match item {
                    Value::Null => {}
                    Value::Object(_) => {
                        container.get_or_insert("object");
                        walk(item, array_prefix.clone(), cap, out);
                    }
                    Value::Array(_) => {
                        container.get_or_insert("array");
                        walk(item, array_prefix.clone(), cap, out);
                    }
                    scalar => {
                        primitive.get_or_insert(primitive_name(scalar));
                    }
                }
            }

            let element = primitive.or(container).unwrap_or("null");
            out.insert(array_prefix, format!("array<{}>", element));
        }
        scalar => {
            out.insert(prefix, primitive_name(scalar).to_string());
        }
    }
}

fn primitive_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fingerprint_nested() {
        let payload = json!({
            "id": 1,
            "customer": {"name": "Ana", "vip": true},
            "lines": [{"sku": "A", "qty": 2}, {"sku": "B", "note": null}],
            "tags": ["x", "y"],
            "empty": [],
            "meta": {}
        });
        let fp = fingerprint(&payload, None);

        assert_eq!(fp["$.id"], "number");
        assert_eq!(fp["$.customer.name"], "string");
        assert_eq!(fp["$.customer.vip"], "boolean");
        assert_eq!(fp["$.lines[]"], "array<object>");
        assert_eq!(fp["$.lines[].sku"], "string");
        assert_eq!(fp["$.lines[].qty"], "number");
        assert_eq!(fp["$.lines[].note"], "null");
        assert_eq!(fp["$.tags[]"], "array<string>");
        assert_eq!(fp["$.empty[]"], "array (empty)");
        assert_eq!(fp["$.meta"], "object (empty)");
    }

    #[test]
    fn test_fingerprint_caps_items() {
        let payload = json!([{"a": 1}, {"b": 2}]);
        let capped = fingerprint(&payload, Some(1));
        assert!(capped.contains_key("$[].a"));
        assert!(!capped.contains_key("$[].b"));

        let full = fingerprint(&payload, None);
        assert!(full.contains_key("$[].b"));
    }

    #[test]
    fn test_fingerprint_null_list() {
        assert_eq!(fingerprint(&json!([null, null]), None)["$[]"], "array<null>");
        assert_eq!(fingerprint(&json!("x"), None)["$"], "string");
    }

    #[test]
    fn test_same_shape_same_fingerprint() {
        let a = fingerprint(&json!({"id": 1, "name": "a"}), Some(10));
        let b = fingerprint(&json!({"name": "b", "id": 99}), Some(10));
        assert_eq!(a, b);
    }
}
