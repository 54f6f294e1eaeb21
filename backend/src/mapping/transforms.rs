//! Transform registry
//!
//! Built-in coercions from extracted source values to declared target types.
//! Every transform is total: failures are reported through
//! [`TransformOutcome::Failed`], never by panicking or returning an error.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::{Number, Value};
use std::fmt;
use std::str::FromStr;

use crate::error::SpecError;

/// All available transforms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformKind {
    /// Stringify any scalar
    String,

    /// Parse to floating point
    Number,

    /// Parse to integer, truncating fractional input with a warning
    Integer,

    /// Accept booleans and the strings "true"/"false"
    Boolean,

    /// ISO-8601 date/time strings or epoch seconds, normalized to `YYYY-MM-DD`
    Date,

    /// Wrap a non-list value in a one-element list
    EnsureArray,
}

/// Result of applying a transform to one value.
#[derive(Debug, Clone, PartialEq)]
pub enum TransformOutcome {
    /// Converted without loss
    Value(Value),
    /// Converted, but precision was dropped
    Lossy { value: Value, note: String },
    /// Input cannot be converted
    Failed,
}

impl TransformKind {
    pub const ALL: [TransformKind; 6] = [
        TransformKind::String,
        TransformKind::Number,
        TransformKind::Integer,
        TransformKind::Boolean,
        TransformKind::Date,
        TransformKind::EnsureArray,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransformKind::String => "string",
            TransformKind::Number => "number",
            TransformKind::Integer => "integer",
            TransformKind::Boolean => "boolean",
            TransformKind::Date => "date",
            TransformKind::EnsureArray => "ensure_array",
        }
    }

    /// Apply this transform to a single value.
    ///
    /// `null` passes through unchanged (except for `ensure_array`).
    pub fn apply(&self, value: &Value) -> TransformOutcome {
        if value.is_null() && *self != TransformKind::EnsureArray {
            return TransformOutcome::Value(Value::Null);
        }
        match self {
            TransformKind::String => apply_string(value),
            TransformKind::Number => apply_number(value),
            TransformKind::Integer => apply_integer(value),
            TransformKind::Boolean => apply_boolean(value),
            TransformKind::Date => apply_date(value),
            TransformKind::EnsureArray => apply_ensure_array(value),
        }
    }

    /// Apply element-wise to values collected by iterating a list.
    ///
    /// Any failing element fails the whole set; lossy notes are merged.
    pub fn apply_each(&self, values: &[Value]) -> TransformOutcome {
        if *self == TransformKind::EnsureArray {
            return TransformOutcome::Value(Value::Array(values.to_vec()));
        }

        let mut out = Vec::with_capacity(values.len());
        let mut notes = Vec::new();
        for value in values {
            match self.apply(value) {
                TransformOutcome::Value(v) => out.push(v),
                TransformOutcome::Lossy { value, note } => {
                    out.push(value);
                    notes.push(note);
                }
                TransformOutcome::Failed => return TransformOutcome::Failed,
            }
        }

        if notes.is_empty() {
            TransformOutcome::Value(Value::Array(out))
        } else {
            TransformOutcome::Lossy {
                value: Value::Array(out),
                note: notes.join("; "),
            }
        }
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransformKind {
    type Err = SpecError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "string" | "to_string" => Ok(TransformKind::String),
            "number" | "to_float" => Ok(TransformKind::Number),
            "integer" | "to_int" => Ok(TransformKind::Integer),
            "boolean" | "to_boolean" => Ok(TransformKind::Boolean),
            "date" => Ok(TransformKind::Date),
            "ensure_array" => Ok(TransformKind::EnsureArray),
            _ => Err(SpecError::UnknownTransform(tag.to_string())),
        }
    }
}

fn apply_string(value: &Value) -> TransformOutcome {
    match value {
        Value::String(s) => TransformOutcome::Value(Value::String(s.clone())),
        Value::Number(n) => TransformOutcome::Value(Value::String(n.to_string())),
        Value::Bool(b) => TransformOutcome::Value(Value::String(b.to_string())),
        _ => TransformOutcome::Failed,
    }
}

fn apply_number(value: &Value) -> TransformOutcome {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    parsed
        .filter(|f| f.is_finite())
        .and_then(Number::from_f64)
        .map(|n| TransformOutcome::Value(Value::Number(n)))
        .unwrap_or(TransformOutcome::Failed)
}

fn apply_integer(value: &Value) -> TransformOutcome {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                TransformOutcome::Value(Value::from(i))
            } else if let Some(u) = n.as_u64() {
                TransformOutcome::Value(Value::from(u))
            } else {
                n.as_f64().map(truncate_float).unwrap_or(TransformOutcome::Failed)
            }
        }
        Value::String(s) => {
            let s = s.trim();
            match s.parse::<i64>() {
                Ok(i) => TransformOutcome::Value(Value::from(i)),
                Err(_) => s
                    .parse::<f64>()
                    .map(truncate_float)
                    .unwrap_or(TransformOutcome::Failed),
            }
        }
        _ => TransformOutcome::Failed,
    }
}

fn truncate_float(f: f64) -> TransformOutcome {
    if !f.is_finite() {
        return TransformOutcome::Failed;
    }
    let truncated = f.trunc();
    if truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return TransformOutcome::Failed;
    }

    let int = truncated as i64;
    if f.fract() == 0.0 {
        TransformOutcome::Value(Value::from(int))
    } else {
        TransformOutcome::Lossy {
            value: Value::from(int),
            note: format!("integer transform truncated {} to {}", f, int),
        }
    }
}

fn apply_boolean(value: &Value) -> TransformOutcome {
    match value {
        Value::Bool(b) => TransformOutcome::Value(Value::Bool(*b)),
        Value::String(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("true") {
                TransformOutcome::Value(Value::Bool(true))
            } else if s.eq_ignore_ascii_case("false") {
                TransformOutcome::Value(Value::Bool(false))
            } else {
                TransformOutcome::Failed
            }
        }
        _ => TransformOutcome::Failed,
    }
}

fn apply_date(value: &Value) -> TransformOutcome {
    let date = match value {
        Value::String(s) => parse_iso_date(s.trim()),
        Value::Number(n) => {
            let secs = n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64));
            secs.and_then(|s| DateTime::from_timestamp(s, 0))
                .map(|dt| dt.date_naive())
        }
        _ => None,
    };

    date.map(|d| TransformOutcome::Value(Value::String(d.format("%Y-%m-%d").to_string())))
        .unwrap_or(TransformOutcome::Failed)
}

/// Parse the ISO-8601 shapes we accept: a calendar date, an RFC 3339
/// timestamp, or a naive date-time. The written date is kept; offsets are not
/// applied.
fn parse_iso_date(s: &str) -> Option<NaiveDate> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local().date());
    }
    [
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M:%S%.f",
    ]
    .iter()
    .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    .map(|dt| dt.date())
}

fn apply_ensure_array(value: &Value) -> TransformOutcome {
    match value {
        Value::Array(_) => TransformOutcome::Value(value.clone()),
        Value::Null => TransformOutcome::Value(Value::Array(Vec::new())),
        other => TransformOutcome::Value(Value::Array(vec![other.clone()])),
    }
}

/// Get a description of all available transforms for prompts and the CLI
pub fn transforms_description() -> String {
    r#"Available transforms:

| Transform | Accepts | Fails on |
|-----------|---------|----------|
| string | any scalar | objects, lists |
| number | numbers, numeric strings | non-numeric input |
| integer | numbers, numeric strings (fractions truncated with a warning) | non-numeric input |
| boolean | booleans, "true"/"false" (any case) | everything else |
| date | ISO-8601 dates/timestamps, epoch seconds; output YYYY-MM-DD | other formats |
| ensure_array | anything; wraps non-lists | never |

Aliases: to_string, to_float, to_int, to_boolean.
A null source value passes through every transform unchanged (ensure_array gives [])."#
        .to_string()
}
