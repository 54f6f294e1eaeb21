//! Source path parsing and resolution.
//!
//! Paths are dot-separated field names. A few JSONPath-isms are accepted so
//! that model-written specs work unchanged:
//!
//! ```text
//! customer.name          nested field
//! $.customer.name        same, with root prefix
//! lines.sku              implicit iteration: `lines` is a list, `sku` is read per element
//! lines[].sku            explicit iteration (also `[*]`)
//! lines[0].sku / lines.0.sku   index into a list
//! ```
//!
//! Resolution never fails. A missing key or a step into a scalar yields
//! [`Resolved::Absent`], which is distinct from a present `null`.

use serde_json::Value;
use std::fmt;

use crate::error::{SpecError, SpecResult};

/// One step of a [`SourcePath`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Object field. On a list, a numeric key indexes and any other key fans out.
    Key(String),
    /// List index.
    Index(usize),
    /// Iterate every element of a list.
    Each,
}

/// A parsed source path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePath {
    raw: String,
    segments: Vec<Segment>,
}

/// Outcome of resolving a path against a payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// Nothing at that path.
    Absent,
    /// Exactly one value (may be `null`, may be a literal list).
    One(Value),
    /// Values collected by iterating over one or more lists.
    Many(Vec<Value>),
}

impl Resolved {
    pub fn is_absent(&self) -> bool {
        matches!(self, Resolved::Absent)
    }

    /// Collapse into a single JSON value; fan-out results become a list.
    pub fn into_value(self) -> Option<Value> {
        match self {
            Resolved::Absent => None,
            Resolved::One(v) => Some(v),
            Resolved::Many(vs) => Some(Value::Array(vs)),
        }
    }
}

impl SourcePath {
    /// Parse a path string.
    pub fn parse(raw: &str) -> SpecResult<Self> {
        let invalid = |reason: &str| SpecError::InvalidPath {
            path: raw.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid("path is empty"));
        }

        let mut rest = trimmed;
        if let Some(stripped) = rest.strip_prefix('$') {
            rest = stripped.strip_prefix('.').unwrap_or(stripped);
        }

        let mut segments = Vec::new();
        if rest.is_empty() {
            return Ok(Self { raw: trimmed.to_string(), segments });
        }

        for part in rest.split('.') {
            let (name, mut brackets) = match part.find('[') {
                Some(pos) => (&part[..pos], &part[pos..]),
                None => (part, ""),
            };

            if name.is_empty() && brackets.is_empty() {
                return Err(invalid("empty segment"));
            }
            if !name.is_empty() {
                segments.push(Segment::Key(name.to_string()));
            }

            while !brackets.is_empty() {
                if !brackets.starts_with('[') {
                    return Err(invalid("unexpected characters after ']'"));
                }
                let inner_end = brackets
                    .find(']')
                    .ok_or_else(|| invalid("unclosed '['"))?;
                let inner = &brackets[1..inner_end];
                match inner {
                    "" | "*" => segments.push(Segment::Each),
                    digits => {
                        let idx = digits
                            .parse::<usize>()
                            .map_err(|_| invalid("bracket must hold an index, '*' or nothing"))?;
                        segments.push(Segment::Index(idx));
                    }
                }
                brackets = &brackets[inner_end + 1..];
            }
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    /// Build a plain dotted path from field names.
    pub fn from_keys(keys: &[&str]) -> Self {
        Self {
            raw: keys.join("."),
            segments: keys.iter().map(|k| Segment::Key(k.to_string())).collect(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Resolve this path against a payload.
    pub fn resolve(&self, payload: &Value) -> Resolved {
        resolve(payload, self)
    }
}

impl fmt::Display for SourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Resolve `path` against `payload`.
pub fn resolve(payload: &Value, path: &SourcePath) -> Resolved {
    let mut current: Vec<&Value> = vec![payload];
    let mut fanned = false;

    for segment in &path.segments {
        let mut next: Vec<&Value> = Vec::new();

        for value in current {
            match (segment, value) {
                (Segment::Key(key), Value::Object(map)) => next.extend(map.get(key)),
                (Segment::Key(key), Value::Array(items)) => match key.parse::<usize>() {
                    Ok(idx) => next.extend(items.get(idx)),
                    Err(_) => {
                        fanned = true;
                        next.extend(items.iter().filter_map(|item| item.get(key.as_str())));
                    }
                },
                (Segment::Index(idx), Value::Array(items)) => next.extend(items.get(*idx)),
                (Segment::Each, Value::Array(items)) => {
                    fanned = true;
                    next.extend(items.iter());
                }
                _ => {}
            }
        }

        if next.is_empty() {
            return Resolved::Absent;
        }
        current = next;
    }

    if fanned {
        Resolved::Many(current.into_iter().cloned().collect())
    } else {
        current
            .into_iter()
            .next()
            .map(|v| Resolved::One(v.clone()))
            .unwrap_or(Resolved::Absent)
    }
}
