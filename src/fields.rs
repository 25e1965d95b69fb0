//! Core data model: pure values flowing between pipeline stages.
//!
//! Every stage takes these types in and hands them out — no stage mutates
//! shared state. That keeps each stage a pure function over its inputs and
//! makes the whole pipeline testable without a PDF or an LLM in sight.

use crate::error::FormFillError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A form field's technical identifier plus a human-readable explanation of
/// what belongs there. Produced by field discovery; immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub description: String,
}

impl FieldDescriptor {
    /// Descriptor for a field the LLM could not (or was not asked to)
    /// describe: the technical name doubles as the description.
    pub fn bare(name: impl Into<String>) -> Self {
        let name = name.into();
        FieldDescriptor {
            description: name.clone(),
            name,
        }
    }
}

/// The validated input to a single LLM extraction call.
///
/// Construction enforces the input contract: non-empty transcript, non-empty
/// field list, unique field names. Violations are fatal
/// [`FormFillError::InvalidInput`] — never silently coerced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionRequest {
    transcript: String,
    fields: Vec<String>,
    context: Option<String>,
}

impl ExtractionRequest {
    pub fn new(
        transcript: impl Into<String>,
        fields: Vec<String>,
        context: Option<String>,
    ) -> Result<Self, FormFillError> {
        let transcript = transcript.into();
        if transcript.trim().is_empty() {
            return Err(FormFillError::InvalidInput {
                detail: "transcript must be non-empty text".into(),
            });
        }
        if fields.is_empty() {
            return Err(FormFillError::InvalidInput {
                detail: "field list must contain at least one field name".into(),
            });
        }
        let mut seen = std::collections::HashSet::new();
        for f in &fields {
            if !seen.insert(f.as_str()) {
                return Err(FormFillError::InvalidInput {
                    detail: format!("duplicate field name: '{f}'"),
                });
            }
        }
        // Empty context collapses to None so prompt building has one case.
        let context = context.filter(|c| !c.trim().is_empty());
        Ok(ExtractionRequest {
            transcript,
            fields,
            context,
        })
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }
}

/// One extracted value.
///
/// `Multiple` is produced by the semicolon convention: the model joins
/// several answers with `;` and the parser splits them back apart.
/// Serialized as a string, an array of strings, or `null` respectively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Single(String),
    Multiple(Vec<String>),
    Absent,
}

impl FieldValue {
    pub fn is_absent(&self) -> bool {
        matches!(self, FieldValue::Absent)
    }

    /// Render the value the way it is written into a widget: a single string,
    /// multiple values re-joined with `"; "`.
    pub fn as_widget_text(&self) -> Option<String> {
        match self {
            FieldValue::Single(s) => Some(s.clone()),
            FieldValue::Multiple(vs) => Some(vs.join("; ")),
            FieldValue::Absent => None,
        }
    }
}

/// Mapping from field name to extracted value, in request order.
///
/// Invariant: the key set equals the requested field set exactly — fields
/// with no discoverable value carry an explicit [`FieldValue::Absent`], they
/// are never omitted.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionResult {
    values: IndexMap<String, FieldValue>,
}

impl ExtractionResult {
    /// Result where every requested field is absent — the full-fallback shape
    /// used when the model's reply is unusable.
    pub fn all_absent(fields: &[String]) -> Self {
        ExtractionResult {
            values: fields
                .iter()
                .map(|f| (f.clone(), FieldValue::Absent))
                .collect(),
        }
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, FieldValue)>) -> Self {
        ExtractionResult {
            values: pairs.into_iter().collect(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.values.get(field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.values.iter()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// True when no field carries a value — the "extraction degraded" signal.
    pub fn is_all_absent(&self) -> bool {
        self.values.values().all(FieldValue::is_absent)
    }
}

/// Where a flat-form value gets stamped: page index plus the anchor point in
/// PDF drawing space (origin bottom-left). At most one per field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCoordinate {
    pub page: usize,
    pub x: f32,
    pub y: f32,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_rejects_empty_transcript() {
        let err = ExtractionRequest::new("   ", vec!["a".into()], None);
        assert!(matches!(err, Err(FormFillError::InvalidInput { .. })));
    }

    #[test]
    fn request_rejects_empty_fields() {
        let err = ExtractionRequest::new("text", vec![], None);
        assert!(matches!(err, Err(FormFillError::InvalidInput { .. })));
    }

    #[test]
    fn request_rejects_duplicate_fields() {
        let err = ExtractionRequest::new("text", vec!["a".into(), "a".into()], None);
        assert!(matches!(err, Err(FormFillError::InvalidInput { .. })));
    }

    #[test]
    fn blank_context_collapses_to_none() {
        let req = ExtractionRequest::new("text", vec!["a".into()], Some("  \n ".into())).unwrap();
        assert_eq!(req.context(), None);
    }

    #[test]
    fn all_absent_keeps_request_order() {
        let fields = vec!["z".to_string(), "a".to_string(), "m".to_string()];
        let r = ExtractionResult::all_absent(&fields);
        let keys: Vec<&String> = r.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
        assert!(r.is_all_absent());
    }

    #[test]
    fn field_value_serializes_absent_as_null() {
        let json = serde_json::to_string(&FieldValue::Absent).unwrap();
        assert_eq!(json, "null");
        let back: FieldValue = serde_json::from_str("null").unwrap();
        assert_eq!(back, FieldValue::Absent);
    }

    #[test]
    fn widget_text_joins_multiple() {
        let v = FieldValue::Multiple(vec!["a".into(), "b".into()]);
        assert_eq!(v.as_widget_text().unwrap(), "a; b");
        assert_eq!(FieldValue::Absent.as_widget_text(), None);
    }
}
