//! Response parsing: tolerant conversion of raw model text into pipeline
//! values.
//!
//! Models disobey format instructions in predictable ways: they wrap JSON in
//! code fences, bury the payload under an explanatory outer key, or return a
//! bare object where an array was asked for. Each quirk gets its own stage in
//! an ordered fallback chain so every stage stays independently testable:
//!
//! 1. strip surrounding code fences
//! 2. strict JSON parse
//! 3. singleton-wrap (discovery: one descriptor object → one-element array)
//! 4. key-search unwrap (payload hidden under an arbitrary single key)
//! 5. full fallback — extraction degrades to all-null, discovery reports
//!    failure to the caller's own fallback policy
//!
//! Nothing in this module returns an error: a parse failure during value
//! extraction is *recovered*, not raised, so a bad model reply can never
//! abort a run that already paid for its LLM calls.

use crate::fields::{ExtractionResult, FieldDescriptor, FieldValue};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::warn;

// ── Stage 1: code-fence stripping ────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n?(.*?)\n?```\s*$").unwrap());

/// Remove a single pair of surrounding ``` fences, if present.
fn strip_code_fences(input: &str) -> &str {
    match RE_OUTER_FENCES.captures(input.trim()) {
        Some(caps) => caps.get(1).map(|m| m.as_str()).unwrap_or(input),
        None => input.trim(),
    }
}

// ── Value extraction ─────────────────────────────────────────────────────────

/// Parse a value-extraction reply into an [`ExtractionResult`].
///
/// The result's key set always equals `fields`, in order; anything the reply
/// does not account for maps to [`FieldValue::Absent`]. Irrecoverable input
/// degrades to the all-absent result — it never raises.
pub fn parse_extraction(raw: &str, fields: &[String]) -> ExtractionResult {
    let cleaned = strip_code_fences(raw);

    let parsed: Value = match serde_json::from_str(cleaned) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, snippet = %clip(cleaned), "extraction reply is not JSON, degrading to all-null");
            return ExtractionResult::all_absent(fields);
        }
    };

    let mapping = match extraction_mapping(&parsed, fields) {
        Some(m) => m,
        None => {
            warn!(snippet = %clip(cleaned), "extraction reply has no usable object, degrading to all-null");
            return ExtractionResult::all_absent(fields);
        }
    };

    ExtractionResult::from_pairs(
        fields
            .iter()
            .map(|f| (f.clone(), normalize_value(mapping.get(f)))),
    )
}

/// Locate the name→value object inside the parsed reply.
///
/// An object containing at least one requested field is the payload itself.
/// Otherwise, the first object-typed member value is taken — the single-key
/// wrapper case. A bare object with no recognizable keys still counts (it
/// simply yields all-null), so the wrapper search only runs when it could
/// actually improve the outcome.
fn extraction_mapping<'a>(
    parsed: &'a Value,
    fields: &[String],
) -> Option<&'a serde_json::Map<String, Value>> {
    let obj = parsed.as_object()?;
    if fields.iter().any(|f| obj.contains_key(f)) {
        return Some(obj);
    }
    for value in obj.values() {
        if let Some(inner) = value.as_object() {
            if fields.iter().any(|f| inner.contains_key(f)) {
                return Some(inner);
            }
        }
    }
    // No key matched anywhere; use the outer object (all fields come out null).
    Some(obj)
}

/// Normalize one JSON value into a [`FieldValue`], applying the semicolon
/// multi-value convention.
fn normalize_value(value: Option<&Value>) -> FieldValue {
    match value {
        None | Some(Value::Null) => FieldValue::Absent,
        Some(Value::String(s)) => split_semicolons(s),
        Some(Value::Array(items)) => {
            let strings: Vec<String> = items.iter().map(scalar_to_string).collect();
            match strings.len() {
                0 => FieldValue::Absent,
                1 => FieldValue::Single(strings.into_iter().next().unwrap()),
                _ => FieldValue::Multiple(strings),
            }
        }
        Some(other) => FieldValue::Single(scalar_to_string(other)),
    }
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Apply the `;` multi-value convention.
///
/// Split on `;`, then strip leading whitespace from every segment *except the
/// first* — the first segment keeps its whitespace untouched. Downstream
/// consumers rely on that exact shape, so it is pinned by tests rather than
/// tidied up.
fn split_semicolons(s: &str) -> FieldValue {
    if !s.contains(';') {
        return FieldValue::Single(s.to_string());
    }
    let segments: Vec<String> = s
        .split(';')
        .enumerate()
        .map(|(i, seg)| {
            if i == 0 {
                seg.to_string()
            } else {
                seg.trim_start().to_string()
            }
        })
        .collect();
    FieldValue::Multiple(segments)
}

// ── Discovery ────────────────────────────────────────────────────────────────

/// Parse a field-discovery reply into descriptors.
///
/// Returns `None` on irrecoverable input; the caller applies its own fallback
/// policy (raw names, or aborting with "no fields detected").
pub fn parse_discovery(raw: &str) -> Option<Vec<FieldDescriptor>> {
    let cleaned = strip_code_fences(raw);
    let parsed: Value = match serde_json::from_str(cleaned) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, snippet = %clip(cleaned), "discovery reply is not JSON");
            return None;
        }
    };
    descriptor_list(&parsed)
}

/// The discovery fallback chain over a parsed value.
fn descriptor_list(parsed: &Value) -> Option<Vec<FieldDescriptor>> {
    match parsed {
        Value::Array(items) => Some(items.iter().filter_map(descriptor_from_object).collect()),
        Value::Object(obj) => {
            // A lone descriptor object is coerced into a one-element list,
            // never treated as structurally different.
            if let Some(d) = descriptor_from_object(parsed) {
                return Some(vec![d]);
            }
            // Wrapper object: take the first array-typed member, then the
            // first descriptor-shaped object member.
            for value in obj.values() {
                if let Value::Array(items) = value {
                    return Some(items.iter().filter_map(descriptor_from_object).collect());
                }
            }
            for value in obj.values() {
                if let Some(d) = descriptor_from_object(value) {
                    return Some(vec![d]);
                }
            }
            None
        }
        _ => None,
    }
}

/// Read a `{name, description}`-shaped object, accepting the common key
/// aliases models substitute.
fn descriptor_from_object(value: &Value) -> Option<FieldDescriptor> {
    let obj = value.as_object()?;
    let name = ["name", "field_name", "field"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))?;
    if name.trim().is_empty() {
        return None;
    }
    let description = ["description", "desc", "label"]
        .iter()
        .find_map(|k| obj.get(*k).and_then(Value::as_str))
        .unwrap_or(name);
    Some(FieldDescriptor {
        name: name.to_string(),
        description: description.to_string(),
    })
}

fn clip(s: &str) -> String {
    s.chars().take(120).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    // ── extraction ───────────────────────────────────────────────────────

    #[test]
    fn well_formed_object_key_set_equals_request() {
        let r = parse_extraction(r#"{"name": "John Doe", "date": "2020-01-01"}"#, &fields(&["name", "date", "phone"]));
        assert_eq!(r.len(), 3);
        assert_eq!(r.get("name"), Some(&FieldValue::Single("John Doe".into())));
        assert_eq!(r.get("date"), Some(&FieldValue::Single("2020-01-01".into())));
        assert_eq!(r.get("phone"), Some(&FieldValue::Absent));
    }

    #[test]
    fn extra_keys_in_reply_are_dropped() {
        let r = parse_extraction(r#"{"name": "x", "hallucinated": "y"}"#, &fields(&["name"]));
        assert_eq!(r.len(), 1);
        assert!(r.get("hallucinated").is_none());
    }

    #[test]
    fn wrapper_object_is_unwrapped() {
        let raw = r#"{"extracted_data": {"name": "John", "date": null}}"#;
        let r = parse_extraction(raw, &fields(&["name", "date"]));
        assert_eq!(r.get("name"), Some(&FieldValue::Single("John".into())));
        assert_eq!(r.get("date"), Some(&FieldValue::Absent));
    }

    #[test]
    fn garbage_degrades_to_all_null() {
        let r = parse_extraction("I'm sorry, I cannot do that.", &fields(&["a", "b"]));
        assert!(r.is_all_absent());
        assert_eq!(r.len(), 2);
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let raw = "```json\n{\"a\": \"1\"}\n```";
        let r = parse_extraction(raw, &fields(&["a"]));
        assert_eq!(r.get("a"), Some(&FieldValue::Single("1".into())));
    }

    #[test]
    fn numeric_values_are_stringified() {
        let r = parse_extraction(r#"{"age": 42}"#, &fields(&["age"]));
        assert_eq!(r.get("age"), Some(&FieldValue::Single("42".into())));
    }

    #[test]
    fn semicolon_split_length_is_separator_count_plus_one() {
        let r = parse_extraction(r#"{"names": "a; b; c"}"#, &fields(&["names"]));
        match r.get("names").unwrap() {
            FieldValue::Multiple(vs) => assert_eq!(vs.len(), 3),
            other => panic!("expected Multiple, got {other:?}"),
        }
    }

    #[test]
    fn semicolon_first_segment_untrimmed() {
        let r = parse_extraction(r#"{"names": " one ; two;  three"}"#, &fields(&["names"]));
        match r.get("names").unwrap() {
            FieldValue::Multiple(vs) => {
                assert_eq!(vs[0], " one ", "first segment must keep its whitespace");
                assert_eq!(vs[1], "two");
                assert_eq!(vs[2], "three");
            }
            other => panic!("expected Multiple, got {other:?}"),
        }
    }

    #[test]
    fn array_value_becomes_multiple() {
        let r = parse_extraction(r#"{"tags": ["a", "b"]}"#, &fields(&["tags"]));
        assert_eq!(
            r.get("tags"),
            Some(&FieldValue::Multiple(vec!["a".into(), "b".into()]))
        );
    }

    // ── discovery ────────────────────────────────────────────────────────

    #[test]
    fn discovery_array_parses() {
        let raw = r#"[{"name": "email", "description": "contact email"}]"#;
        let ds = parse_discovery(raw).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds[0].name, "email");
        assert_eq!(ds[0].description, "contact email");
    }

    #[test]
    fn discovery_singleton_object_is_wrapped() {
        let raw = r#"{"name": "email", "description": "contact email"}"#;
        let ds = parse_discovery(raw).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds[0].name, "email");
    }

    #[test]
    fn discovery_wrapper_key_is_searched() {
        let raw = r#"{"fields": [{"name": "a", "description": "d"}]}"#;
        let ds = parse_discovery(raw).unwrap();
        assert_eq!(ds.len(), 1);
        assert_eq!(ds[0].name, "a");
    }

    #[test]
    fn discovery_garbage_is_none() {
        assert!(parse_discovery("nope").is_none());
        assert!(parse_discovery("42").is_none());
    }

    #[test]
    fn discovery_missing_description_falls_back_to_name() {
        let ds = parse_discovery(r#"[{"name": "a"}]"#).unwrap();
        assert_eq!(ds[0].description, "a");
    }

    #[test]
    fn fence_stripping_handles_plain_fences() {
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
    }
}
