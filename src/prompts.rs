//! Prompt construction for the two LLM interactions.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — the wording the model sees is edited in
//!    exactly one place.
//!
//! 2. **Testability** — unit tests inspect prompts directly without spinning
//!    up a model server.
//!
//! Two *distinct* output schemas are requested and must never be conflated:
//!
//! * **extraction** — a single flat JSON object mapping every field name to
//!   its value (or `null`);
//! * **discovery** — a JSON array of `{"name", "description"}` objects.
//!
//! The schema-hint builders ([`extraction_format`], [`discovery_format`])
//! mirror the same two shapes as JSON-schema grammars for servers that accept
//! a `format` constraint.

use serde_json::{json, Value};

/// Build the value-extraction prompt: one JSON object, every listed field a
/// key, `null` for anything the text does not contain.
///
/// The context block is included only when `context` is non-empty.
pub fn extraction_prompt(transcript: &str, fields: &[String], context: Option<&str>) -> String {
    let mut prompt = String::with_capacity(transcript.len() + 512);
    prompt.push_str(
        "You are an assistant that fills out forms using information from free text.\n\
         Extract a value for every field listed below from the text.\n\n\
         Fields:\n",
    );
    for field in fields {
        prompt.push_str("- ");
        prompt.push_str(field);
        prompt.push('\n');
    }
    prompt.push_str(
        "\nRules:\n\
         - Respond with a single JSON object mapping every field name above to its value.\n\
         - If a value cannot be found in the text, use null.\n\
         - If a field is plural and the text contains several values for it, join them with \"; \".\n\
         - Respond with the JSON object only. Do not add any explanatory text.\n",
    );
    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        prompt.push_str("\nForm context:\n\"\"\"\n");
        prompt.push_str(context);
        prompt.push_str("\n\"\"\"\n");
    }
    prompt.push_str("\nText:\n\"\"\"\n");
    prompt.push_str(transcript);
    prompt.push_str("\n\"\"\"\n");
    prompt
}

/// Build the description-enrichment prompt used when the PDF already carries
/// technical field names: one batched call covering all of them.
///
/// The model may only supply descriptions — names must come back verbatim.
pub fn describe_fields_prompt(names: &[String], form_text: &str) -> String {
    let mut prompt = String::with_capacity(form_text.len() + 512);
    prompt.push_str(
        "A PDF form contains the following technical field names:\n",
    );
    for name in names {
        prompt.push_str("- ");
        prompt.push_str(name);
        prompt.push('\n');
    }
    prompt.push_str(
        "\nFor each field, write a short human-readable description of the value that belongs there.\n\n\
         Rules:\n\
         - Respond with a JSON array of objects, one per field, each of the form {\"name\": ..., \"description\": ...}.\n\
         - Copy every field name into \"name\" exactly as written above. Never rename, merge, or drop a field.\n\
         - Respond with the JSON array only, even if there is exactly one field. Do not add any explanatory text.\n",
    );
    if !form_text.trim().is_empty() {
        prompt.push_str("\nText of the form, for context:\n\"\"\"\n");
        prompt.push_str(form_text);
        prompt.push_str("\n\"\"\"\n");
    }
    prompt
}

/// Build the field-invention prompt used when the PDF has no interactive
/// fields at all: the model infers what a person filling this form would be
/// asked for.
pub fn invent_fields_prompt(form_text: &str) -> String {
    let mut prompt = String::with_capacity(form_text.len() + 512);
    prompt.push_str(
        "Below is the text of a form. Identify every blank a person filling it out would complete.\n\n\
         Rules:\n\
         - Respond with a JSON array of objects, each of the form {\"name\": ..., \"description\": ...}.\n\
         - Use short snake_case identifiers for \"name\" (for example \"incident_date\").\n\
         - \"description\" explains what value belongs in the blank.\n\
         - Respond with the JSON array only, even if you find exactly one field. Do not add any explanatory text.\n\n\
         Form text:\n\"\"\"\n",
    );
    prompt.push_str(form_text);
    prompt.push_str("\n\"\"\"\n");
    prompt
}

/// JSON-schema grammar for the extraction reply: an object whose properties
/// are exactly the requested fields, each a string or null.
pub fn extraction_format(fields: &[String]) -> Value {
    let properties: serde_json::Map<String, Value> = fields
        .iter()
        .map(|f| (f.clone(), json!({"type": ["string", "null"]})))
        .collect();
    json!({
        "type": "object",
        "properties": properties,
        "required": fields,
    })
}

/// JSON-schema grammar for the discovery reply: an array of
/// `{name, description}` objects.
pub fn discovery_format() -> Value {
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "description": {"type": "string"},
            },
            "required": ["name", "description"],
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn extraction_prompt_mandates_null_and_bare_json() {
        let p = extraction_prompt("John signed", &fields(&["name", "date"]), None);
        assert!(p.contains("use null"));
        assert!(p.contains("JSON object only"));
        assert!(p.contains("- name\n"));
        assert!(p.contains("- date\n"));
    }

    #[test]
    fn extraction_prompt_omits_empty_context() {
        let without = extraction_prompt("t", &fields(&["a"]), None);
        assert!(!without.contains("Form context"));
        let blank = extraction_prompt("t", &fields(&["a"]), Some("   "));
        assert!(!blank.contains("Form context"));
        let with = extraction_prompt("t", &fields(&["a"]), Some("Invoice form"));
        assert!(with.contains("Form context"));
        assert!(with.contains("Invoice form"));
    }

    #[test]
    fn describe_prompt_requires_verbatim_names_and_array() {
        let p = describe_fields_prompt(&fields(&["incident_date"]), "");
        assert!(p.contains("exactly as written"));
        assert!(p.contains("JSON array only, even if there is exactly one field"));
        assert!(p.contains("- incident_date\n"));
        // No context block when form text is empty.
        assert!(!p.contains("for context"));
    }

    #[test]
    fn invent_prompt_requires_array_even_for_singleton() {
        let p = invent_fields_prompt("Name: ____");
        assert!(p.contains("even if you find exactly one field"));
        assert!(p.contains("snake_case"));
    }

    #[test]
    fn extraction_format_lists_every_field() {
        let f = extraction_format(&fields(&["a", "b"]));
        assert_eq!(f["required"], serde_json::json!(["a", "b"]));
        assert!(f["properties"]["a"]["type"].is_array());
    }
}
