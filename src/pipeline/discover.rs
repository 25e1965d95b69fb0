//! Field discovery: which fields does this form have, and what do they mean?
//!
//! Two sources, tried in order:
//!
//! 1. **Interactive metadata** — the catalog's `/AcroForm` `/Fields` tree
//!    (or, failing that, a scan of every page's widget annotations). These
//!    names are authoritative; the LLM is only asked to *describe* them, one
//!    batched call for the whole set, and may never rename one.
//! 2. **Inference** — for flat PDFs, the LLM invents `{name, description}`
//!    pairs from the page text.
//!
//! Failure policy: any LLM or parse failure degrades to the raw technical
//! names (name doubling as description). Only when there are no names *and*
//! inference produced nothing does discovery return an empty list, which the
//! pipeline turns into [`crate::FormFillError::NoFieldsDetected`].

use crate::config::FillConfig;
use crate::error::FormFillError;
use crate::fields::FieldDescriptor;
use crate::pipeline::llm::LlmClient;
use crate::pipeline::parse;
use crate::prompts;
use lopdf::{Document, Object};
use tracing::{debug, info, warn};

/// Collect interactive field names, in document order.
///
/// Walks the AcroForm `/Fields` tree first (following `/Kids`); when the
/// document has no AcroForm, falls back to scanning page `/Annots` for widget
/// entries carrying a `/T` name.
pub fn acroform_field_names(doc: &Document) -> Vec<String> {
    let mut names = Vec::new();

    if let Some(fields) = acroform_fields_array(doc) {
        for entry in fields {
            collect_field_names(doc, &entry, &mut names, 0);
        }
    }

    if names.is_empty() {
        for (_page_num, page_id) in doc.get_pages() {
            for annot_id in super::fill::page_widget_ids(doc, page_id) {
                if let Some(name) = super::fill::widget_field_name(doc, annot_id) {
                    if !names.contains(&name) {
                        names.push(name);
                    }
                }
            }
        }
    }

    names
}

/// The `/AcroForm` `/Fields` array, if the catalog carries one.
fn acroform_fields_array(doc: &Document) -> Option<Vec<Object>> {
    let catalog = doc.catalog().ok()?;
    let acroform = resolve_ref(doc, catalog.get(b"AcroForm").ok()?)?;
    let fields = resolve_ref(doc, acroform.as_dict().ok()?.get(b"Fields").ok()?)?;
    Some(fields.as_array().ok()?.clone())
}

/// Depth-first walk of a field tree node: terminal nodes contribute their
/// `/T`; intermediate nodes recurse into `/Kids`.
fn collect_field_names(doc: &Document, entry: &Object, names: &mut Vec<String>, depth: usize) {
    if depth > 16 {
        return;
    }
    let Some(dict) = resolve_ref(doc, entry).and_then(|o| o.as_dict().ok()) else {
        return;
    };
    let own_name = dict
        .get(b"T")
        .ok()
        .and_then(|t| decode_name_object(doc, t));

    match dict.get(b"Kids").ok().and_then(|k| resolve_ref(doc, k)) {
        Some(Object::Array(kids)) => {
            for kid in kids {
                collect_field_names(doc, kid, names, depth + 1);
            }
        }
        _ => {
            if let Some(name) = own_name {
                if !name.is_empty() && !names.contains(&name) {
                    names.push(name);
                }
            }
        }
    }
}

fn resolve_ref<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Decode a `/T` value into a bare field name.
///
/// PDF stores names as strings in UTF-16BE (with BOM) or PDFDocEncoding;
/// writers occasionally leave the literal-string parentheses in the bytes, so
/// those delimiters are stripped too.
pub(crate) fn decode_name_object(doc: &Document, obj: &Object) -> Option<String> {
    let obj = resolve_ref(doc, obj)?;
    let decoded = match obj {
        Object::String(bytes, _) => decode_pdf_string(bytes),
        Object::Name(name) => String::from_utf8_lossy(name).into_owned(),
        _ => return None,
    };
    let bare = decoded
        .trim()
        .trim_start_matches('(')
        .trim_end_matches(')')
        .to_string();
    if bare.is_empty() {
        None
    } else {
        Some(bare)
    }
}

/// Tolerant PDF string decode: UTF-16BE when the BOM says so, else UTF-8,
/// else Latin-1.
pub(crate) fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks(2)
            .filter(|c| c.len() == 2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        if let Ok(s) = String::from_utf16(&units) {
            return s;
        }
    }
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Discover the fields of a loaded document, enriching or inventing
/// descriptions through the LLM.
///
/// `form_text` is the document's extracted page text, used as context for the
/// description call and as the source material for inference.
pub async fn discover_fields(
    doc: &Document,
    form_text: &str,
    client: &LlmClient,
    config: &FillConfig,
) -> Result<Vec<FieldDescriptor>, FormFillError> {
    let names = acroform_field_names(doc);

    if !names.is_empty() {
        info!(count = names.len(), "found interactive form fields");
        return Ok(describe_fields(&names, form_text, client, config).await);
    }

    if form_text.trim().is_empty() {
        debug!("no interactive fields and no page text to infer from");
        return Ok(Vec::new());
    }

    info!("no interactive fields; asking the model to infer them from page text");
    let prompt = prompts::invent_fields_prompt(form_text);
    let format = config.schema_hints.then(prompts::discovery_format);
    match client.generate(&prompt, format.as_ref()).await {
        Ok(raw) => Ok(parse::parse_discovery(&raw).unwrap_or_else(|| {
            warn!("field inference reply unusable; no fields detected");
            Vec::new()
        })),
        Err(e) if e.is_llm_failure() => {
            warn!(error = %e, "field inference call failed; no fields detected");
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

/// One batched description call over known technical names.
///
/// The reply is re-keyed by requested name: the LLM may only supply
/// descriptions, never rename a field. Any failure degrades to bare
/// descriptors.
async fn describe_fields(
    names: &[String],
    form_text: &str,
    client: &LlmClient,
    config: &FillConfig,
) -> Vec<FieldDescriptor> {
    let prompt = prompts::describe_fields_prompt(names, form_text);
    let format = config.schema_hints.then(prompts::discovery_format);

    let described = match client.generate(&prompt, format.as_ref()).await {
        Ok(raw) => parse::parse_discovery(&raw),
        Err(e) => {
            warn!(error = %e, "description call failed; using technical names");
            None
        }
    };

    match described {
        Some(descriptors) => names
            .iter()
            .map(|name| {
                descriptors
                    .iter()
                    .find(|d| &d.name == name)
                    .cloned()
                    .unwrap_or_else(|| FieldDescriptor::bare(name))
            })
            .collect(),
        None => names.iter().map(FieldDescriptor::bare).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Object};

    fn doc_with_acroform(field_names: &[&str]) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::from(page_id)],
                "Count" => 1i64,
            }),
        );
        let field_refs: Vec<Object> = field_names
            .iter()
            .map(|name| {
                doc.add_object(dictionary! {
                    "FT" => "Tx",
                    "T" => Object::string_literal(*name),
                })
                .into()
            })
            .collect();
        let acroform_id = doc.add_object(dictionary! {
            "Fields" => field_refs,
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
            "AcroForm" => acroform_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    #[test]
    fn acroform_names_in_document_order() {
        let doc = doc_with_acroform(&["name", "date", "signature"]);
        assert_eq!(
            acroform_field_names(&doc),
            vec!["name", "date", "signature"]
        );
    }

    #[test]
    fn no_acroform_yields_empty() {
        let doc = doc_with_acroform(&[]);
        assert!(acroform_field_names(&doc).is_empty());
    }

    #[test]
    fn kids_are_traversed() {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::from(page_id)],
                "Count" => 1i64,
            }),
        );
        let kid_a = doc.add_object(dictionary! {
            "T" => Object::string_literal("child_a"),
        });
        let kid_b = doc.add_object(dictionary! {
            "T" => Object::string_literal("child_b"),
        });
        let parent = doc.add_object(dictionary! {
            "T" => Object::string_literal("group"),
            "Kids" => vec![Object::from(kid_a), Object::from(kid_b)],
        });
        let acroform_id = doc.add_object(dictionary! {
            "Fields" => vec![Object::from(parent)],
        });
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
            "AcroForm" => acroform_id,
        });
        doc.trailer.set("Root", catalog_id);

        assert_eq!(acroform_field_names(&doc), vec!["child_a", "child_b"]);
    }

    #[test]
    fn utf16_names_decode() {
        // "ab" as UTF-16BE with BOM.
        let bytes = vec![0xFE, 0xFF, 0x00, b'a', 0x00, b'b'];
        assert_eq!(decode_pdf_string(&bytes), "ab");
    }

    #[test]
    fn latin1_fallback_decodes() {
        let bytes = vec![0xE9];
        assert_eq!(decode_pdf_string(&bytes), "é");
    }
}
