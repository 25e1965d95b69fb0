//! Form filling: write extracted values into the PDF.
//!
//! Two mechanisms, tried in order:
//!
//! * **Interactive pass** — set `/V` on every widget annotation whose field
//!   name has a value, and delete the widget's `/AP`. Deleting the cached
//!   appearance stream is mandatory: viewers render `/AP` in preference to
//!   `/V`, so leaving a stale one in place makes the new value invisible even
//!   though it is structurally present. When anything was filled, the
//!   AcroForm additionally gets `/NeedAppearances true` so viewers regenerate
//!   the appearances they now lack.
//!
//! * **Flat fallback** — runs only when the interactive pass filled *zero*
//!   widgets. Each field name is normalized and matched against the page's
//!   word tokens; the first match anchors an overlay that draws the value
//!   just right of the label. The overlay is a *new* content stream appended
//!   to the page's `/Contents` — original content is composited under it,
//!   never replaced.

use crate::fields::{ExtractionResult, FieldCoordinate};
use crate::pipeline::discover::decode_name_object;
use crate::pipeline::text::PageWords;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, warn};

/// Name under which the overlay font is registered in page resources. The
/// prefix keeps it clear of names the producer already used.
const OVERLAY_FONT_NAME: &str = "FfHelv";

// ── Interactive pass ─────────────────────────────────────────────────────────

/// Object ids of the widget annotations on a page.
pub(crate) fn page_widget_ids(doc: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let mut ids = Vec::new();
    let Ok(page_dict) = doc.get_object(page_id).and_then(|o| o.as_dict()) else {
        return ids;
    };
    let Ok(annots_obj) = page_dict.get(b"Annots") else {
        return ids;
    };
    // /Annots may itself be indirect.
    let annots_obj = match annots_obj {
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(resolved) => resolved,
            Err(_) => return ids,
        },
        other => other,
    };
    let Ok(annots) = annots_obj.as_array() else {
        return ids;
    };
    for entry in annots {
        let Ok(annot_id) = entry.as_reference() else {
            // Inline annotation dictionaries cannot be mutated in place
            // through lopdf's object table; real-world widgets are indirect.
            continue;
        };
        let Ok(dict) = doc.get_object(annot_id).and_then(|o| o.as_dict()) else {
            continue;
        };
        match dict.get(b"Subtype") {
            Ok(Object::Name(subtype)) if subtype == b"Widget" => ids.push(annot_id),
            _ => {}
        }
    }
    ids
}

/// The bare field name of a widget: its own `/T`, or the nearest ancestor's
/// via `/Parent` for widgets split off a parent field.
pub(crate) fn widget_field_name(doc: &Document, annot_id: ObjectId) -> Option<String> {
    let mut current = annot_id;
    for _ in 0..16 {
        let dict = doc.get_object(current).ok()?.as_dict().ok()?;
        if let Ok(t) = dict.get(b"T") {
            if let Some(name) = decode_name_object(doc, t) {
                return Some(name);
            }
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

/// Set widget values across the whole document. Returns how many widgets
/// received a value.
pub fn fill_widgets(doc: &mut Document, values: &ExtractionResult) -> usize {
    let mut filled = 0;

    let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
    for page_id in pages {
        for annot_id in page_widget_ids(doc, page_id) {
            let Some(name) = widget_field_name(doc, annot_id) else {
                continue;
            };
            let Some(text) = values.get(&name).and_then(|v| v.as_widget_text()) else {
                continue;
            };
            let Ok(dict) = doc
                .get_object_mut(annot_id)
                .and_then(|o| o.as_dict_mut())
            else {
                continue;
            };
            dict.set("V", Object::string_literal(text.as_str()));
            // Stale appearance streams shadow /V; the viewer must regenerate.
            dict.remove(b"AP");
            debug!(field = %name, "widget filled");
            filled += 1;
        }
    }

    if filled > 0 {
        if let Err(e) = set_need_appearances(doc) {
            warn!(error = %e, "could not set NeedAppearances on AcroForm");
        }
    }

    info!(filled, "interactive pass complete");
    filled
}

/// Flag the AcroForm so viewers rebuild the appearance streams removed by
/// [`fill_widgets`].
fn set_need_appearances(doc: &mut Document) -> Result<(), lopdf::Error> {
    let catalog_id = doc.trailer.get(b"Root")?.as_reference()?;
    let catalog = doc.get_object(catalog_id)?.as_dict()?;
    match catalog.get(b"AcroForm") {
        Ok(Object::Reference(acroform_id)) => {
            let acroform_id = *acroform_id;
            let acroform = doc.get_object_mut(acroform_id)?.as_dict_mut()?;
            acroform.set("NeedAppearances", true);
        }
        Ok(Object::Dictionary(_)) => {
            let catalog = doc.get_object_mut(catalog_id)?.as_dict_mut()?;
            if let Ok(acroform) = catalog.get_mut(b"AcroForm").and_then(|o| o.as_dict_mut()) {
                acroform.set("NeedAppearances", true);
            }
        }
        _ => {}
    }
    Ok(())
}

// ── Flat fallback ────────────────────────────────────────────────────────────

/// Normalize a technical field name for label matching: separators become
/// spaces, everything case-folds.
fn normalize_field_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '_' | '-' | '.' | ':' => ' ',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

/// Locate an anchor coordinate for every field with a value.
///
/// Pages are scanned in document order, words in extraction order; the first
/// word whose text matches the normalized field name (case-insensitive
/// substring, either direction) wins. At most one coordinate per field. The
/// returned `y` is already converted to drawing space (origin bottom-left).
pub fn locate_field_anchors(
    pages: &[PageWords],
    values: &ExtractionResult,
    offset: f32,
) -> Vec<FieldCoordinate> {
    let mut anchors = Vec::new();

    for (field, value) in values.iter() {
        let Some(text) = value.as_widget_text() else {
            continue;
        };
        let needle = normalize_field_name(field);
        // A one-letter needle would anchor on noise; demand a little substance.
        if needle.trim().len() < 2 {
            continue;
        }

        let hit = pages.iter().find_map(|page| {
            page.words.iter().find_map(|word| {
                let token = word.text.to_lowercase();
                let matched = token.contains(needle.trim())
                    || needle.contains(token.trim_end_matches(':'));
                if matched && !token.trim_end_matches(':').is_empty() {
                    Some((page, word))
                } else {
                    None
                }
            })
        });

        match hit {
            Some((page, word)) => {
                debug!(field = %field, page = page.page_index, label = %word.text, "anchored");
                anchors.push(FieldCoordinate {
                    page: page.page_index,
                    x: word.x1 + offset,
                    y: page.height - word.bottom,
                    value: text,
                });
            }
            None => {
                debug!(field = %field, "no label match on any page");
            }
        }
    }

    anchors
}

/// Stamp overlay text onto the document, one appended content stream per
/// affected page.
pub fn stamp_overlays(
    doc: &mut Document,
    anchors: &[FieldCoordinate],
    font_size: f32,
) -> Result<usize, lopdf::Error> {
    if anchors.is_empty() {
        return Ok(0);
    }

    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });

    let mut stamped = 0;
    for (index, page_id) in page_ids.iter().enumerate() {
        let on_page: Vec<&FieldCoordinate> =
            anchors.iter().filter(|a| a.page == index).collect();
        if on_page.is_empty() {
            continue;
        }

        let mut operations = Vec::with_capacity(on_page.len() * 6 + 2);
        operations.push(Operation::new("q", vec![]));
        for anchor in &on_page {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new(
                "Tf",
                vec![OVERLAY_FONT_NAME.into(), font_size.into()],
            ));
            operations.push(Operation::new(
                "Td",
                vec![anchor.x.into(), anchor.y.into()],
            ));
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal(anchor.value.as_str())],
            ));
            operations.push(Operation::new("ET", vec![]));
        }
        operations.push(Operation::new("Q", vec![]));

        let encoded = Content { operations }.encode()?;
        let stream_id = doc.add_object(Object::Stream(Stream::new(Dictionary::new(), encoded)));

        append_page_content(doc, *page_id, stream_id)?;
        ensure_overlay_font(doc, *page_id, font_id)?;
        stamped += on_page.len();
    }

    info!(stamped, "overlay pass complete");
    Ok(stamped)
}

/// Add `stream_id` after the page's existing content, preserving whatever is
/// already there.
fn append_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    stream_id: ObjectId,
) -> Result<(), lopdf::Error> {
    let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
    let new_contents = match page_dict.get(b"Contents") {
        Ok(Object::Reference(existing)) => {
            vec![Object::Reference(*existing), Object::Reference(stream_id)]
        }
        Ok(Object::Array(existing)) => {
            let mut arr = existing.clone();
            arr.push(Object::Reference(stream_id));
            arr
        }
        _ => vec![Object::Reference(stream_id)],
    };
    page_dict.set("Contents", new_contents);
    Ok(())
}

/// Where the effective resource dictionary for a page lives.
enum ResourceSite {
    /// The page (or an ancestor) holds Resources behind a reference.
    Indirect(ObjectId),
    /// The page holds an inline Resources dictionary.
    PageInline,
    /// An ancestor holds an inline Resources dictionary; it must be copied
    /// onto the page before editing, or siblings would see the change and a
    /// page-level replacement would drop the inherited entries.
    InheritedInline(Dictionary),
    /// No Resources anywhere in the tree.
    Missing,
}

/// Register the overlay font under the page's effective `/Resources /Font`,
/// preserving whatever fonts the producer already registered.
fn ensure_overlay_font(
    doc: &mut Document,
    page_id: ObjectId,
    font_id: ObjectId,
) -> Result<(), lopdf::Error> {
    match locate_resources(doc, page_id) {
        ResourceSite::Indirect(rid) => {
            // A /Font held by reference is edited in place.
            if let Some(fid) = font_dict_ref(doc.get_object(rid)?.as_dict()?) {
                return add_font_entry(doc, fid, font_id);
            }
            let resources = doc.get_object_mut(rid)?.as_dict_mut()?;
            insert_overlay_font(resources, font_id);
            Ok(())
        }
        ResourceSite::PageInline => {
            if let Some(fid) = font_dict_ref(page_resources_dict(doc, page_id)?) {
                return add_font_entry(doc, fid, font_id);
            }
            let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
            let resources = page_dict
                .get_mut(b"Resources")
                .and_then(|o| o.as_dict_mut())?;
            insert_overlay_font(resources, font_id);
            Ok(())
        }
        site => {
            // Inherited-inline or missing: give the page its own Resources,
            // seeded with the inherited entries so the original content keeps
            // rendering.
            let seed = match site {
                ResourceSite::InheritedInline(dict) => dict,
                _ => Dictionary::new(),
            };
            let page_dict = doc.get_object_mut(page_id)?.as_dict_mut()?;
            page_dict.set("Resources", seed);
            let resources = page_dict
                .get_mut(b"Resources")
                .and_then(|o| o.as_dict_mut())?;
            insert_overlay_font(resources, font_id);
            Ok(())
        }
    }
}

fn font_dict_ref(resources: &Dictionary) -> Option<ObjectId> {
    match resources.get(b"Font") {
        Ok(Object::Reference(fid)) => Some(*fid),
        _ => None,
    }
}

fn add_font_entry(
    doc: &mut Document,
    fonts_id: ObjectId,
    font_id: ObjectId,
) -> Result<(), lopdf::Error> {
    let fonts = doc.get_object_mut(fonts_id)?.as_dict_mut()?;
    if !fonts.has(OVERLAY_FONT_NAME.as_bytes()) {
        fonts.set(OVERLAY_FONT_NAME, Object::Reference(font_id));
    }
    Ok(())
}

/// Classify where a page's effective Resources dictionary lives.
fn locate_resources(doc: &Document, page_id: ObjectId) -> ResourceSite {
    let mut current = page_id;
    for depth in 0..64 {
        let Ok(dict) = doc.get_object(current).and_then(|o| o.as_dict()) else {
            return ResourceSite::Missing;
        };
        match dict.get(b"Resources") {
            Ok(Object::Reference(rid)) => return ResourceSite::Indirect(*rid),
            Ok(Object::Dictionary(inline)) => {
                return if depth == 0 {
                    ResourceSite::PageInline
                } else {
                    ResourceSite::InheritedInline(inline.clone())
                };
            }
            _ => {}
        }
        match dict.get(b"Parent").and_then(|p| p.as_reference()) {
            Ok(parent) => current = parent,
            Err(_) => return ResourceSite::Missing,
        }
    }
    ResourceSite::Missing
}

fn page_resources_dict(doc: &Document, page_id: ObjectId) -> Result<&Dictionary, lopdf::Error> {
    doc.get_object(page_id)?
        .as_dict()?
        .get(b"Resources")?
        .as_dict()
}

/// Add the overlay font to an inline `/Font` sub-dictionary, creating it if
/// missing and keeping any entries already present.
fn insert_overlay_font(resources: &mut Dictionary, font_id: ObjectId) {
    if !matches!(resources.get(b"Font"), Ok(Object::Dictionary(_))) {
        resources.set("Font", Dictionary::new());
    }
    if let Ok(fonts) = resources.get_mut(b"Font").and_then(|o| o.as_dict_mut()) {
        if !fonts.has(OVERLAY_FONT_NAME.as_bytes()) {
            fonts.set(OVERLAY_FONT_NAME, Object::Reference(font_id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{ExtractionResult, FieldValue};
    use crate::pipeline::text::Word;

    fn result_of(pairs: &[(&str, FieldValue)]) -> ExtractionResult {
        ExtractionResult::from_pairs(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone())),
        )
    }

    fn page_with_words(words: Vec<Word>) -> PageWords {
        PageWords {
            page_index: 0,
            width: 612.0,
            height: 792.0,
            words,
        }
    }

    fn word(text: &str, x0: f32, x1: f32, top: f32, bottom: f32) -> Word {
        Word {
            text: text.into(),
            x0,
            x1,
            top,
            bottom,
        }
    }

    #[test]
    fn normalize_replaces_separators_and_case() {
        assert_eq!(normalize_field_name("Incident_Date"), "incident date");
        assert_eq!(normalize_field_name("a-b.c"), "a b c");
    }

    #[test]
    fn anchor_uses_first_match_and_converts_y() {
        let pages = vec![page_with_words(vec![
            word("Report", 50.0, 90.0, 80.0, 92.0),
            word("incident", 100.0, 150.0, 100.0, 112.0),
            word("incident", 100.0, 150.0, 300.0, 312.0),
        ])];
        let values = result_of(&[(
            "incident_date",
            FieldValue::Single("2021-05-01".into()),
        )]);
        let anchors = locate_field_anchors(&pages, &values, 5.0);
        assert_eq!(anchors.len(), 1);
        let a = &anchors[0];
        assert_eq!(a.page, 0);
        assert!((a.x - 155.0).abs() < 0.01, "x = word.x1 + 5");
        assert!((a.y - (792.0 - 112.0)).abs() < 0.01, "y = height - bottom");
        assert_eq!(a.value, "2021-05-01");
    }

    #[test]
    fn absent_values_get_no_anchor() {
        let pages = vec![page_with_words(vec![word(
            "incident", 100.0, 150.0, 100.0, 112.0,
        )])];
        let values = result_of(&[("incident_date", FieldValue::Absent)]);
        assert!(locate_field_anchors(&pages, &values, 5.0).is_empty());
    }

    #[test]
    fn unmatched_fields_are_skipped() {
        let pages = vec![page_with_words(vec![word(
            "unrelated", 10.0, 40.0, 10.0, 20.0,
        )])];
        let values = result_of(&[("phone_number", FieldValue::Single("555".into()))]);
        assert!(locate_field_anchors(&pages, &values, 5.0).is_empty());
    }

    #[test]
    fn match_works_in_both_directions() {
        // Field name contained in the label word…
        let pages = vec![page_with_words(vec![word(
            "Name:", 10.0, 40.0, 10.0, 20.0,
        )])];
        let values = result_of(&[("name", FieldValue::Single("John".into()))]);
        assert_eq!(locate_field_anchors(&pages, &values, 5.0).len(), 1);

        // …and the label word contained in the (normalized) field name.
        let pages = vec![page_with_words(vec![word(
            "incident", 10.0, 40.0, 10.0, 20.0,
        )])];
        let values = result_of(&[(
            "incident_date",
            FieldValue::Single("2021-05-01".into()),
        )]);
        assert_eq!(locate_field_anchors(&pages, &values, 5.0).len(), 1);
    }
}
