//! Page text extraction with word-level positions.
//!
//! A deliberately small content-stream interpreter: it tracks the graphics
//! and text state needed to place text runs (`q`/`Q`/`cm`, `BT`/`ET`, `Tf`,
//! `TL`, `Td`/`TD`/`T*`/`Tm`, `Tj`/`TJ`/`'`/`"`) and nothing else. Glyph
//! advances use an average-width estimate rather than per-font metrics — the
//! flat-form fallback only needs word *anchors*, not typographically exact
//! boxes, and the estimate keeps this module free of font tables.
//!
//! Vertical coordinates in the output are **top-origin** (distance from the
//! top edge of the page), matching how layout tools report word positions.
//! Drawing code converts back with `page_height - bottom`.

use lopdf::{Document, Object};
use tracing::debug;

/// Average glyph advance as a fraction of the font size. Latin text in the
/// common PDF base fonts averages close to half an em.
const AVG_GLYPH_WIDTH: f32 = 0.5;

/// A word token with its bounding coordinates.
///
/// `x0`/`x1` are in PDF horizontal space; `top`/`bottom` are distances from
/// the top edge of the page.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    pub text: String,
    pub x0: f32,
    pub x1: f32,
    pub top: f32,
    pub bottom: f32,
}

/// All words on one page, with the page geometry needed to convert between
/// coordinate systems.
#[derive(Debug, Clone)]
pub struct PageWords {
    /// 0-based page index in document order.
    pub page_index: usize,
    pub width: f32,
    pub height: f32,
    pub words: Vec<Word>,
}

/// Text placement state (the PDF `Tm`/`Tlm` pair plus the parameters that
/// affect placement).
#[derive(Debug, Clone)]
struct TextState {
    text_matrix: [f32; 6],
    line_matrix: [f32; 6],
    font_size: f32,
    leading: f32,
}

impl Default for TextState {
    fn default() -> Self {
        TextState {
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            font_size: 0.0,
            leading: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct GraphicsState {
    ctm: Option<[f32; 6]>,
    text: TextState,
}

const IDENTITY: [f32; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn multiply(a: &[f32; 6], b: &[f32; 6]) -> [f32; 6] {
    [
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
        a[4] * b[0] + a[5] * b[2] + b[4],
        a[4] * b[1] + a[5] * b[3] + b[5],
    ]
}

fn translate(tx: f32, ty: f32) -> [f32; 6] {
    [1.0, 0.0, 0.0, 1.0, tx, ty]
}

fn transform(m: &[f32; 6], x: f32, y: f32) -> (f32, f32) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

fn operand_as_f32(obj: &Object) -> f32 {
    match obj {
        Object::Integer(i) => *i as f32,
        Object::Real(f) => *f,
        _ => 0.0,
    }
}

fn matrix_from_operands(operands: &[Object]) -> [f32; 6] {
    let mut m = IDENTITY;
    for (i, obj) in operands.iter().take(6).enumerate() {
        m[i] = operand_as_f32(obj);
    }
    m
}

/// Extract word positions for every page of the document.
pub fn extract_words(doc: &Document) -> Vec<PageWords> {
    let mut pages = Vec::new();
    for (index, (_page_num, page_id)) in doc.get_pages().into_iter().enumerate() {
        let (width, height) = page_size(doc, page_id);
        let words = match page_words(doc, page_id, height) {
            Ok(words) => words,
            Err(e) => {
                debug!(page = index, error = %e, "skipping page with undecodable content");
                Vec::new()
            }
        };
        pages.push(PageWords {
            page_index: index,
            width,
            height,
            words,
        });
    }
    pages
}

/// Extract the document's plain text, pages joined with newlines. Used as the
/// LLM's form context.
pub fn extract_text(doc: &Document) -> String {
    let mut out = String::new();
    for page in extract_words(doc) {
        let mut line = String::new();
        for word in &page.words {
            if !line.is_empty() {
                line.push(' ');
            }
            line.push_str(&word.text);
        }
        if !line.is_empty() {
            out.push_str(&line);
            out.push('\n');
        }
    }
    out.trim_end().to_string()
}

/// Page width/height from the (possibly inherited) MediaBox, defaulting to US
/// Letter when the tree is malformed.
pub fn page_size(doc: &Document, page_id: lopdf::ObjectId) -> (f32, f32) {
    if let Some(arr) = resolve_inherited(doc, page_id, b"MediaBox")
        .and_then(|obj| resolve_ref(doc, obj))
        .and_then(|obj| obj.as_array().ok())
    {
        if arr.len() == 4 {
            let x0 = operand_as_f32(&arr[0]);
            let y0 = operand_as_f32(&arr[1]);
            let x1 = operand_as_f32(&arr[2]);
            let y1 = operand_as_f32(&arr[3]);
            return ((x1 - x0).abs(), (y1 - y0).abs());
        }
    }
    (612.0, 792.0)
}

/// Walk up the page tree (via /Parent) for an inheritable key.
fn resolve_inherited<'a>(
    doc: &'a Document,
    page_id: lopdf::ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = page_id;
    for _ in 0..64 {
        let dict = doc.get_object(current).ok()?.as_dict().ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current = dict.get(b"Parent").ok()?.as_reference().ok()?;
    }
    None
}

fn resolve_ref<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

fn page_words(
    doc: &Document,
    page_id: lopdf::ObjectId,
    page_height: f32,
) -> Result<Vec<Word>, lopdf::Error> {
    let content = doc.get_and_decode_page_content(page_id)?;

    // Per-font encodings; text shown with an unknown font falls back to a
    // Latin-1 interpretation of the raw bytes.
    let encodings = doc
        .get_page_fonts(page_id)
        .map(|fonts| {
            fonts
                .iter()
                .filter_map(|(name, font)| {
                    font.get_font_encoding(doc)
                        .ok()
                        .map(|enc| (name.clone(), enc))
                })
                .collect::<std::collections::BTreeMap<_, _>>()
        })
        .unwrap_or_default();

    let mut words = Vec::new();
    let mut stack = vec![GraphicsState::default()];
    let mut current_font: Option<Vec<u8>> = None;

    for op in &content.operations {
        let gs = stack.last_mut().expect("graphics stack never empty");
        match op.operator.as_ref() {
            "q" => {
                let copy = gs.clone();
                stack.push(copy);
            }
            "Q" => {
                if stack.len() > 1 {
                    stack.pop();
                }
            }
            "cm" => {
                let m = matrix_from_operands(&op.operands);
                gs.ctm = Some(match gs.ctm {
                    Some(ctm) => multiply(&m, &ctm),
                    None => m,
                });
            }
            "BT" => {
                gs.text.text_matrix = IDENTITY;
                gs.text.line_matrix = IDENTITY;
            }
            "ET" => {}
            "Tf" => {
                if let (Some(Object::Name(name)), Some(size)) =
                    (op.operands.first(), op.operands.get(1))
                {
                    current_font = Some(name.clone());
                    gs.text.font_size = operand_as_f32(size);
                }
            }
            "TL" => {
                if let Some(l) = op.operands.first() {
                    gs.text.leading = operand_as_f32(l);
                }
            }
            "Tm" => {
                let m = matrix_from_operands(&op.operands);
                gs.text.text_matrix = m;
                gs.text.line_matrix = m;
            }
            "Td" => {
                move_text_position(&mut gs.text, &op.operands, false);
            }
            "TD" => {
                move_text_position(&mut gs.text, &op.operands, true);
            }
            "T*" => {
                next_line(&mut gs.text);
            }
            "Tj" | "TJ" => {
                show_text(
                    doc,
                    gs,
                    &op.operands,
                    current_font.as_deref(),
                    &encodings,
                    page_height,
                    &mut words,
                );
            }
            "'" => {
                next_line(&mut gs.text);
                show_text(
                    doc,
                    gs,
                    &op.operands,
                    current_font.as_deref(),
                    &encodings,
                    page_height,
                    &mut words,
                );
            }
            "\"" => {
                // Operands: word-spacing, char-spacing, string.
                next_line(&mut gs.text);
                if let Some(string) = op.operands.get(2) {
                    show_text(
                        doc,
                        gs,
                        std::slice::from_ref(string),
                        current_font.as_deref(),
                        &encodings,
                        page_height,
                        &mut words,
                    );
                }
            }
            _ => {}
        }
    }

    Ok(words)
}

fn move_text_position(state: &mut TextState, operands: &[Object], set_leading: bool) {
    let tx = operands.first().map(operand_as_f32).unwrap_or(0.0);
    let ty = operands.get(1).map(operand_as_f32).unwrap_or(0.0);
    if set_leading {
        state.leading = -ty;
    }
    state.text_matrix = multiply(&translate(tx, ty), &state.line_matrix);
    state.line_matrix = state.text_matrix;
}

fn next_line(state: &mut TextState) {
    state.text_matrix = multiply(&translate(0.0, -state.leading), &state.line_matrix);
    state.line_matrix = state.text_matrix;
}

/// Decode and place the operands of a text-showing operator, splitting the
/// run into whitespace-delimited words as it advances.
fn show_text(
    doc: &Document,
    gs: &mut GraphicsState,
    operands: &[Object],
    current_font: Option<&[u8]>,
    encodings: &std::collections::BTreeMap<Vec<u8>, lopdf::Encoding>,
    page_height: f32,
    words: &mut Vec<Word>,
) {
    let font_size = gs.text.font_size;
    if font_size <= 0.0 {
        return;
    }
    let advance_per_char = AVG_GLYPH_WIDTH * font_size;

    // Pen position in text space, advanced manually across the run.
    let mut pen_x = 0.0f32;
    let mut word_buf = String::new();
    let mut word_start = 0.0f32;

    let place = |x: f32| -> (f32, f32) {
        let (ux, uy) = transform(&gs.text.text_matrix, x, 0.0);
        match gs.ctm {
            Some(ctm) => transform(&ctm, ux, uy),
            None => (ux, uy),
        }
    };

    let flush =
        |buf: &mut String, start_x: f32, end_x: f32, words: &mut Vec<Word>| {
            if buf.is_empty() {
                return;
            }
            let (x0, y) = place(start_x);
            let (x1, _) = place(end_x);
            words.push(Word {
                text: std::mem::take(buf),
                x0,
                x1,
                top: page_height - (y + font_size),
                bottom: page_height - y,
            });
        };

    let handle_string = |bytes: &[u8],
                             pen_x: &mut f32,
                             word_buf: &mut String,
                             word_start: &mut f32,
                             words: &mut Vec<Word>| {
        let decoded = match current_font.and_then(|f| encodings.get(f)) {
            Some(encoding) => Document::decode_text(encoding, bytes)
                .unwrap_or_else(|_| bytes.iter().map(|&b| b as char).collect()),
            None => bytes.iter().map(|&b| b as char).collect(),
        };
        for ch in decoded.chars() {
            if ch.is_whitespace() {
                flush(word_buf, *word_start, *pen_x, words);
                *pen_x += advance_per_char;
                continue;
            }
            if word_buf.is_empty() {
                *word_start = *pen_x;
            }
            word_buf.push(ch);
            *pen_x += advance_per_char;
        }
    };

    for operand in operands {
        match operand {
            Object::String(bytes, _) => {
                handle_string(bytes, &mut pen_x, &mut word_buf, &mut word_start, words);
            }
            // TJ kerning adjustment: negative thousandths of an em.
            Object::Integer(i) => pen_x -= (*i as f32 / 1000.0) * font_size,
            Object::Real(f) => pen_x -= (*f / 1000.0) * font_size,
            Object::Array(items) => {
                for item in items {
                    match item {
                        Object::String(bytes, _) => {
                            handle_string(
                                bytes,
                                &mut pen_x,
                                &mut word_buf,
                                &mut word_start,
                                words,
                            );
                        }
                        Object::Integer(i) => pen_x -= (*i as f32 / 1000.0) * font_size,
                        Object::Real(f) => pen_x -= (*f / 1000.0) * font_size,
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    flush(&mut word_buf, word_start, pen_x, words);

    // Subsequent show operators continue from the advanced pen position.
    gs.text.text_matrix = multiply(&translate(pen_x, 0.0), &gs.text.text_matrix);
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{dictionary, Dictionary, Object, Stream};

    /// One page, US Letter, with the given content stream and a Helvetica
    /// font registered as /F1.
    fn test_doc(content: &[u8]) -> Document {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let content_id = doc.add_object(Object::Stream(Stream::new(
            Dictionary::new(),
            content.to_vec(),
        )));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => Object::Dictionary(dictionary! {
                "Font" => Object::Dictionary(dictionary! {
                    "F1" => font_id,
                }),
            }),
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::from(page_id)],
                "Count" => 1i64,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    #[test]
    fn words_get_positions_from_td() {
        let doc = test_doc(b"BT /F1 12 Tf 72 700 Td (incident date) Tj ET");
        let pages = extract_words(&doc);
        assert_eq!(pages.len(), 1);
        let words = &pages[0].words;
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "incident");
        assert_eq!(words[1].text, "date");
        assert!((words[0].x0 - 72.0).abs() < 0.01);
        // Baseline at y=700 → bottom measured from the top edge.
        assert!((words[0].bottom - (792.0 - 700.0)).abs() < 0.01);
        // Second word starts after "incident " (9 chars × 6pt advance).
        assert!(words[1].x0 > words[0].x1);
    }

    #[test]
    fn words_follow_tm_placement() {
        let doc = test_doc(b"BT /F1 10 Tf 1 0 0 1 100 650 Tm (Name:) Tj ET");
        let pages = extract_words(&doc);
        let words = &pages[0].words;
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].text, "Name:");
        assert!((words[0].x0 - 100.0).abs() < 0.01);
        assert!((words[0].bottom - 142.0).abs() < 0.01);
    }

    #[test]
    fn empty_page_yields_no_words() {
        let doc = test_doc(b"");
        let pages = extract_words(&doc);
        assert_eq!(pages.len(), 1);
        assert!(pages[0].words.is_empty());
        assert!((pages[0].height - 792.0).abs() < 0.01);
    }

    #[test]
    fn extract_text_joins_words() {
        let doc = test_doc(b"BT /F1 12 Tf 72 700 Td (Report of incident) Tj ET");
        assert_eq!(extract_text(&doc), "Report of incident");
    }
}
