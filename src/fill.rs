//! Top-level fill entry points.
//!
//! [`fill`] runs the whole pipeline for one document; [`discover`] runs only
//! the field-discovery front half; [`fill_with_values`] applies values the
//! caller already has. All three are `async`; [`fill_sync`] wraps [`fill`]
//! for blocking callers.
//!
//! A run issues at most two sequential LLM calls (discovery, extraction),
//! one PDF read, and one PDF write. Nothing is written until the pipeline has
//! values in hand — a fatal error part-way never leaves a partial output
//! file behind.

use crate::config::FillConfig;
use crate::error::FormFillError;
use crate::fields::{ExtractionRequest, ExtractionResult, FieldDescriptor};
use crate::pipeline::{discover, fill as filler, input, llm::LlmClient, parse, text};
use crate::prompts;
use crate::report::{FillOutput, FillStats};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Fill the form at `input_path` with values extracted from `transcript`.
///
/// # Errors
/// Fatal conditions only: unreadable/corrupt input, invalid request shape,
/// LLM unreachable or erroring, no fields detected, output write failure.
/// A *malformed* LLM reply is not fatal — the run degrades to null values
/// and reports `degraded = true` on the output.
pub async fn fill(
    input_path: impl AsRef<Path>,
    transcript: &str,
    config: &FillConfig,
) -> Result<FillOutput, FormFillError> {
    let total_start = Instant::now();
    let input_path = input_path.as_ref();
    info!(path = %input_path.display(), "starting fill run");

    // ── Step 1: Load and read the document ───────────────────────────────
    let mut doc = input::load_pdf(input_path)?;
    let form_text = text::extract_text(&doc);
    let client = LlmClient::new(config)?;

    // ── Step 2: Discover fields ──────────────────────────────────────────
    let discovery_start = Instant::now();
    let fields = discover::discover_fields(&doc, &form_text, &client, config).await?;
    let discovery_ms = discovery_start.elapsed().as_millis() as u64;
    if fields.is_empty() {
        return Err(FormFillError::NoFieldsDetected {
            path: input_path.to_path_buf(),
        });
    }
    info!(count = fields.len(), "fields to fill");

    // ── Step 3: Extract values ───────────────────────────────────────────
    let names: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
    let request = ExtractionRequest::new(transcript, names, Some(form_text))?;

    let extraction_start = Instant::now();
    let values = extract_values(&request, &client, config).await?;
    let extraction_ms = extraction_start.elapsed().as_millis() as u64;

    let degraded = values.is_all_absent();
    if degraded {
        warn!("extraction degraded to all-null values; proceeding (nothing will be filled)");
    }

    // ── Step 4: Apply values and save ────────────────────────────────────
    let fill_start = Instant::now();
    let (output_path, widgets_filled, overlays) =
        apply_and_save(&mut doc, input_path, &values, config)?;
    let fill_ms = fill_start.elapsed().as_millis() as u64;

    let stats = FillStats {
        discovery_ms,
        extraction_ms,
        fill_ms,
        total_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        output = %output_path.display(),
        widgets_filled,
        overlays = overlays.len(),
        total_ms = stats.total_ms,
        "fill run complete"
    );

    Ok(FillOutput {
        output_path,
        fields,
        values,
        widgets_filled,
        overlays,
        degraded,
        stats,
    })
}

/// Run field discovery alone — what an API front-end shows the user before
/// they submit text.
pub async fn discover(
    input_path: impl AsRef<Path>,
    config: &FillConfig,
) -> Result<Vec<FieldDescriptor>, FormFillError> {
    let input_path = input_path.as_ref();
    let doc = input::load_pdf(input_path)?;
    let form_text = text::extract_text(&doc);
    let client = LlmClient::new(config)?;
    let fields = discover::discover_fields(&doc, &form_text, &client, config).await?;
    if fields.is_empty() {
        return Err(FormFillError::NoFieldsDetected {
            path: input_path.to_path_buf(),
        });
    }
    Ok(fields)
}

/// Apply caller-provided values to the form, skipping extraction entirely.
/// No LLM call is made.
pub async fn fill_with_values(
    input_path: impl AsRef<Path>,
    values: &ExtractionResult,
    config: &FillConfig,
) -> Result<FillOutput, FormFillError> {
    let total_start = Instant::now();
    let input_path = input_path.as_ref();
    if values.is_empty() {
        return Err(FormFillError::InvalidInput {
            detail: "value mapping must not be empty".into(),
        });
    }

    let mut doc = input::load_pdf(input_path)?;

    let fill_start = Instant::now();
    let (output_path, widgets_filled, overlays) =
        apply_and_save(&mut doc, input_path, values, config)?;
    let fill_ms = fill_start.elapsed().as_millis() as u64;

    Ok(FillOutput {
        output_path,
        fields: values
            .iter()
            .map(|(name, _)| FieldDescriptor::bare(name))
            .collect(),
        values: values.clone(),
        widgets_filled,
        overlays,
        degraded: values.is_all_absent(),
        stats: FillStats {
            discovery_ms: 0,
            extraction_ms: 0,
            fill_ms,
            total_ms: total_start.elapsed().as_millis() as u64,
        },
    })
}

/// Synchronous wrapper around [`fill`].
///
/// Creates a temporary tokio runtime internally.
pub fn fill_sync(
    input_path: impl AsRef<Path>,
    transcript: &str,
    config: &FillConfig,
) -> Result<FillOutput, FormFillError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| FormFillError::Internal(format!("Failed to create tokio runtime: {e}")))?
        .block_on(fill(input_path, transcript, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────────

/// One LLM extraction call plus tolerant parsing.
async fn extract_values(
    request: &ExtractionRequest,
    client: &LlmClient,
    config: &FillConfig,
) -> Result<ExtractionResult, FormFillError> {
    let prompt = prompts::extraction_prompt(
        request.transcript(),
        request.fields(),
        request.context(),
    );
    let format = config
        .schema_hints
        .then(|| prompts::extraction_format(request.fields()));

    match client.generate(&prompt, format.as_ref()).await {
        Ok(raw) => Ok(parse::parse_extraction(&raw, request.fields())),
        // A malformed reply envelope degrades like a malformed payload: the
        // documented null fallback, never a lost run.
        Err(FormFillError::MalformedReply { snippet }) => {
            warn!(%snippet, "reply envelope undecodable; degrading to all-null");
            Ok(ExtractionResult::all_absent(request.fields()))
        }
        Err(e) => Err(e),
    }
}

/// The write half: interactive pass, flat fallback when it filled nothing,
/// then save to the derived output path.
fn apply_and_save(
    doc: &mut lopdf::Document,
    input_path: &Path,
    values: &ExtractionResult,
    config: &FillConfig,
) -> Result<(std::path::PathBuf, usize, Vec<crate::fields::FieldCoordinate>), FormFillError> {
    let widgets_filled = filler::fill_widgets(doc, values);

    // The fallback trigger is "nothing got filled", decided only after the
    // full interactive pass over every page.
    let overlays = if widgets_filled == 0 {
        debug!("no widgets filled; running flat-form fallback");
        let pages = text::extract_words(doc);
        let anchors = filler::locate_field_anchors(&pages, values, config.overlay_offset);
        filler::stamp_overlays(doc, &anchors, config.overlay_font_size).map_err(|e| {
            FormFillError::PdfParse {
                path: input_path.to_path_buf(),
                detail: format!("overlay stamping failed: {e}"),
            }
        })?;
        anchors
    } else {
        Vec::new()
    };

    let output_path = input::derive_output_path(input_path);
    doc.save(&output_path)
        .map_err(|e| FormFillError::OutputWriteFailed {
            path: output_path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        })?;

    Ok((output_path, widgets_filled, overlays))
}
