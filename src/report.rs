//! Result types returned by the top-level fill entry points.

use crate::fields::{ExtractionResult, FieldCoordinate, FieldDescriptor};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of a complete fill run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillOutput {
    /// Where the filled PDF was written (input path + `_filled` suffix).
    pub output_path: PathBuf,

    /// The fields the run targeted, with their descriptions.
    pub fields: Vec<FieldDescriptor>,

    /// Extracted field values (absent values are explicit nulls).
    pub values: ExtractionResult,

    /// How many interactive widgets received a value.
    pub widgets_filled: usize,

    /// Overlay placements used by the flat-PDF fallback (empty when the
    /// interactive pass filled anything).
    pub overlays: Vec<FieldCoordinate>,

    /// True when extraction fell back to all-null values (the model's reply
    /// was unusable). The output PDF exists but nothing was filled.
    pub degraded: bool,

    /// Per-stage wall-clock timings.
    pub stats: FillStats,
}

/// Wall-clock timings for the pipeline stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FillStats {
    /// Field discovery, including its LLM call when one was made.
    pub discovery_ms: u64,
    /// The value-extraction LLM call plus response parsing.
    pub extraction_ms: u64,
    /// PDF mutation and save.
    pub fill_ms: u64,
    /// End-to-end duration.
    pub total_ms: u64,
}
