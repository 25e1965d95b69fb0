//! Error types for the formfill library.
//!
//! One enum, [`FormFillError`], covers every fatal condition the pipeline can
//! hit. The variants mirror the pipeline's failure taxonomy:
//!
//! * Input contract violations (missing file, not a PDF, bad request shape)
//!   are raised immediately and never coerced.
//! * LLM transport failures keep three *distinct* shapes — unreachable,
//!   error response, undecodable reply — so callers can tell "the service is
//!   down" apart from "the service answered garbage".
//! * Malformed response *payloads* (the model's own text) never surface here
//!   at all: the response parser degrades to null values internally.
//!
//! Every variant carries enough context (path, endpoint URL, status, reply
//! snippet) to diagnose a failure without reproducing it against a live LLM.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the formfill library.
#[derive(Debug, Error)]
pub enum FormFillError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input PDF was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    /// PDF structure could not be parsed.
    #[error("PDF '{path}' could not be parsed: {detail}")]
    PdfParse { path: PathBuf, detail: String },

    /// Transcript or field list has the wrong shape (empty, duplicated, …).
    #[error("Invalid extraction input: {detail}")]
    InvalidInput { detail: String },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// Could not reach the LLM endpoint (connection refused or timed out).
    #[error("LLM endpoint unreachable: {url}\n{detail}\nEnsure the model server is running and accessible.")]
    LlmUnavailable { url: String, detail: String },

    /// The LLM server answered with a non-success HTTP status.
    #[error("LLM endpoint {url} returned HTTP {status}: {body}")]
    LlmResponse {
        url: String,
        status: u16,
        body: String,
    },

    /// The reply envelope was not the expected `{response: …}` JSON shape.
    #[error("LLM reply could not be decoded: {snippet}")]
    MalformedReply { snippet: String },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// Field discovery found nothing to fill; the run cannot proceed.
    #[error("No fillable fields detected in '{path}'\nThe PDF has no interactive form fields and none could be inferred from its text.")]
    NoFieldsDetected { path: PathBuf },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write the filled output PDF.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FormFillError {
    /// True when the error means the LLM could not be reached at all, as
    /// opposed to answering with an error or garbage.
    pub fn is_llm_unavailable(&self) -> bool {
        matches!(self, FormFillError::LlmUnavailable { .. })
    }

    /// True for any LLM-side failure (transport, status, or envelope), the
    /// set that field discovery degrades on rather than propagating.
    pub(crate) fn is_llm_failure(&self) -> bool {
        matches!(
            self,
            FormFillError::LlmUnavailable { .. }
                | FormFillError::LlmResponse { .. }
                | FormFillError::MalformedReply { .. }
        )
    }
}
