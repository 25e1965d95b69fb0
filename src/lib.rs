//! # formfill
//!
//! Fill PDF form fields using values extracted from free text by a
//! locally-hosted LLM (any server speaking the Ollama `/api/generate`
//! protocol).
//!
//! ## Why this crate?
//!
//! Form data usually arrives as prose — a dictated note, an email, a call
//! transcript — while the PDF wants discrete field values. This crate asks a
//! local model to do the mapping, then writes the answers back into the PDF:
//! into its interactive widgets when it has them, or as text stamped next to
//! the matching label when it is a flat scan-style form.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF + free text
//!  │
//!  ├─ 1. Discover  field names from the AcroForm, or inferred by the model
//!  ├─ 2. Prompt    one instruction asking for a JSON object of values
//!  ├─ 3. Generate  single non-streaming call to {host}/api/generate
//!  ├─ 4. Parse     tolerant JSON decoding (fences, wrappers, singletons)
//!  └─ 5. Fill      widget /V values + /AP invalidation, or label-anchored
//!                  overlay text for flat PDFs
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use formfill::{fill, FillConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Endpoint and model come from OLLAMA_HOST / OLLAMA_MODEL, with
//!     // local defaults.
//!     let config = FillConfig::from_env();
//!     let output = fill(
//!         "intake.pdf",
//!         "John Doe was admitted on 2020-01-01 complaining of back pain.",
//!         &config,
//!     )
//!     .await?;
//!     println!("wrote {}", output.output_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Degradation, not surprises
//!
//! The model is untrusted input. A reply the parser cannot use degrades the
//! run to explicit nulls (`FillOutput::degraded`) rather than failing it;
//! only *transport* problems (server unreachable, HTTP error status) abort,
//! and those keep distinct error variants so callers can react precisely.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `formfill` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod fields;
pub mod fill;
pub mod pipeline;
pub mod prompts;
pub mod report;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{FillConfig, FillConfigBuilder, DEFAULT_HOST, DEFAULT_MODEL};
pub use error::FormFillError;
pub use fields::{
    ExtractionRequest, ExtractionResult, FieldCoordinate, FieldDescriptor, FieldValue,
};
pub use fill::{discover, fill, fill_sync, fill_with_values};
pub use report::{FillOutput, FillStats};
