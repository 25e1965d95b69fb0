//! Pipeline stages for LLM-driven form filling.
//!
//! Each submodule implements exactly one transformation step. Keeping stages
//! separate makes each independently testable and lets us swap
//! implementations (e.g. a layout-aware flat-fill strategy) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ discover ──▶ llm ──▶ parse ──▶ fill
//! (path)    (fields)   (extract) (values)  (widgets / overlay)
//! ```
//!
//! 1. [`input`]    — validate the path and load the document
//! 2. [`discover`] — field names from the AcroForm, or inferred by the model
//! 3. [`llm`]      — the only stage with network I/O
//! 4. [`parse`]    — tolerant reply decoding; never fails, only degrades
//! 5. [`text`]     — word-position extraction feeding the flat fallback
//! 6. [`fill`]     — widget values, appearance invalidation, overlay stamping

pub mod discover;
pub mod fill;
pub mod input;
pub mod llm;
pub mod parse;
pub mod text;
