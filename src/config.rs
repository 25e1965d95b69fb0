//! Configuration for a fill run.
//!
//! All behaviour is controlled through [`FillConfig`], built via its
//! [`FillConfigBuilder`]. Configuration is *passed into* every call — nothing
//! in the library reads the environment ambiently. The one place environment
//! variables are honoured is the explicit [`FillConfig::from_env`]
//! constructor, so a run stays deterministic and testable without environment
//! mutation.
//!
//! # Design choice: builder over constructor
//! Callers set only what they care about and rely on documented defaults for
//! the rest; `build()` validates the combination once, up front.

use crate::error::FormFillError;
use serde::{Deserialize, Serialize};

/// Default LLM endpoint, the standard local Ollama address.
pub const DEFAULT_HOST: &str = "http://localhost:11434";

/// Default model name requested from the endpoint.
pub const DEFAULT_MODEL: &str = "mistral";

/// Default per-call LLM timeout in seconds.
///
/// Local models routinely take tens of seconds on CPU; 180 s sits inside the
/// recommended 120–300 s window without letting a wedged server hold a
/// request forever.
pub const DEFAULT_TIMEOUT_SECS: u64 = 180;

/// Configuration for PDF form filling.
///
/// # Example
/// ```rust
/// use formfill::FillConfig;
///
/// let config = FillConfig::builder()
///     .model("llama3")
///     .llm_timeout_secs(240)
///     .build()
///     .unwrap();
/// assert_eq!(config.model, "llama3");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillConfig {
    /// Base URL of the LLM server, without the `/api/generate` suffix.
    /// Default: [`DEFAULT_HOST`]. Trailing slashes are stripped.
    pub host: String,

    /// Model identifier sent in the generation request. Default: [`DEFAULT_MODEL`].
    pub model: String,

    /// Per-call timeout in seconds. Default: [`DEFAULT_TIMEOUT_SECS`].
    ///
    /// Expiry is reported as [`FormFillError::LlmUnavailable`], distinct from
    /// the server answering with an error status.
    pub llm_timeout_secs: u64,

    /// Send a JSON-schema `format` hint constraining the model's output
    /// grammar. Default: false.
    ///
    /// Off by default because older model servers reject unknown request
    /// members; when the server supports it, enabling this sharply reduces
    /// malformed replies.
    pub schema_hints: bool,

    /// Horizontal gap in points between a matched label word and the overlay
    /// text drawn next to it (flat-PDF fallback). Default: 5.0.
    pub overlay_offset: f32,

    /// Font size in points for overlay text. Default: 10.0.
    pub overlay_font_size: f32,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            model: DEFAULT_MODEL.to_string(),
            llm_timeout_secs: DEFAULT_TIMEOUT_SECS,
            schema_hints: false,
            overlay_offset: 5.0,
            overlay_font_size: 10.0,
        }
    }
}

impl FillConfig {
    /// Create a new builder.
    pub fn builder() -> FillConfigBuilder {
        FillConfigBuilder {
            config: Self::default(),
        }
    }

    /// Build a config from the environment: `OLLAMA_HOST` overrides the
    /// endpoint, `OLLAMA_MODEL` the model. Everything else keeps its default.
    ///
    /// This is the only environment read in the library, and it only happens
    /// when the caller asks for it.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(host) = std::env::var("OLLAMA_HOST") {
            if !host.trim().is_empty() {
                config.host = host.trim().trim_end_matches('/').to_string();
            }
        }
        if let Ok(model) = std::env::var("OLLAMA_MODEL") {
            if !model.trim().is_empty() {
                config.model = model.trim().to_string();
            }
        }
        config
    }

    /// The full generation endpoint URL.
    pub fn generate_url(&self) -> String {
        format!("{}/api/generate", self.host.trim_end_matches('/'))
    }
}

/// Builder for [`FillConfig`].
#[derive(Debug)]
pub struct FillConfigBuilder {
    config: FillConfig,
}

impl FillConfigBuilder {
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn llm_timeout_secs(mut self, secs: u64) -> Self {
        self.config.llm_timeout_secs = secs;
        self
    }

    pub fn schema_hints(mut self, v: bool) -> Self {
        self.config.schema_hints = v;
        self
    }

    pub fn overlay_offset(mut self, pts: f32) -> Self {
        self.config.overlay_offset = pts;
        self
    }

    pub fn overlay_font_size(mut self, pts: f32) -> Self {
        self.config.overlay_font_size = pts;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<FillConfig, FormFillError> {
        let c = &self.config;
        if c.host.is_empty() {
            return Err(FormFillError::InvalidConfig("host must not be empty".into()));
        }
        if c.model.is_empty() {
            return Err(FormFillError::InvalidConfig(
                "model must not be empty".into(),
            ));
        }
        if c.llm_timeout_secs == 0 || c.llm_timeout_secs > 600 {
            return Err(FormFillError::InvalidConfig(format!(
                "LLM timeout must be 1–600 seconds (120–300 recommended), got {}",
                c.llm_timeout_secs
            )));
        }
        if c.overlay_font_size <= 0.0 {
            return Err(FormFillError::InvalidConfig(format!(
                "overlay font size must be positive, got {}",
                c.overlay_font_size
            )));
        }
        Ok(self.config)
    }
}
