//! LLM interaction: one generation request, one atomic reply.
//!
//! This module is intentionally thin — all prompt engineering lives in
//! [`crate::prompts`] so it can change without touching transport or
//! error-mapping logic here.
//!
//! ## Wire protocol
//!
//! `POST {host}/api/generate` with body `{model, prompt, stream: false,
//! format?}`. `stream: false` is load-bearing: the reply must arrive as a
//! single payload whose `response` member carries the model's full text, not
//! as a sequence of partial chunks. `format`, when present, is a JSON-schema
//! grammar the server constrains its output with.
//!
//! ## Failure taxonomy
//!
//! Three conditions stay distinguishable for callers:
//!
//! * connect refused / timeout → [`FormFillError::LlmUnavailable`]
//! * non-2xx status            → [`FormFillError::LlmResponse`]
//! * undecodable reply body    → [`FormFillError::MalformedReply`]

use crate::config::FillConfig;
use crate::error::FormFillError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// Request body for the generation endpoint.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    /// Always false: the pipeline consumes exactly one atomic reply.
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a Value>,
}

/// The subset of the reply envelope the pipeline consumes.
#[derive(Debug, Deserialize)]
struct GenerateReply {
    response: String,
}

/// Client for a local `/api/generate`-style model server.
///
/// Construction is cheap; the underlying connection pool is reused across the
/// (at most two) calls a pipeline run makes.
#[derive(Debug, Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    url: String,
    model: String,
}

impl LlmClient {
    /// Build a client from the run configuration.
    pub fn new(config: &FillConfig) -> Result<Self, FormFillError> {
        let url = config.generate_url();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.llm_timeout_secs))
            .build()
            .map_err(|e| FormFillError::Internal(format!("HTTP client build failed: {e}")))?;
        Ok(LlmClient {
            http,
            url,
            model: config.model.clone(),
        })
    }

    /// The endpoint URL this client talks to (diagnostics).
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue exactly one generation request and return the model's raw text.
    pub async fn generate(
        &self,
        prompt: &str,
        format: Option<&Value>,
    ) -> Result<String, FormFillError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format,
        };
        debug!(
            url = %self.url,
            model = %self.model,
            prompt_len = prompt.len(),
            schema_hint = format.is_some(),
            "sending generation request"
        );

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| FormFillError::LlmUnavailable {
                url: self.url.clone(),
                detail: if e.is_timeout() {
                    format!("request timed out: {e}")
                } else {
                    format!("connection failed: {e}")
                },
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "LLM server returned an error response");
            return Err(FormFillError::LlmResponse {
                url: self.url.clone(),
                status: status.as_u16(),
                body: snippet(&body),
            });
        }

        let raw = response
            .text()
            .await
            .map_err(|e| FormFillError::LlmUnavailable {
                url: self.url.clone(),
                detail: format!("reply body read failed: {e}"),
            })?;

        let reply: GenerateReply =
            serde_json::from_str(&raw).map_err(|_| FormFillError::MalformedReply {
                snippet: snippet(&raw),
            })?;

        debug!(response_len = reply.response.len(), "generation complete");
        Ok(reply.response)
    }
}

/// Clip a reply body for inclusion in an error message.
fn snippet(s: &str) -> String {
    const MAX: usize = 200;
    let trimmed = s.trim();
    if trimmed.len() <= MAX {
        trimmed.to_string()
    } else {
        let mut end = MAX;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &trimmed[..end])
    }
}
