//! Gemini API client for document Q&A.
//!
//! One call per question: the prompt embeds the (truncated) document text
//! and the user's question, and the first candidate's first text part is
//! the answer. No retries, no streaming; the only timeout is the one on the
//! HTTP client itself.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::settings::Settings;

/// Answer used when the API response carries no candidate text.
pub const NO_ANSWER_FALLBACK: &str = "No answer found in document.";

#[derive(Debug, Error)]
pub enum GeminiError {
    /// The request never produced an HTTP response (connect failure,
    /// timeout, etc.).
    #[error("request to Gemini API failed: {0}")]
    Http(#[from] reqwest::Error),
    /// The API answered with a non-success status. `message` is the
    /// upstream `error.message` when the error body has one, otherwise the
    /// HTTP status text.
    #[error("Gemini API error {status}: {message}")]
    Api { status: u16, message: String },
    /// The API answered 2xx but the body was not the expected shape.
    #[error("failed to parse Gemini API response: {0}")]
    InvalidResponse(String),
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

// ============================================================================
// Client
// ============================================================================

/// Typed client for the generateContent endpoint.
#[derive(Debug)]
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn new(settings: &Settings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            temperature: settings.temperature,
            max_output_tokens: settings.max_output_tokens,
        })
    }

    /// Send `prompt` as a single user message and return the answer text.
    ///
    /// When the response carries no candidate text, returns
    /// [`NO_ANSWER_FALLBACK`] rather than an error.
    pub async fn generate_answer(&self, prompt: &str) -> Result<String, GeminiError> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
            },
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = extract_error_message(&body).unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unknown error")
                    .to_string()
            });
            return Err(GeminiError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| GeminiError::InvalidResponse(e.to_string()))?;

        let answer = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| NO_ANSWER_FALLBACK.to_string());

        Ok(answer)
    }
}

/// Pull `error.message` out of a Gemini error body, when present.
fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value["error"]["message"].as_str().map(|s| s.to_string())
}

/// Build the fixed Q&A prompt from the document text and the question.
///
/// The document is cut to its first `max_context_chars` characters so the
/// prompt stays inside the model's context window. Truncation is
/// char-based, so it never splits a UTF-8 sequence.
pub fn build_prompt(document: &str, question: &str, max_context_chars: usize) -> String {
    let context = match document.char_indices().nth(max_context_chars) {
        Some((byte_idx, _)) => &document[..byte_idx],
        None => document,
    };

    format!(
        "Based on the following document text, answer the question. \
         If the answer is not in the document, state that you cannot find it.\n\n\
         Document:\n\"{}\"\n\n\
         Question: \"{}\"\n\n\
         Answer:",
        context, question
    )
}
