//! Gemini API client for short chat replies.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::relay::services::{ApiError, ReplyGenerator};

const GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

/// Sent when generation fails or comes back empty.
pub const FALLBACK_REPLY: &str = "Hey! How can I help you today?";

pub struct GeminiClient {
    api_key: String,
    url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<GeminiError>,
}

#[derive(Deserialize, Debug)]
struct GeminiError {
    message: String,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
}

/// Prompt for a reply of under 20 words in the cashier's voice.
pub fn build_prompt(utterance: &str, context_hint: &str) -> String {
    format!(
        r#"You are a friendly, upbeat cashier for an online game room. You help players load credits and cash out.

Situation: {context_hint}
Player said: "{utterance}"

Reply in under 20 words. Casual, warm, one or two emojis at most. No promises about money."#
    )
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self::with_url(api_key, GEMINI_API_URL.to_string())
    }

    pub fn with_url(api_key: String, url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self { api_key, url, client }
    }

    /// Generate text for `prompt`, trimmed.
    pub async fn generate(&self, prompt: &str) -> Result<String, ApiError> {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(&self.url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Http(format!("Failed to read response: {e}")))?;

        debug!("Gemini response status: {status}");

        if !status.is_success() {
            return Err(ApiError::Api(format!("{status}: {body}")));
        }

        parse_reply(&body)
    }
}

fn parse_reply(body: &str) -> Result<String, ApiError> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).map_err(|e| ApiError::Parse(e.to_string()))?;

    if let Some(error) = parsed.error {
        return Err(ApiError::Api(error.message));
    }

    let text: String = parsed
        .candidates
        .unwrap_or_default()
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    let text = text.trim();
    if text.is_empty() {
        return Err(ApiError::Empty);
    }
    Ok(text.to_string())
}

#[async_trait]
impl ReplyGenerator for GeminiClient {
    async fn reply(&self, utterance: &str, context_hint: &str) -> String {
        match self.generate(&build_prompt(utterance, context_hint)).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Reply generation failed, using fallback: {e}");
                FALLBACK_REPLY.to_string()
            }
        }
    }
}
