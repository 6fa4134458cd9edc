//! Gemini `generateContent` client.

use super::TextGenerator;
use crate::config::ContentConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: [RequestContent<'a>; 1],
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: Option<String>,
    url: String,
    temperature: f32,
    max_output_tokens: u32,
}

impl GeminiClient {
    pub fn new(config: &ContentConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            url: format!(
                "{}/{}:generateContent",
                config.endpoint.trim_end_matches('/'),
                config.model
            ),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::ContentGeneration("GEMINI_API_KEY is not configured".to_string()))?;

        let body = GenerateRequest {
            contents: [RequestContent {
                parts: [RequestPart { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                top_p: 0.95,
                top_k: 40,
                max_output_tokens: max_tokens.min(self.max_output_tokens),
                response_mime_type: "text/plain",
            },
        };

        debug!(chars = prompt.len(), words = prompt.split_whitespace().count(), "Sending generation prompt");

        let response = self
            .http
            .post(&self.url)
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::ContentGeneration(format!("AI service error: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Generation request rejected");
            return Err(Error::ContentGeneration(match status {
                StatusCode::TOO_MANY_REQUESTS => "API quota exceeded. Please try again later.".to_string(),
                _ => format!("AI service error: {} {}", status, body),
            }));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::ContentGeneration(format!("Invalid AI response: {}", e.without_url())))?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| Error::ContentGeneration("AI generated empty response".to_string()))?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        let text = text.trim();

        if !text.is_empty() {
            debug!(chars = text.len(), "Generation succeeded");
            return Ok(text.to_string());
        }

        Err(Error::ContentGeneration(
            match candidate.finish_reason.as_deref() {
                Some("SAFETY") => "Content blocked by safety filters. Try a different topic.",
                Some("RECITATION") => "Content blocked due to recitation. Try being more creative.",
                Some("MAX_TOKENS") => "Prompt is too complex. Please simplify your request.",
                _ => "AI generated empty response",
            }
            .to_string(),
        ))
    }
}
