// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Gemini text-generation client.
//!
//! One `generateContent` call per prompt; no retries. Any transport error,
//! non-success status or empty candidate is reported as
//! [`AppError::Generation`].

use crate::error::AppError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Fixed sampling parameters for a generation call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

/// Sampling for the diary narrative.
pub const NARRATIVE_SAMPLING: SamplingConfig = SamplingConfig {
    temperature: 0.7,
    top_p: 0.8,
    top_k: 40,
    max_output_tokens: 1024,
};

/// Sampling for scene extraction and translation.
pub const SCENE_SAMPLING: SamplingConfig = SamplingConfig {
    temperature: 0.4,
    top_p: 0.8,
    top_k: 40,
    max_output_tokens: 256,
};

/// Text-generation backend.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Generate text for `prompt`. Returns non-empty text or an error.
    async fn generate(&self, prompt: &str, sampling: &SamplingConfig) -> Result<String, AppError>;
}

/// Gemini REST client.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: [Content<'a>; 1],
    generation_config: &'a SamplingConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: [Part<'a>; 1],
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate, if any.
    fn into_text(self) -> Option<String> {
        let content = self.candidates.into_iter().next()?.content?;
        let text: String = content.parts.into_iter().filter_map(|p| p.text).collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[async_trait]
impl TextModel for GeminiClient {
    async fn generate(&self, prompt: &str, sampling: &SamplingConfig) -> Result<String, AppError> {
        let body = GenerateContentRequest {
            contents: [Content {
                role: "user",
                parts: [Part { text: prompt }],
            }],
            generation_config: sampling,
        };

        let response = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Generation(format!("Gemini request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Generation(format!(
                "Gemini HTTP {}: {}",
                status, body
            )));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AppError::Generation(format!("Gemini JSON parse error: {}", e)))?;

        let text = parsed
            .into_text()
            .ok_or_else(|| AppError::Generation("Gemini returned no text".to_string()))?;

        tracing::debug!(
            model = %self.model,
            prompt_chars = prompt.chars().count(),
            output_chars = text.chars().count(),
            "Gemini generation complete"
        );

        Ok(text)
    }
}
