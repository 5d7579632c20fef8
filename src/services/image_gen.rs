// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Image-generation client (OpenAI-compatible `images/generations`).
//!
//! The response is decoded once into [`GeneratedImage`]; downstream code
//! never inspects the raw payload.

use crate::error::AppError;
use crate::services::prompt::ImagePrompt;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const IMAGE_SIZE: &str = "1024x1024";
pub const IMAGE_QUALITY: &str = "standard";

/// Result of one image generation, decoded at the API boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneratedImage {
    /// Directly fetchable (often time-limited) URL.
    Url(String),
    /// Inline image bytes, base64-encoded.
    Base64 { data: String, mime: String },
}

impl GeneratedImage {
    /// URL the persistence layer can read from (`data:` URL for inline data).
    pub fn into_source_url(self) -> String {
        match self {
            GeneratedImage::Url(url) => url,
            GeneratedImage::Base64 { data, mime } => format!("data:{};base64,{}", mime, data),
        }
    }
}

/// Image-generation backend.
#[async_trait]
pub trait ImageModel: Send + Sync {
    async fn generate(&self, prompt: &ImagePrompt) -> Result<GeneratedImage, AppError>;
}

/// HTTP client for the image-generation API.
#[derive(Clone)]
pub struct ImageGenClient {
    http: reqwest::Client,
    api_url: String,
    model: String,
    api_key: String,
}

impl ImageGenClient {
    pub fn new(api_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    negative_prompt: &'a str,
    size: &'static str,
    quality: &'static str,
    n: u8,
    response_format: &'static str,
    watermark: bool,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    url: Option<String>,
    b64_json: Option<String>,
    mime_type: Option<String>,
}

/// Decode a raw response body: URL first, inline base64 second.
pub fn parse_image_response(body: &[u8]) -> Result<GeneratedImage, AppError> {
    let parsed: ImageResponse = serde_json::from_slice(body)
        .map_err(|e| AppError::ImageResponseFormat(format!("invalid JSON: {}", e)))?;

    let datum = parsed
        .data
        .into_iter()
        .next()
        .ok_or_else(|| AppError::ImageResponseFormat("empty data array".to_string()))?;

    if let Some(url) = datum.url.filter(|u| !u.trim().is_empty()) {
        return Ok(GeneratedImage::Url(url));
    }

    if let Some(data) = datum.b64_json.filter(|d| !d.trim().is_empty()) {
        return Ok(GeneratedImage::Base64 {
            data,
            mime: datum.mime_type.unwrap_or_else(|| "image/png".to_string()),
        });
    }

    Err(AppError::ImageResponseFormat(
        "neither url nor b64_json present".to_string(),
    ))
}

#[async_trait]
impl ImageModel for ImageGenClient {
    async fn generate(&self, prompt: &ImagePrompt) -> Result<GeneratedImage, AppError> {
        let request = ImageRequest {
            model: &self.model,
            prompt: &prompt.prompt,
            negative_prompt: &prompt.negative_prompt,
            size: IMAGE_SIZE,
            quality: IMAGE_QUALITY,
            n: 1,
            response_format: "url",
            watermark: false,
        };

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::Generation(format!("Image API request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::Generation(format!("Image API body read failed: {}", e)))?;

        if !status.is_success() {
            return Err(AppError::Generation(format!(
                "Image API HTTP {}: {}",
                status,
                String::from_utf8_lossy(&body)
            )));
        }

        let image = parse_image_response(&body)?;
        tracing::info!(
            model = %self.model,
            inline = matches!(image, GeneratedImage::Base64 { .. }),
            "Image generated"
        );
        Ok(image)
    }
}
