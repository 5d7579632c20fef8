// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Missing required keys are fatal at startup; everything else has a
//! sensible default for local development.

use std::env;
use std::path::PathBuf;

pub const DEFAULT_STORAGE_BUCKET: &str = "diary-images";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-lite";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_IMAGE_API_URL: &str =
    "https://ark.cn-beijing.volces.com/api/v3/images/generations";
pub const DEFAULT_IMAGE_MODEL: &str = "doubao-seedream-3-0-t2i-250415";
pub const DEFAULT_UPLOAD_DIR: &str = "public/uploads/images";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Managed backend ---
    /// Supabase project URL (no trailing slash)
    pub supabase_url: String,
    /// Public anon key, sent as `apikey` on user-scoped requests
    pub supabase_anon_key: String,
    /// Service-role key, used for object storage only
    pub supabase_service_role_key: String,
    /// JWT secret for local token verification (optional)
    pub supabase_jwt_secret: Option<Vec<u8>>,
    /// Object storage bucket for generated images
    pub storage_bucket: String,

    // --- Generative APIs ---
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub image_api_key: String,
    pub image_api_url: String,
    pub image_model: String,

    // --- Server ---
    /// Local fallback directory for images, served at `/uploads/images`
    pub upload_dir: PathBuf,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Server port
    pub port: u16,
}

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            supabase_url: required("SUPABASE_URL")?
                .trim_end_matches('/')
                .to_string(),
            supabase_anon_key: required("SUPABASE_ANON_KEY")?,
            supabase_service_role_key: required("SUPABASE_SERVICE_ROLE_KEY")?,
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(String::into_bytes),
            storage_bucket: env::var("STORAGE_BUCKET")
                .unwrap_or_else(|_| DEFAULT_STORAGE_BUCKET.to_string()),

            gemini_api_key: required("GEMINI_API_KEY")?,
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_MODEL.to_string()),
            gemini_base_url: env::var("GEMINI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_GEMINI_BASE_URL.to_string()),
            image_api_key: required("IMAGE_API_KEY")?,
            image_api_url: env::var("IMAGE_API_URL")
                .unwrap_or_else(|_| DEFAULT_IMAGE_API_URL.to_string()),
            image_model: env::var("IMAGE_MODEL")
                .unwrap_or_else(|_| DEFAULT_IMAGE_MODEL.to_string()),

            upload_dir: env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| DEFAULT_UPLOAD_DIR.to_string())
                .into(),
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
        })
    }

    /// Config for tests; points every upstream at an unroutable host.
    pub fn test_default() -> Self {
        Self {
            supabase_url: "http://127.0.0.1:9".to_string(),
            supabase_anon_key: "test_anon_key".to_string(),
            supabase_service_role_key: "test_service_role_key".to_string(),
            supabase_jwt_secret: Some(b"test_jwt_secret_32_bytes_minimum!".to_vec()),
            storage_bucket: DEFAULT_STORAGE_BUCKET.to_string(),
            gemini_api_key: "test_gemini_key".to_string(),
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_base_url: "http://127.0.0.1:9".to_string(),
            image_api_key: "test_image_key".to_string(),
            image_api_url: "http://127.0.0.1:9/images/generations".to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            upload_dir: env::temp_dir().join("mars-diary-test-uploads"),
            frontend_url: "http://localhost:3000".to_string(),
            port: 8080,
        }
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key)
        .map(|v| v.trim().to_string())
        .ok()
        .filter(|v| !v.is_empty())
        .ok_or(ConfigError::Missing(key))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
