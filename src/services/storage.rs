// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Managed object storage (Supabase Storage REST API).

use crate::error::AppError;
use async_trait::async_trait;
use axum::body::Bytes;

/// Object storage backend holding generated images.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload `bytes` at `path`; returns the object's public URL.
    async fn upload(&self, path: &str, bytes: Bytes, content_type: &str)
        -> Result<String, AppError>;

    /// Remove the object at `path`.
    async fn remove(&self, path: &str) -> Result<(), AppError>;

    /// Map a public URL produced by [`ObjectStore::upload`] back to its path.
    fn path_from_public_url(&self, url: &str) -> Option<String>;
}

/// Supabase Storage client using the service-role key.
#[derive(Clone)]
pub struct SupabaseStorage {
    http: reqwest::Client,
    base_url: String,
    bucket: String,
    service_key: String,
}

impl SupabaseStorage {
    pub fn new(base_url: &str, bucket: &str, service_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            service_key: service_key.to_string(),
        }
    }

    fn public_prefix(&self) -> String {
        format!("{}/storage/v1/object/public/{}/", self.base_url, self.bucket)
    }

    /// Public URL for an object path.
    pub fn public_url(&self, path: &str) -> String {
        format!("{}{}", self.public_prefix(), encode_path(path))
    }
}

/// Percent-encode each path segment, keeping the `/` separators.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    async fn upload(
        &self,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<String, AppError> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            encode_path(path)
        );
        let size = bytes.len();

        let response = self
            .http
            .post(&url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::Persistence(format!("Storage upload failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Persistence(format!(
                "Storage upload HTTP {}: {}",
                status, body
            )));
        }

        tracing::info!(path, size, bucket = %self.bucket, "Image uploaded to storage");
        Ok(self.public_url(path))
    }

    async fn remove(&self, path: &str) -> Result<(), AppError> {
        let url = format!("{}/storage/v1/object/{}", self.base_url, self.bucket);

        let response = self
            .http
            .delete(&url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(&serde_json::json!({ "prefixes": [path] }))
            .send()
            .await
            .map_err(|e| AppError::Persistence(format!("Storage delete failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Persistence(format!(
                "Storage delete HTTP {}: {}",
                status, body
            )));
        }

        tracing::info!(path, bucket = %self.bucket, "Image removed from storage");
        Ok(())
    }

    fn path_from_public_url(&self, url: &str) -> Option<String> {
        let encoded = url.strip_prefix(&self.public_prefix())?;
        let encoded = encoded.split(['?', '#']).next().unwrap_or_default();
        if encoded.is_empty() {
            return None;
        }
        urlencoding::decode(encoded).ok().map(|p| p.into_owned())
    }
}
