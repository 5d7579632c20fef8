// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Mars Diary: turn an Earth diary into a Martian colonist's log
//!
//! This crate provides the backend API: narrative and image generation,
//! image persistence with fallbacks, a same-origin image proxy, and a
//! per-user diary timeline stored in Supabase.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::{DiaryStore, SupabaseDiaryStore};
use services::{
    DiaryService, GeminiClient, IdentityProvider, ImageGenClient, ImagePersistence, ImageProxy,
    JwtIdentityProvider, LocalImageStore, SupabaseAuth, SupabaseStorage,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub identity: Arc<dyn IdentityProvider>,
    pub diaries: Arc<dyn DiaryStore>,
    pub diary_service: DiaryService,
    pub proxy: ImageProxy,
}

impl AppState {
    /// Wire the production clients from configuration.
    pub fn from_config(config: Config) -> Self {
        let identity: Arc<dyn IdentityProvider> = match &config.supabase_jwt_secret {
            Some(secret) => {
                tracing::info!("Verifying access tokens locally (HS256)");
                Arc::new(JwtIdentityProvider::new(secret))
            }
            None => {
                tracing::info!("Verifying access tokens via Supabase Auth");
                Arc::new(SupabaseAuth::new(
                    &config.supabase_url,
                    &config.supabase_anon_key,
                ))
            }
        };

        let diaries = Arc::new(SupabaseDiaryStore::new(
            &config.supabase_url,
            &config.supabase_anon_key,
        ));

        let object_store = Arc::new(SupabaseStorage::new(
            &config.supabase_url,
            &config.storage_bucket,
            &config.supabase_service_role_key,
        ));
        let local = LocalImageStore::new(config.upload_dir.clone());
        let images = ImagePersistence::new(object_store, local.clone());

        let text_model = Arc::new(GeminiClient::new(
            &config.gemini_base_url,
            &config.gemini_model,
            &config.gemini_api_key,
        ));
        let image_model = Arc::new(ImageGenClient::new(
            &config.image_api_url,
            &config.image_model,
            &config.image_api_key,
        ));

        Self {
            identity,
            diaries,
            diary_service: DiaryService::new(text_model, image_model, images),
            proxy: ImageProxy::new(local),
            config,
        }
    }
}
