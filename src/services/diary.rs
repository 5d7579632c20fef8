// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Earth diary → Mars diary pipeline.
//!
//! Handles:
//! - Input validation (before any model call)
//! - Narrative generation with sampled flavor events
//! - Scene extraction → translation → image generation → persistence

use crate::error::AppError;
use crate::models::MarsDiary;
use crate::services::gemini::{TextModel, NARRATIVE_SAMPLING, SCENE_SAMPLING};
use crate::services::image_gen::ImageModel;
use crate::services::image_store::{ImagePersistence, PersistedImage};
use crate::services::prompt;
use crate::time_utils::format_sol_date;
use std::sync::Arc;

pub const MIN_DIARY_CHARS: usize = 20;
pub const MAX_DIARY_CHARS: usize = 2000;

/// Trim and length-check a submitted Earth diary.
pub fn validate_earth_diary(raw: &str) -> Result<&str, AppError> {
    let cleaned = raw.trim();
    let chars = cleaned.chars().count();

    if chars < MIN_DIARY_CHARS {
        return Err(AppError::Validation(format!(
            "日记内容至少需要{}个字符",
            MIN_DIARY_CHARS
        )));
    }
    if chars > MAX_DIARY_CHARS {
        return Err(AppError::Validation(format!(
            "日记内容不能超过{}个字符",
            MAX_DIARY_CHARS
        )));
    }
    Ok(cleaned)
}

/// Orchestrates the generative models and image persistence.
#[derive(Clone)]
pub struct DiaryService {
    text_model: Arc<dyn TextModel>,
    image_model: Arc<dyn ImageModel>,
    images: ImagePersistence,
}

impl DiaryService {
    pub fn new(
        text_model: Arc<dyn TextModel>,
        image_model: Arc<dyn ImageModel>,
        images: ImagePersistence,
    ) -> Self {
        Self {
            text_model,
            image_model,
            images,
        }
    }

    pub fn images(&self) -> &ImagePersistence {
        &self.images
    }

    /// Generate a Mars diary for `earth_diary`, signed with `sol_number`.
    ///
    /// Stateless: calling it again with the same input is a regeneration.
    pub async fn generate(&self, earth_diary: &str, sol_number: u64) -> Result<MarsDiary, AppError> {
        let cleaned = validate_earth_diary(earth_diary)?;

        // ThreadRng is not Send; keep it out of scope across the await below.
        let events = prompt::sample_events(&mut rand::thread_rng());
        let mars_prompt = prompt::build_mars_prompt(cleaned, sol_number, &events);

        tracing::info!(
            sol = %format_sol_date(sol_number),
            input_chars = cleaned.chars().count(),
            events = events.len(),
            "Generating Mars diary"
        );

        let mars_diary = self
            .text_model
            .generate(&mars_prompt, &NARRATIVE_SAMPLING)
            .await?;

        Ok(MarsDiary {
            mars_diary,
            mars_event: prompt::describe_events(&events),
            sol_number,
        })
    }

    /// Pull a short visual scene out of a generated narrative.
    pub async fn extract_scene(&self, mars_diary: &str) -> Result<String, AppError> {
        let raw = self
            .text_model
            .generate(&prompt::build_scene_prompt(mars_diary), &SCENE_SAMPLING)
            .await?;
        let scene = prompt::clean_scene(&raw);
        if scene.is_empty() {
            return Err(AppError::Generation("Scene extraction was empty".to_string()));
        }
        Ok(scene)
    }

    /// Translate a scene description for the image model.
    pub async fn translate_scene(&self, scene: &str) -> Result<String, AppError> {
        let translated = self
            .text_model
            .generate(&prompt::build_translation_prompt(scene), &SCENE_SAMPLING)
            .await?;
        let translated = translated.trim();
        if translated.is_empty() {
            return Err(AppError::Generation("Scene translation was empty".to_string()));
        }
        Ok(translated.to_string())
    }

    /// Full image pipeline for one narrative, stored under `user_id`.
    pub async fn illustrate(
        &self,
        mars_diary: &str,
        user_id: &str,
    ) -> Result<PersistedImage, AppError> {
        let scene = self.extract_scene(mars_diary).await?;
        let translated = self.translate_scene(&scene).await?;
        let image_prompt = prompt::build_image_prompt(&translated);

        tracing::debug!(user_id, scene = %scene, prompt = %image_prompt.prompt, "Generating image");

        let generated = self.image_model.generate(&image_prompt).await?;
        let persisted = self
            .images
            .persist(&generated.into_source_url(), user_id)
            .await;

        tracing::info!(user_id, status = persisted.status(), "Image pipeline complete");
        Ok(persisted)
    }
}
