// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Diary routes: generation (public) and the caller's timeline (auth).

use crate::error::{AppError, Result};
use crate::models::{DiaryEntry, DiarySummary, MarsDiary, NewDiaryEntry, VerifiedUser};
use crate::routes::extract::{AppJson, AppQuery};
use crate::time_utils::earth_date_to_sol;
use crate::AppState;
use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

const LIST_TIMEOUT: Duration = Duration::from_secs(10);
const LIST_CACHE_CONTROL: &str = "private, max-age=30";

/// Generation routes; no account needed.
pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/diary", post(generate_diary))
        .route("/diary/regenerate", post(regenerate_diary))
}

/// Timeline routes. The auth middleware is applied in routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/diary/save", post(save_diary))
        .route("/diary/list", get(list_diaries))
        .route("/diary/delete", delete(delete_diary))
        .route("/me", get(get_me))
}

// ─── Generation ──────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(default)]
    earth_diary: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegenerateRequest {
    #[serde(default)]
    earth_diary: String,
    /// Sol from the first round; today's sol when absent
    sol_number: Option<u64>,
}

/// Turn an Earth diary into a Mars diary for today's sol.
async fn generate_diary(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<GenerateRequest>,
) -> Result<Json<MarsDiary>> {
    let sol_number = earth_date_to_sol(Utc::now());
    let diary = state
        .diary_service
        .generate(&req.earth_diary, sol_number)
        .await?;
    Ok(Json(diary))
}

/// Another take on the same diary, keeping the original sol.
async fn regenerate_diary(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<RegenerateRequest>,
) -> Result<Json<MarsDiary>> {
    let sol_number = req
        .sol_number
        .unwrap_or_else(|| earth_date_to_sol(Utc::now()));

    tracing::debug!(sol_number, "Regenerating Mars diary");
    let diary = state
        .diary_service
        .generate(&req.earth_diary, sol_number)
        .await?;
    Ok(Json(diary))
}

// ─── Save ────────────────────────────────────────────────────

const MISSING_CONTENT: &str = "地球日记和火星日记内容不能为空";

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SaveDiaryRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "地球日记和火星日记内容不能为空"))]
    pub earth_diary: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "地球日记和火星日记内容不能为空"))]
    pub mars_diary: String,
    #[serde(default)]
    pub mars_event: Option<String>,
    #[serde(default)]
    #[validate(length(max = 2048, message = "图片地址过长"))]
    pub image_url: Option<String>,
    #[serde(default)]
    pub sol_number: Option<u64>,
}

impl SaveDiaryRequest {
    fn into_new_entry(self) -> Result<NewDiaryEntry> {
        let earth_diary = self.earth_diary.trim().to_string();
        let mars_diary = self.mars_diary.trim().to_string();
        if earth_diary.is_empty() || mars_diary.is_empty() {
            return Err(AppError::Validation(MISSING_CONTENT.to_string()));
        }

        let now = Utc::now();
        Ok(NewDiaryEntry {
            earth_diary,
            mars_diary,
            mars_event: non_empty(self.mars_event),
            image_url: non_empty(self.image_url),
            sol_number: self.sol_number.unwrap_or_else(|| earth_date_to_sol(now)),
            created_at: now,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SaveDiaryResponse {
    pub success: bool,
    pub message: String,
    pub diary: DiaryEntry,
}

/// Save a finished diary to the caller's timeline.
async fn save_diary(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<VerifiedUser>,
    AppJson(req): AppJson<SaveDiaryRequest>,
) -> Result<Json<SaveDiaryResponse>> {
    req.validate()?;
    let entry = req.into_new_entry()?;

    let diary = state.diaries.insert(&user, entry).await?;

    Ok(Json(SaveDiaryResponse {
        success: true,
        message: "日记保存成功！".to_string(),
        diary,
    }))
}

// ─── List ────────────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DiaryListResponse {
    pub diaries: Vec<DiarySummary>,
}

/// The caller's most recent diaries, newest first.
async fn list_diaries(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<VerifiedUser>,
) -> Result<impl IntoResponse> {
    let diaries = tokio::time::timeout(LIST_TIMEOUT, state.diaries.list(&user))
        .await
        .map_err(|_| AppError::Persistence("Diary list timed out".to_string()))??;

    Ok((
        [(header::CACHE_CONTROL, LIST_CACHE_CONTROL)],
        Json(DiaryListResponse { diaries }),
    ))
}

// ─── Delete ──────────────────────────────────────────────────

#[derive(Deserialize)]
struct DeleteQuery {
    id: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteDiaryResponse {
    pub success: bool,
    pub message: String,
}

/// Delete one of the caller's diaries and, best effort, its image.
async fn delete_diary(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<VerifiedUser>,
    AppQuery(query): AppQuery<DeleteQuery>,
) -> Result<Json<DeleteDiaryResponse>> {
    let id = query
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::Validation("缺少日记ID参数".to_string()))?;

    let deleted = state.diaries.delete(&user, id).await?;

    // Entry is already gone; image cleanup failures only get logged.
    if let Some(image_url) = deleted.image_url.as_deref() {
        match state
            .diary_service
            .images()
            .remove(image_url, &user.id)
            .await
        {
            Ok(removed) => {
                tracing::debug!(diary_id = %deleted.id, removed, "Image cleanup finished")
            }
            Err(e) => {
                tracing::warn!(diary_id = %deleted.id, error = %e, "Image cleanup failed")
            }
        }
    }

    Ok(Json(DeleteDiaryResponse {
        success: true,
        message: "日记删除成功！".to_string(),
    }))
}

// ─── Current user ────────────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MeResponse {
    pub id: String,
    pub email: Option<String>,
}

async fn get_me(Extension(user): Extension<VerifiedUser>) -> Json<MeResponse> {
    Json(MeResponse {
        id: user.id,
        email: user.email,
    })
}
