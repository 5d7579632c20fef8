// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Image routes: illustration (auth) and the image proxy (public).

use crate::error::{AppError, Result};
use crate::models::VerifiedUser;
use crate::routes::extract::{AppJson, AppQuery};
use crate::services::proxy;
use crate::AppState;
use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::Response,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

const PROXY_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

pub fn public_routes() -> Router<Arc<AppState>> {
    Router::new().route("/proxy-image", get(proxy_image))
}

/// The auth middleware is applied in routes/mod.rs.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/image", post(generate_image))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageRequest {
    #[serde(default)]
    mars_diary: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ImageResponse {
    pub image_url: String,
    /// `stored`, `local` or `external`
    pub status: String,
}

/// Illustrate a Mars diary and persist the picture for the caller.
async fn generate_image(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<VerifiedUser>,
    AppJson(req): AppJson<ImageRequest>,
) -> Result<Json<ImageResponse>> {
    let mars_diary = req.mars_diary.trim();
    if mars_diary.is_empty() {
        return Err(AppError::Validation(
            "需要火星日记内容来生成图像".to_string(),
        ));
    }

    let persisted = state.diary_service.illustrate(mars_diary, &user.id).await?;

    Ok(Json(ImageResponse {
        status: persisted.status().to_string(),
        image_url: persisted.into_url(),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProxyQuery {
    image_url: Option<String>,
    /// Older clients send `url`
    url: Option<String>,
}

/// Serve a local upload or relay a remote HTTPS image.
async fn proxy_image(
    State(state): State<Arc<AppState>>,
    AppQuery(query): AppQuery<ProxyQuery>,
) -> Result<Response> {
    let reference = proxy::classify(query.image_url.as_deref().or(query.url.as_deref()))?;
    let image = state.proxy.fetch(reference).await?;
    proxied_response(image)
}

/// Long-lived cacheable response for a proxied image, readable from any origin.
pub fn proxied_response(image: proxy::ProxiedImage) -> Result<Response> {
    let content_type = HeaderValue::from_str(&image.content_type)
        .map_err(|_| AppError::Upstream(format!("Bad content type: {}", image.content_type)))?;

    let mut response = Response::new(image.body);
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(PROXY_CACHE_CONTROL),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    if let Some(len) = image.content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }

    Ok(response)
}
