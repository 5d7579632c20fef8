// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.
//!
//! Every handler failure becomes a `{ "error": "<message>" }` body. Upstream
//! details are logged, never returned to the client.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Entry not found or not owned by caller")]
    NotFoundOrForbidden,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Unrecognized image response: {0}")]
    ImageResponseFormat(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Diary table has not been created")]
    TableMissing,

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub const MISSING_TOKEN: &'static str = "缺少认证令牌";
    pub const INVALID_TOKEN: &'static str = "用户未认证";

    /// Shorthand for the missing/malformed header case.
    pub fn missing_token() -> Self {
        AppError::Unauthorized(Self::MISSING_TOKEN.to_string())
    }

    /// Shorthand for a token the identity provider rejected.
    pub fn invalid_token() -> Self {
        AppError::Unauthorized(Self::INVALID_TOKEN.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let message = errors
            .field_errors()
            .values()
            .flat_map(|errs| errs.iter())
            .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| "请求参数无效".to_string());
        AppError::Validation(message)
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Body returned when the diary table does not exist yet.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NeedsSetupResponse {
    success: bool,
    needs_setup: bool,
    error: &'static str,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFoundOrForbidden => {
                (StatusCode::NOT_FOUND, "日记不存在或无权限删除".to_string())
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Generation(msg) => {
                tracing::error!(error = %msg, "Generation failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "生成内容时出现错误，请稍后重试".to_string(),
                )
            }
            AppError::ImageResponseFormat(msg) => {
                tracing::error!(error = %msg, "Image response format error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "图像服务返回了无法识别的数据".to_string(),
                )
            }
            AppError::Persistence(msg) => {
                tracing::error!(error = %msg, "Persistence error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "数据存储失败，请稍后重试".to_string(),
                )
            }
            AppError::TableMissing => {
                tracing::warn!("Diary table missing; setup required");
                let body = NeedsSetupResponse {
                    success: false,
                    needs_setup: true,
                    error: "数据库表尚未创建，请先执行数据库初始化脚本",
                };
                return (StatusCode::OK, Json(body)).into_response();
            }
            AppError::Upstream(msg) => {
                tracing::warn!(error = %msg, "Upstream error");
                (StatusCode::BAD_GATEWAY, "获取远程资源失败".to_string())
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "服务器内部错误".to_string())
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
