// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer-token authentication middleware.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(value: Option<&str>) -> Option<&str> {
    value
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Middleware that requires a token the identity provider accepts.
///
/// The verified user is stored in request extensions; handlers take
/// `Extension<VerifiedUser>` and never look at the header themselves.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = bearer_token(auth_header)
        .ok_or_else(AppError::missing_token)?
        .to_string();

    let user = state.identity.verify(&token).await?;
    if user.id.is_empty() {
        return Err(AppError::invalid_token());
    }

    tracing::debug!(user_id = %user.id, "Request authenticated");
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}
