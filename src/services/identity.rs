// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer-token verification against the identity provider.

use crate::error::AppError;
use crate::models::{AuthUserRecord, VerifiedUser};
use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Audience Supabase stamps on signed-in user tokens.
pub const AUTHENTICATED_AUDIENCE: &str = "authenticated";

/// Verifies an access token and returns the user it belongs to.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedUser, AppError>;
}

/// Remote verification via `GET /auth/v1/user`.
#[derive(Clone)]
pub struct SupabaseAuth {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseAuth {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuth {
    async fn verify(&self, token: &str) -> Result<VerifiedUser, AppError> {
        let url = format!("{}/auth/v1/user", self.base_url);

        let response = self
            .http
            .get(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Identity provider unreachable");
                AppError::invalid_token()
            })?;

        if !response.status().is_success() {
            tracing::debug!(status = %response.status(), "Identity provider rejected token");
            return Err(AppError::invalid_token());
        }

        let user: AuthUserRecord = response.json().await.map_err(|e| {
            tracing::warn!(error = %e, "Unparseable identity provider response");
            AppError::invalid_token()
        })?;

        if user.id.is_empty() {
            return Err(AppError::invalid_token());
        }

        Ok(VerifiedUser {
            id: user.id,
            email: user.email,
            access_token: token.to_string(),
        })
    }
}

/// Claims carried by a Supabase access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id
    pub sub: String,
    pub aud: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    #[serde(default)]
    pub email: Option<String>,
}

/// Local HS256 verification with the project's JWT secret.
#[derive(Clone)]
pub struct JwtIdentityProvider {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[AUTHENTICATED_AUDIENCE]);
        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn verify(&self, token: &str) -> Result<VerifiedUser, AppError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "JWT validation failed");
            AppError::invalid_token()
        })?;

        if data.claims.sub.is_empty() {
            return Err(AppError::invalid_token());
        }

        Ok(VerifiedUser {
            id: data.claims.sub,
            email: data.claims.email,
            access_token: token.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;
    use std::time::{SystemTime, UNIX_EPOCH};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SECRET: &[u8] = b"unit-test-secret";

    fn token(sub: &str, aud: &str, exp_offset: i64) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        let claims = Claims {
            sub: sub.to_string(),
            aud: aud.to_string(),
            exp: (now + exp_offset) as usize,
            email: Some("a@example.com".to_string()),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    #[tokio::test]
    async fn test_jwt_valid_token() {
        let provider = JwtIdentityProvider::new(SECRET);
        let t = token("user-a", AUTHENTICATED_AUDIENCE, 3600);
        let user = provider.verify(&t).await.unwrap();
        assert_eq!(user.id, "user-a");
        assert_eq!(user.email.as_deref(), Some("a@example.com"));
        assert_eq!(user.access_token, t);
    }

    #[tokio::test]
    async fn test_jwt_rejects_expired_wrong_audience_and_wrong_key() {
        let provider = JwtIdentityProvider::new(SECRET);
        for t in [
            token("user-a", AUTHENTICATED_AUDIENCE, -3600),
            token("user-a", "anon", 3600),
            "not.a.jwt".to_string(),
        ] {
            assert!(matches!(
                provider.verify(&t).await.unwrap_err(),
                AppError::Unauthorized(_)
            ));
        }

        let other = JwtIdentityProvider::new(b"another-secret");
        let t = token("user-a", AUTHENTICATED_AUDIENCE, 3600);
        assert!(other.verify(&t).await.is_err());
    }

    #[tokio::test]
    async fn test_supabase_auth_accepts_known_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("apikey", "anon"))
            .and(header("authorization", "Bearer good"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "id": "u-1", "email": "u@example.com" })),
            )
            .mount(&server)
            .await;

        let auth = SupabaseAuth::new(&server.uri(), "anon");
        let user = auth.verify("good").await.unwrap();
        assert_eq!(user.id, "u-1");
    }

    #[tokio::test]
    async fn test_supabase_auth_rejects() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer bad"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "msg": "invalid JWT" })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer anonymous"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let auth = SupabaseAuth::new(&server.uri(), "anon");
        assert!(matches!(
            auth.verify("bad").await.unwrap_err(),
            AppError::Unauthorized(_)
        ));
        assert!(matches!(
            auth.verify("anonymous").await.unwrap_err(),
            AppError::Unauthorized(_)
        ));
    }
}
