//! Verified caller identity.

use serde::Deserialize;

/// Identity established by the auth gate for one request.
///
/// The access token is kept so repository calls can run under the
/// caller's row-level security context.
#[derive(Debug, Clone)]
pub struct VerifiedUser {
    pub id: String,
    pub email: Option<String>,
    pub access_token: String,
}

/// User object returned by the identity provider.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUserRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}
