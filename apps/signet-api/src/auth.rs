//! Password digests, HMAC-signed bearer tokens, and the request
//! extractor that enforces them.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::error::ApiError;
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const TOKEN_TTL_SECONDS: i64 = 24 * 60 * 60;

pub fn hash_password(password: &str, salt: &str) -> String {
    hex::encode(Sha256::digest(format!("{}:{}", salt, password)))
}

pub fn verify_password(password: &str, salt: &str, digest: &str) -> bool {
    hash_password(password, salt) == digest
}

fn keyed_mac(secret: &[u8]) -> Option<HmacSha256> {
    HmacSha256::new_from_slice(secret).ok()
}

/// Token format: `{user_id}.{expiry_unix}.{hex_hmac}` over the first
/// two segments.
pub fn issue_token(secret: &[u8], user_id: &str, now: DateTime<Utc>) -> Option<String> {
    let expires_at = now.timestamp() + TOKEN_TTL_SECONDS;
    let payload = format!("{}.{}", user_id, expires_at);
    let mut mac = keyed_mac(secret)?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());
    Some(format!("{}.{}", payload, signature))
}

/// Returns the user ID for a valid, unexpired token.
pub fn verify_token(secret: &[u8], token: &str, now: DateTime<Utc>) -> Option<String> {
    let (payload, signature) = token.rsplit_once('.')?;
    let mut mac = keyed_mac(secret)?;
    mac.update(payload.as_bytes());
    mac.verify_slice(&hex::decode(signature).ok()?).ok()?;

    let (user_id, expires_at) = payload.rsplit_once('.')?;
    let expires_at: i64 = expires_at.parse().ok()?;
    if expires_at < now.timestamp() {
        return None;
    }
    Some(user_id.to_string())
}

/// Authenticated caller, extracted from the Authorization header.
pub struct AuthUser {
    pub id: String,
}

#[axum::async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(ApiError::Unauthenticated)?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or(ApiError::Unauthenticated)?;
        let user_id = verify_token(state.auth_secret.as_bytes(), token, Utc::now())
            .ok_or(ApiError::Unauthenticated)?;
        Ok(AuthUser { id: user_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn password_digest_round_trips() {
        let digest = hash_password("hunter2", "salt-a");
        assert!(verify_password("hunter2", "salt-a", &digest));
        assert!(!verify_password("hunter3", "salt-a", &digest));
        assert!(!verify_password("hunter2", "salt-b", &digest));
    }

    #[test]
    fn same_password_different_salt_differs() {
        assert_ne!(
            hash_password("hunter2", "salt-a"),
            hash_password("hunter2", "salt-b")
        );
    }

    #[test]
    fn token_round_trips() {
        let now = Utc::now();
        let token = issue_token(SECRET, "user-42", now).unwrap();
        assert_eq!(verify_token(SECRET, &token, now).as_deref(), Some("user-42"));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let now = Utc::now();
        let token = issue_token(SECRET, "user-42", now).unwrap();
        let tampered = token.replacen("user-42", "user-43", 1);
        assert_eq!(verify_token(SECRET, &tampered, now), None);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = Utc::now();
        let token = issue_token(SECRET, "user-42", now).unwrap();
        assert_eq!(verify_token(b"other-secret", &token, now), None);
    }

    #[test]
    fn expired_token_is_rejected() {
        let issued = Utc::now();
        let token = issue_token(SECRET, "user-42", issued).unwrap();
        let later = issued + Duration::seconds(TOKEN_TTL_SECONDS + 1);
        assert_eq!(verify_token(SECRET, &token, later), None);
    }

    #[test]
    fn garbage_tokens_are_rejected() {
        let now = Utc::now();
        assert_eq!(verify_token(SECRET, "", now), None);
        assert_eq!(verify_token(SECRET, "no-dots-here", now), None);
        assert_eq!(verify_token(SECRET, "a.b.c", now), None);
    }
}
