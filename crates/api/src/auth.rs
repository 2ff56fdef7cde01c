//! Signed bearer tokens and the extractors that turn them into a principal.
//!
//! A token is `base64url(claims_json).base64url(hmac_sha256(claims_b64))`,
//! both parts without padding.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use common::{Principal, UserId};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::error::ApiError;

type HmacSha256 = Hmac<Sha256>;

/// Reasons a token is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,

    #[error("Malformed token")]
    Malformed,

    #[error("Invalid token signature")]
    BadSignature,

    #[error("Token expired")]
    Expired,

    #[error("Token signing failed: {0}")]
    Signing(String),
}

/// Claims carried by a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub sub: UserId,
    pub email: String,
    pub is_admin: bool,
    /// Expiry, seconds since the Unix epoch.
    pub exp: i64,
}

impl Claims {
    pub fn principal(&self) -> Principal {
        Principal {
            user_id: self.sub,
            is_admin: self.is_admin,
        }
    }
}

/// Issues and verifies HMAC-SHA256 signed tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    secret: Arc<SecretString>,
    ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("secret", &"[REDACTED]")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl TokenIssuer {
    pub fn new(secret: SecretString, ttl: Duration) -> Self {
        Self {
            secret: Arc::new(secret),
            ttl,
        }
    }

    /// Issues a token for a user, valid for the configured lifetime.
    pub fn issue(&self, user_id: UserId, email: &str, is_admin: bool) -> Result<String, AuthError> {
        let ttl = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            is_admin,
            exp: Utc::now().timestamp().saturating_add(ttl),
        };
        self.sign(&claims)
    }

    /// Encodes and signs arbitrary claims.
    pub fn sign(&self, claims: &Claims) -> Result<String, AuthError> {
        let json = serde_json::to_vec(claims).map_err(|e| AuthError::Signing(e.to_string()))?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = URL_SAFE_NO_PAD.encode(self.mac(&payload)?.finalize().into_bytes());
        Ok(format!("{payload}.{signature}"))
    }

    /// Checks the signature and expiry of a token and returns its claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let (payload, signature) = token.split_once('.').ok_or(AuthError::Malformed)?;
        let signature = URL_SAFE_NO_PAD
            .decode(signature)
            .map_err(|_| AuthError::Malformed)?;

        // Constant-time comparison
        self.mac(payload)?
            .verify_slice(&signature)
            .map_err(|_| AuthError::BadSignature)?;

        let json = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| AuthError::Malformed)?;
        let claims: Claims = serde_json::from_slice(&json).map_err(|_| AuthError::Malformed)?;

        if claims.exp <= Utc::now().timestamp() {
            return Err(AuthError::Expired);
        }

        Ok(claims)
    }

    fn mac(&self, payload: &str) -> Result<HmacSha256, AuthError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| AuthError::Signing(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }
}

/// Any authenticated caller. Rejects with 401.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Principal);

impl<S> FromRequestParts<S> for AuthUser
where
    TokenIssuer: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(AuthError::MissingToken);

        let claims = token.and_then(|token| TokenIssuer::from_ref(state).verify(token.trim()));

        match claims {
            Ok(claims) => Ok(AuthUser(claims.principal())),
            Err(err) => {
                metrics::counter!("auth_rejections_total").increment(1);
                tracing::debug!(error = %err, "rejected bearer token");
                Err(ApiError::Unauthorized(err.to_string()))
            }
        }
    }
}

/// An authenticated admin. Rejects with 401 without a valid token and 403
/// for non-admins.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub Principal);

impl<S> FromRequestParts<S> for AdminUser
where
    TokenIssuer: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let AuthUser(principal) = AuthUser::from_request_parts(parts, state).await?;

        if !principal.is_admin {
            return Err(ApiError::Forbidden("Admin access required".to_string()));
        }

        Ok(AdminUser(principal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(
            SecretString::from("test-secret".to_string()),
            Duration::from_secs(3600),
        )
    }

    #[test]
    fn test_issue_and_verify() {
        let issuer = issuer();
        let user_id = UserId::new();

        let token = issuer.issue(user_id, "ada@example.com", true).unwrap();
        let claims = issuer.verify(&token).unwrap();

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.email, "ada@example.com");
        assert!(claims.principal().is_admin);
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let issuer = issuer();
        let token = issuer.issue(UserId::new(), "ada@example.com", false).unwrap();
        let (_, signature) = token.split_once('.').unwrap();

        let forged_claims = Claims {
            sub: UserId::new(),
            email: "mallory@example.com".to_string(),
            is_admin: true,
            exp: Utc::now().timestamp() + 3600,
        };
        let forged_payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged_claims).unwrap());
        let forged = format!("{forged_payload}.{signature}");

        assert_eq!(issuer.verify(&forged), Err(AuthError::BadSignature));
    }

    #[test]
    fn test_other_secret_rejected() {
        let token = issuer().issue(UserId::new(), "ada@example.com", false).unwrap();
        let other = TokenIssuer::new(
            SecretString::from("other-secret".to_string()),
            Duration::from_secs(3600),
        );
        assert_eq!(other.verify(&token), Err(AuthError::BadSignature));
    }

    #[test]
    fn test_expired_rejected() {
        let issuer = issuer();
        let claims = Claims {
            sub: UserId::new(),
            email: "ada@example.com".to_string(),
            is_admin: false,
            exp: Utc::now().timestamp() - 1,
        };
        let token = issuer.sign(&claims).unwrap();
        assert_eq!(issuer.verify(&token), Err(AuthError::Expired));
    }

    #[test]
    fn test_malformed_rejected() {
        assert_eq!(issuer().verify("no-dot-here"), Err(AuthError::Malformed));
        assert_eq!(issuer().verify("abc.!!!"), Err(AuthError::Malformed));
    }
}
