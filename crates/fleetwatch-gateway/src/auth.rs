//! Credential verification and role checks.
//!
//! Tokens are opaque to the rest of the gateway: an [`IdentityProvider`]
//! turns one into an [`Identity`] or fails. [`JwtIdentityProvider`] verifies
//! HS256 JSON Web Tokens whose claims carry the identity. Issuing tokens is
//! left to whatever service owns logins.
//!
//! A token is read from `Authorization: Bearer <token>` or, for clients that
//! cannot set headers on a WebSocket upgrade, the `token` query parameter.

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRequestParts, Query};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use fleetwatch_core::config::AuthConfig;
use fleetwatch_types::{Identity, IdentityId, Role};

use crate::error::GatewayError;
use crate::state::AppState;

/// Why a credential was refused.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No token was presented.
    #[error("authentication required")]
    MissingToken,

    /// The token failed verification.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The token was valid once but has expired.
    #[error("token expired")]
    Expired,

    /// The provider has no signing secret configured.
    #[error("no JWT secret configured")]
    MissingSecret,
}

/// Verifies bearer tokens.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve `token` to the identity it was issued for.
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// JWT claims carried by gateway tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Principal ID.
    pub sub: IdentityId,
    /// Login email.
    pub email: String,
    /// Display name.
    pub full_name: String,
    /// Authorization role.
    pub role: Role,
    /// Expiry as Unix seconds.
    pub exp: i64,
}

impl Claims {
    /// Claims for `identity`, valid until `exp` (Unix seconds).
    pub fn new(identity: &Identity, exp: i64) -> Self {
        Self {
            sub: identity.id,
            email: identity.email.clone(),
            full_name: identity.full_name.clone(),
            role: identity.role,
            exp,
        }
    }
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            full_name: claims.full_name,
            role: claims.role,
        }
    }
}

/// HS256 token verification with a shared secret.
pub struct JwtIdentityProvider {
    key: DecodingKey,
    validation: Validation,
}

impl JwtIdentityProvider {
    /// Build a provider from a secret and a clock-skew leeway in seconds.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingSecret`] when `secret` is empty.
    pub fn new(secret: &str, leeway_secs: u64) -> Result<Self, AuthError> {
        if secret.is_empty() {
            return Err(AuthError::MissingSecret);
        }
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;
        Ok(Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        })
    }

    /// Build a provider from the `auth` config section.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::MissingSecret`] when no secret is configured.
    pub fn from_config(config: &AuthConfig) -> Result<Self, AuthError> {
        Self::new(&config.jwt_secret, config.leeway_secs)
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        match jsonwebtoken::decode::<Claims>(token, &self.key, &self.validation) {
            Ok(data) => Ok(data.claims.into()),
            Err(e) if matches!(e.kind(), ErrorKind::ExpiredSignature) => Err(AuthError::Expired),
            Err(e) => Err(AuthError::InvalidToken(e.to_string())),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Extract the raw token from the request, header first.
pub fn bearer_token(parts: &Parts) -> Option<String> {
    let from_header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned);

    from_header.or_else(|| {
        Query::<TokenQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(q)| q.token)
            .filter(|token| !token.is_empty())
    })
}

/// The verified identity of the caller.
///
/// Rejects with 401 when the token is missing or fails verification.
#[derive(Debug, Clone)]
pub struct CurrentIdentity(pub Identity);

impl FromRequestParts<Arc<AppState>> for CurrentIdentity {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(AuthError::MissingToken)?;
        match state.identity.verify(&token).await {
            Ok(identity) => Ok(Self(identity)),
            Err(e) => {
                tracing::debug!(error = %e, "credential rejected");
                Err(e.into())
            }
        }
    }
}

/// Fail with 403 unless `identity` holds one of `allowed`.
///
/// # Errors
///
/// Returns [`GatewayError::Forbidden`] for any other role.
pub fn require_role(identity: &Identity, allowed: &[Role]) -> Result<(), GatewayError> {
    if allowed.contains(&identity.role) {
        Ok(())
    } else {
        Err(GatewayError::Forbidden(format!(
            "role {} may not perform this operation",
            identity.role
        )))
    }
}
