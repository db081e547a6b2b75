//! Session tokens and request authentication.
//!
//! Sessions are HS256 JWTs. Handlers ask for an [`AuthUser`] or an [`AdminUser`]
//! argument; the extractor reads the token from `Authorization: Bearer ...` or
//! the `x-auth-token` header, verifies it, and loads the user. The role is taken
//! from the stored user, so a promotion applies without signing in again.

use crate::{
    api::AppState,
    config::AuthConfig,
    core::user::{self as user_core, Role},
    entities::user,
    errors::{Error, Result},
};
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fallback header for clients that cannot set `Authorization`.
pub const AUTH_TOKEN_HEADER: &str = "x-auth-token";

/// JWT claims of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    pub email: String,
    pub role: Role,
    /// Issued at (Unix timestamp seconds)
    pub iat: i64,
    /// Expiration (Unix timestamp seconds)
    pub exp: i64,
    pub iss: String,
}

/// Issues a session token for `user`, valid for `session_ttl_days`.
pub fn create_token(user: &user::Model, auth: &AuthConfig) -> Result<String> {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        role: Role::from_stored(&user.role),
        iat: now.timestamp(),
        exp: (now + chrono::Duration::days(auth.session_ttl_days)).timestamp(),
        iss: auth.issuer.clone(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(auth.jwt_secret.as_bytes()),
    )
    .map_err(Into::into)
}

/// Verifies signature, expiry, and issuer of a session token.
pub fn decode_token(token: &str, auth: &AuthConfig) -> Result<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[auth.issuer.as_str()]);

    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(auth.jwt_secret.as_bytes()),
        &validation,
    )?;
    Ok(data.claims)
}

fn request_token(parts: &Parts) -> Option<&str> {
    let bearer = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    bearer
        .or_else(|| {
            parts
                .headers
                .get(AUTH_TOKEN_HEADER)
                .and_then(|h| h.to_str().ok())
        })
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// The signed-in caller.
#[derive(Debug, Clone)]
pub struct AuthUser(pub user::Model);

impl AuthUser {
    #[must_use]
    pub fn role(&self) -> Role {
        Role::from_stored(&self.0.role)
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        if let Some(user) = parts.extensions.get::<Self>() {
            return Ok(user.clone());
        }

        let token = request_token(parts).ok_or(Error::Unauthorized)?;
        let claims = decode_token(token, &state.config.auth).map_err(|e| {
            debug!(error = %e, "Session token rejected");
            Error::Unauthorized
        })?;

        let user_id: i64 = claims.sub.parse().map_err(|_| Error::Unauthorized)?;
        let user = user_core::get_user_by_id(&state.database, user_id)
            .await?
            .ok_or(Error::Unauthorized)?;

        let auth_user = Self(user);
        parts.extensions.insert(auth_user.clone());
        Ok(auth_user)
    }
}

/// The signed-in caller, who must be an administrator.
#[derive(Debug, Clone)]
pub struct AdminUser(pub user::Model);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let caller = AuthUser::from_request_parts(parts, state).await?;
        if caller.role() != Role::Admin {
            return Err(Error::Forbidden {
                message: "Admin access required".to_string(),
            });
        }
        Ok(Self(caller.0))
    }
}
