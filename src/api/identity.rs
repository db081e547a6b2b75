//! External identity verification.
//!
//! Sign-in hands an opaque token from the browser to an [`IdentityProvider`],
//! which answers with the verified email and display name. Production uses
//! Google's `tokeninfo` endpoint; tests plug in a stub.

use crate::errors::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

/// Google's token introspection endpoint.
pub const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

/// Identity asserted by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub email: String,
    pub full_name: String,
    pub email_verified: bool,
}

/// Verifies a sign-in token issued by an external provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity>;
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    email: Option<String>,
    /// Google sends `"true"`/`"false"` strings here, sometimes booleans
    #[serde(default)]
    email_verified: serde_json::Value,
    name: Option<String>,
    aud: Option<String>,
}

impl TokenInfo {
    fn is_verified(&self) -> bool {
        match &self.email_verified {
            serde_json::Value::Bool(b) => *b,
            serde_json::Value::String(s) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}

/// [`IdentityProvider`] backed by Google's `tokeninfo` endpoint.
#[derive(Debug, Clone)]
pub struct GoogleTokenInfo {
    client: reqwest::Client,
    endpoint: String,
    audience: Option<String>,
}

impl GoogleTokenInfo {
    /// Creates a verifier. When `audience` is set, tokens issued for any other
    /// client id are rejected.
    #[must_use]
    pub fn new(audience: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: GOOGLE_TOKENINFO_URL.to_string(),
            audience,
        }
    }
}

#[async_trait]
impl IdentityProvider for GoogleTokenInfo {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("id_token", token)])
            .send()
            .await?;

        if !response.status().is_success() {
            debug!(status = %response.status(), "tokeninfo rejected token");
            return Err(Error::IdentityProvider {
                message: "Invalid sign-in token".to_string(),
            });
        }

        let info: TokenInfo = response.json().await?;

        if let Some(expected) = &self.audience
            && info.aud.as_deref() != Some(expected.as_str())
        {
            return Err(Error::IdentityProvider {
                message: "Token was issued for a different client".to_string(),
            });
        }

        let email_verified = info.is_verified();
        let email = info.email.ok_or_else(|| Error::IdentityProvider {
            message: "Token carries no email".to_string(),
        })?;
        let full_name = info
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

        Ok(VerifiedIdentity {
            email,
            full_name,
            email_verified,
        })
    }
}
