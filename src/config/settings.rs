//! Application settings loaded from `config.toml` and the environment.
//!
//! The file is optional; every field has a default. Environment variables
//! override the file: `DATABASE_URL`, `HOST`, `PORT`, `GOOGLE_CLIENT_ID`. The session signing
//! secret is read from `JWT_SECRET` only and never from the file.

use crate::config::database::DEFAULT_DATABASE_URL;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{info, warn};

/// Default location of the settings file, overridable with `CANTEEN_CONFIG`.
pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Sign-in and session settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Only emails under this domain may sign in (e.g. `eduiteh.eu`)
    pub allowed_email_domain: String,
    /// Email local-part prefixes that identify students; everyone else is a teacher
    pub student_email_prefixes: Vec<String>,
    /// Emails that are given the admin role
    pub admin_emails: Vec<String>,
    /// Session lifetime in days
    pub session_ttl_days: i64,
    /// `iss` claim of issued session tokens
    pub issuer: String,
    /// Expected `aud` of identity-provider tokens; unchecked when unset
    pub google_client_id: Option<String>,
    /// HMAC secret for session tokens (environment only)
    #[serde(skip)]
    pub jwt_secret: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            allowed_email_domain: "eduiteh.eu".to_string(),
            student_email_prefixes: vec!["et.".to_string(), "ot.".to_string()],
            admin_emails: Vec::new(),
            session_ttl_days: 7,
            issuer: "canteen".to_string(),
            google_client_id: None,
            jwt_secret: String::new(),
        }
    }
}

impl AuthConfig {
    /// Whether `email` is configured as an administrator.
    #[must_use]
    pub fn is_admin_email(&self, email: &str) -> bool {
        self.admin_emails
            .iter()
            .any(|admin| admin.eq_ignore_ascii_case(email))
    }
}

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_url: String,
    pub server: ServerConfig,
    pub auth: AuthConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl AppConfig {
    /// Socket address string for the HTTP listener.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Parses settings from TOML text.
///
/// # Errors
/// Returns an error if the TOML syntax is invalid or a field has the wrong type.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads settings from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read or parsed.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    parse_config(&contents)
}

/// Applies environment overrides to `config`.
///
/// # Errors
/// Returns an error if `PORT` is not a valid port number.
pub fn apply_env_overrides(config: &mut AppConfig) -> Result<()> {
    if let Ok(url) = std::env::var("DATABASE_URL") {
        config.database_url = url;
    }
    if let Ok(host) = std::env::var("HOST") {
        config.server.host = host;
    }
    if let Ok(port) = std::env::var("PORT") {
        config.server.port = port.parse().map_err(|e| Error::Config {
            message: format!("Invalid PORT value '{port}': {e}"),
        })?;
    }
    if let Ok(client_id) = std::env::var("GOOGLE_CLIENT_ID") {
        config.auth.google_client_id = Some(client_id);
    }
    if let Ok(secret) = std::env::var("JWT_SECRET") {
        config.auth.jwt_secret = secret;
    }
    Ok(())
}

/// Loads the full application configuration: file (if present), then environment.
///
/// # Errors
/// Returns an error if the file exists but is invalid, or if `JWT_SECRET` is missing.
pub fn load_app_configuration() -> Result<AppConfig> {
    let path =
        std::env::var("CANTEEN_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let mut config = if Path::new(&path).exists() {
        info!("Loading settings from {path}");
        load_config(&path)?
    } else {
        warn!("{path} not found, using default settings");
        AppConfig::default()
    };

    apply_env_overrides(&mut config)?;

    if config.auth.jwt_secret.is_empty() {
        return Err(Error::Config {
            message: "JWT_SECRET must be set".to_string(),
        });
    }

    Ok(config)
}
