//! Unified error type for the canteen service.
//!
//! Every core operation returns [`Result`]. The API layer turns an [`Error`]
//! into an HTTP response using [`Error::status_code`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing, malformed, or expired session credential
    #[error("Unauthorized")]
    Unauthorized,

    /// Valid credential without the required role
    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("No active menu")]
    NoActiveMenu,

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Unknown weekday: {day}")]
    UnknownDay { day: String },

    #[error("Meal '{name}' is not offered on {day}")]
    UnknownMeal { day: String, name: String },

    #[error("User has already submitted an order for this menu")]
    DuplicateOrder,

    /// The client ordered from a menu that is no longer the active one
    #[error("Menu {menu_id} is no longer open for ordering")]
    MenuClosed { menu_id: i64 },

    #[error("Ordering deadline has passed ({deadline})")]
    DeadlinePassed { deadline: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Identity provider rejected the credential: {message}")]
    IdentityProvider { message: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Shorthand for [`Error::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorized | Self::Token(_) | Self::IdentityProvider { .. } => 401,
            Self::Forbidden { .. } | Self::DeadlinePassed { .. } => 403,
            Self::NotFound { .. } | Self::NoActiveMenu => 404,
            Self::Validation { .. } | Self::UnknownDay { .. } | Self::UnknownMeal { .. } => 400,
            Self::DuplicateOrder | Self::MenuClosed { .. } => 409,
            Self::Config { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Http(_) => 500,
        }
    }

    /// Whether the error is an unexpected server-side failure.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        self.status_code() >= 500
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
