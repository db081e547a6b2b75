//! HTTP rendering of [`Error`].
//!
//! Every error becomes a JSON body `{ "message": ... }` with the status from
//! [`Error::status_code`]. Server-side failures are logged here and the client
//! only sees a generic message.

use crate::errors::Error;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        let message = if self.is_server_error() {
            tracing::error!(error = %self, "Request failed");
            "Server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(ErrorBody { message })).into_response()
    }
}
