use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

use crate::models::ErrorBody;

/// Failures that end a chat request before any bytes are streamed.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Configuration errors ─────────────────────────────────────────────────
    #[error("OpenAI API key not configured")]
    MissingCredential,

    #[error("OpenAI API key is not a valid header value")]
    InvalidCredential,

    // ── Request errors ───────────────────────────────────────────────────────
    #[error("Invalid request body: {message}")]
    InvalidRequest { message: String },

    // ── Upstream errors ──────────────────────────────────────────────────────
    #[error("Upstream returned {status}: {body}")]
    UpstreamStatus { status: reqwest::StatusCode, body: String },

    #[error("Upstream request failed: {0}")]
    UpstreamRequest(#[source] reqwest::Error),
}

impl AppError {
    pub fn is_config(&self) -> bool {
        matches!(self, AppError::MissingCredential | AppError::InvalidCredential)
    }

    /// Every failure is a 500; callers only ever see a fixed message.
    pub fn status(&self) -> StatusCode {
        StatusCode::INTERNAL_SERVER_ERROR
    }

    /// The message the caller sees. Upstream details stay in the server log.
    pub fn public_message(&self) -> &'static str {
        if self.is_config() {
            "OpenAI API key not configured"
        } else {
            "Internal server error"
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error!("Chat request failed: {self}");
        let body = ErrorBody { error: self.public_message().to_string() };
        (self.status(), Json(body)).into_response()
    }
}

/// Terminal item of a relayed stream whose upstream body broke off.
#[derive(Debug, Error)]
#[error("Upstream stream interrupted: {message}")]
pub struct StreamError {
    pub message: String,
}
