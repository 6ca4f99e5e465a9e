use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::ChatRequest;
use crate::service::chat_service::ChatService;

/// POST `/api/chat`: relays the reply to `messages` as a chunked plain-text body.
///
/// The body is read as JSON regardless of its Content-Type. Errors before
/// the first byte become a 500 with a JSON `{ "error": ... }` body. A
/// failure after streaming started aborts the response mid-body.
pub async fn chat_handler(
    State(svc): State<ChatService>,
    body: Bytes,
) -> Result<Response, AppError> {
    svc.ensure_configured()?;

    let request: ChatRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::InvalidRequest { message: e.to_string() })?;

    let span = info_span!(
        "chat",
        request_id = %Uuid::new_v4(),
        turns = request.messages.len()
    );
    let deltas = svc.stream_reply(&request.messages).instrument(span).await?;

    Ok((
        [(CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(deltas),
    )
        .into_response())
}

/// GET `/health`
pub async fn health_handler() -> &'static str {
    "ok"
}
