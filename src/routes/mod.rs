pub mod api_routes;

use std::path::Path;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::routes::api_routes::{chat_handler, health_handler};
use crate::service::chat_service::ChatService;

/// Builds the application router. When `static_dir` is set, every path that
/// is not an API route is served from it.
pub fn router(svc: ChatService, static_dir: Option<&Path>) -> Router {
    let api = Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/health", get(health_handler))
        .with_state(svc);

    let app = match static_dir {
        Some(dir) => api.fallback_service(ServeDir::new(dir)),
        None => api,
    };

    app.layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
