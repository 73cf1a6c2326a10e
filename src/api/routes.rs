use crate::api::ApiDoc;
use crate::AppState;
use axum::{
    routing::{get, post},
    Json, Router,
};
use utoipa::OpenApi;

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/execute", post(crate::api::handlers::sessions::execute))
        .route("/upload", post(crate::api::handlers::upload::upload))
        .route("/status", get(crate::api::handlers::sessions::server_status))
        .route("/health", get(crate::api::handlers::sessions::health))
        // Session routes
        .route(
            "/sessions/{id}",
            get(crate::api::handlers::sessions::get_session),
        )
        .route(
            "/sessions/{id}/events",
            get(crate::api::handlers::events::session_events),
        )
        .route(
            "/sessions/{id}/cancel",
            post(crate::api::handlers::sessions::cancel_session),
        )
        // Artifact routes
        .route(
            "/results/{session_id}",
            get(crate::api::handlers::artifacts::session_results),
        )
        .route(
            "/download/{session_id}/{artifact}",
            get(crate::api::handlers::artifacts::download_artifact),
        )
        .route("/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
}
