pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::extraction::handlers as extraction;
use crate::session::handlers as session;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_upload_bytes;

    Router::new()
        .route("/health", get(health::health_handler))
        // Upload-and-extract
        .route("/api/pdf", post(extraction::handle_extract))
        // Session API
        .route("/api/v1/sessions", post(session::handle_create_session))
        .route(
            "/api/v1/sessions/:id",
            delete(session::handle_delete_session),
        )
        .route(
            "/api/v1/sessions/:id/resumes",
            get(session::handle_list_resumes).post(session::handle_upload_resumes),
        )
        .route(
            "/api/v1/sessions/:id/resumes/:resume_id",
            delete(session::handle_delete_resume),
        )
        .route(
            "/api/v1/sessions/:id/config",
            get(session::handle_get_config).put(session::handle_put_config),
        )
        .route("/api/v1/sessions/:id/submit", post(session::handle_submit))
        .route("/api/v1/sessions/:id/output", get(session::handle_get_output))
        .route("/api/v1/sessions/:id/export", get(session::handle_export))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
