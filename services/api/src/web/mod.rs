pub mod rest;
pub mod state;

// Re-export the handlers and router so the server binary can assemble
// the application without reaching into submodules.
pub use rest::ApiDoc;
pub use state::AppState;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Builds the API router over the shared application state.
pub fn router(app_state: Arc<AppState>) -> Router {
    // Leave headroom above the contract limit for multipart framing and
    // the other form fields.
    let body_limit = app_state.config.max_contract_bytes + 64 * 1024;

    Router::new()
        .route(
            "/audits",
            post(rest::create_audit_handler).get(rest::list_audits_handler),
        )
        .route("/audits/{id}", get(rest::get_audit_handler))
        .route("/audits/{id}/email", post(rest::email_audit_handler))
        .route("/audits/{id}/explain", post(rest::explain_audit_handler))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(app_state)
}
