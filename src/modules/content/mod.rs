use axum::Router;
use axum::middleware;
use axum::routing::{get, post};

use crate::state::AppState;

pub mod dto;
pub mod handler;
pub mod model;
pub mod repository;
pub mod service;

/// Every content route acts on behalf of a resolved principal.
pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/contents", post(handler::create_content))
        .route("/contents/{id}", get(handler::get_content))
        .route("/contents/{id}/upload-url", post(handler::issue_upload_grant))
        .route("/contents/{id}/upload", post(handler::commit_upload))
        .route("/contents/{id}/transcode", post(handler::retry_transcode))
        .route_layer(middleware::from_fn_with_state(
            state,
            crate::middleware::auth::auth_middleware,
        ))
}
