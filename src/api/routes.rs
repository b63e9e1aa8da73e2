use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Blobs
        .route(
            "/blobs/*key",
            get(handlers::get_blob)
                .put(handlers::put_blob)
                .delete(handlers::delete_blob),
        )
        .route("/batch-delete", post(handlers::delete_blobs))
        // Internal
        .route("/_internal/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
