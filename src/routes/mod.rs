pub mod auth;
pub mod blogs;

use axum::routing::get;
use axum::Router;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// The full application: API routes, uploaded images under the public
/// prefix, and a liveness probe.
pub fn app(state: AppState) -> Router {
    let uploads = ServeDir::new(state.uploads.dir());
    let prefix = state.uploads.public_prefix().to_string();
    let max_upload_bytes = state.uploads.max_bytes();

    Router::new()
        .route("/health", get(health))
        .merge(auth::router())
        .merge(blogs::router(max_upload_bytes))
        .nest_service(&prefix, uploads)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
