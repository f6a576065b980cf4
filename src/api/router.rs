//! HTTP router.
//!
//! Returns a composable `Router` with every route nested under `/api/`.
//! Handlers use `State<ApiContext>`.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router.
pub fn api_router(core: Arc<CoreState>) -> Router {
    let limit = body_limit(core.config.max_document_bytes);
    let ctx = ApiContext::new(core);

    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let routes = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/documents", post(endpoints::documents::submit))
        .route(
            "/documents/:id",
            get(endpoints::documents::detail).delete(endpoints::documents::remove),
        )
        .route("/documents/:id/retry", post(endpoints::documents::retry))
        .route(
            "/owners/:owner_id/documents",
            get(endpoints::documents::list_by_owner),
        )
        .route("/owners/:owner_id/stats", get(endpoints::stats::owner_stats))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(ctx);

    Router::new().nest("/api", routes)
}

/// Request body cap for a document of `max_document_bytes`: base64 inflates
/// by 4/3, plus room for the JSON envelope.
fn body_limit(max_document_bytes: usize) -> usize {
    (max_document_bytes / 3)
        .saturating_mul(4)
        .saturating_add(64 * 1024)
}
