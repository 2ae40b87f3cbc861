//! Common routes: version, health, readiness.

use crate::handlers::common::{health, ready, version};
use crate::state::AppState;
use crate::routes::read_only;
use axum::Router;

/// GET /, GET /health, GET /ready. Not subject to query validation.
pub fn common_routes(state: AppState) -> Router {
    Router::new()
        .route("/", read_only(version))
        .route("/health", read_only(health))
        .route("/ready", read_only(ready))
        .with_state(state)
}
