use crate::handlers::reports::{archive, list, read, timeseries};
use crate::state::AppState;
use crate::routes::read_only;
use axum::Router;

/// Static segments take precedence over `/:id`.
pub fn reports_routes(state: AppState) -> Router {
    Router::new()
        .route("/", read_only(list))
        .route("/archive", read_only(archive))
        .route("/timeseries", read_only(timeseries))
        .route("/:id", read_only(read))
        .with_state(state)
}
