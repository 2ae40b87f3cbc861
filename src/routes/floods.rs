use crate::handlers::floods::{archive, list, states, timeseries};
use crate::state::AppState;
use crate::routes::read_only;
use axum::Router;

pub fn floods_routes(state: AppState) -> Router {
    Router::new()
        .route("/", read_only(list))
        .route("/states", read_only(states))
        .route("/archive", read_only(archive))
        .route("/timeseries", read_only(timeseries))
        .with_state(state)
}
