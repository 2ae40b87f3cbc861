use crate::handlers::cities::list;
use crate::state::AppState;
use crate::routes::read_only;
use axum::Router;

pub fn cities_routes(state: AppState) -> Router {
    Router::new().route("/", read_only(list)).with_state(state)
}
