use crate::handlers::infrastructure::{list, list_all};
use crate::state::AppState;
use crate::routes::read_only;
use axum::Router;

pub fn infrastructure_routes(state: AppState) -> Router {
    Router::new()
        .route("/", read_only(list_all))
        .route("/:type", read_only(list))
        .with_state(state)
}
