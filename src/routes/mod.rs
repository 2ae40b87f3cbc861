//! Route groups and the composed application.

pub mod cities;
pub mod common;
pub mod floods;
pub mod infrastructure;
pub mod reports;

pub use cities::cities_routes;
pub use common::common_routes;
pub use floods::floods_routes;
pub use infrastructure::infrastructure_routes;
pub use reports::reports_routes;

use crate::cache::{url_key, CacheLayer, ResponseCache};
use crate::config::Config;
use crate::handlers::common::not_found;
use crate::middleware::{cors_layer, panic_response, response_time, trace_layer, validate_output};
use crate::state::AppState;
use crate::store::DisasterStore;
use axum::{
    extract::Request,
    handler::Handler,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, MethodRouter},
    Router,
};
use std::sync::Arc;
use tower::Layer;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    limit::RequestBodyLimitLayer,
    normalize_path::{NormalizePath, NormalizePathLayer},
};

pub const TIMESERIES_PATH: &str = "/floods/timeseries";

/// The served application: the router behind trailing-slash normalization.
pub type App = NormalizePath<Router>;

/// GET route whose other methods answer like an unknown URL.
pub fn read_only<H, T>(handler: H) -> MethodRouter<AppState>
where
    H: Handler<T, AppState>,
    T: 'static,
{
    get(handler).fallback(not_found)
}

/// Resource routes behind API-level query validation, plus the probes and the 404 fallback.
pub fn api_routes(state: AppState) -> Router {
    let resources = Router::new()
        .nest("/floods", floods_routes(state.clone()))
        .nest("/infrastructure", infrastructure_routes(state.clone()))
        .nest("/reports", reports_routes(state.clone()))
        .nest("/cities", cities_routes(state.clone()))
        .route_layer(from_fn_with_state(state.config.clone(), validate_output));

    Router::new()
        .merge(common_routes(state))
        .merge(resources)
        .fallback(not_found)
}

/// Probes always reflect live state.
fn cache_key(req: &Request) -> Option<String> {
    match req.uri().path() {
        "/health" | "/ready" => None,
        _ => url_key(req),
    }
}

/// Full HTTP stack. Outermost first: path normalization, catch-panic, trace, CORS,
/// compression, response time, body limit, cache, then the API routes.
pub fn build_app(config: &Config, store: Arc<dyn DisasterStore>) -> App {
    let state = AppState::new(store, config.api.clone());
    let mut app = api_routes(state);

    if config.cache.enabled {
        let cache = CacheLayer::new(ResponseCache::new(), config.cache.ttl)
            .with_route_ttl(TIMESERIES_PATH, config.cache.timeseries_ttl)
            .with_key(cache_key);
        app = app.layer(cache);
    }
    app = app.layer(RequestBodyLimitLayer::new(config.server.body_limit));
    if config.server.response_time {
        app = app.layer(from_fn(response_time));
    }
    // Cached bodies are stored uncompressed, so gzip only runs without the cache.
    if config.server.compress && !config.cache.enabled {
        app = app.layer(CompressionLayer::new());
    }
    if config.server.cors {
        app = app.layer(cors_layer(&config.server));
    }
    let app = app
        .layer(trace_layer())
        .layer(CatchPanicLayer::custom(panic_response));
    // Routing happens inside the router, so the path must be rewritten before it.
    NormalizePathLayer::trim_trailing_slash().layer(app)
}
