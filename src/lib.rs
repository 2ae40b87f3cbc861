//! CogniCity data server: read-only REST API over flood, infrastructure and report data.

pub mod cache;
pub mod config;
pub mod error;
pub mod extractors;
pub mod geo;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod state;
pub mod store;
pub mod validation;

pub use cache::{CacheLayer, ResponseCache};
pub use config::{ApiConfig, Config};
pub use error::{AppError, ConfigError, ValidationError};
pub use geo::GeoFormat;
pub use response::{shaped, success};
pub use routes::{api_routes, build_app, App};
pub use state::AppState;
pub use store::{DisasterStore, PgStore, ReportFilter, Row};
