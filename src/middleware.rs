//! Cross-cutting request stages shared by every route.

use crate::config::{ApiConfig, ServerConfig};
use crate::error::AppError;
use crate::extractors::raw_query;
use crate::validation::{OutputParams, QuerySchema};
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::{
    cors::{Any as AnyOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

pub const RESPONSE_TIME_HEADER: &str = "x-response-time";

/// Reject requests whose `city`, `format` or `geoformat` fall outside the configured sets,
/// before any route-specific work.
pub async fn validate_output(
    State(config): State<Arc<ApiConfig>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let raw = raw_query(req.uri())?;
    OutputParams::validate(&raw, &config)?;
    Ok(next.run(req).await)
}

/// Adds `X-Response-Time: <ms>ms` to every response.
pub async fn response_time(req: Request, next: Next) -> Response {
    let started = Instant::now();
    let mut response = next.run(req).await;
    let elapsed = format!("{:.3}ms", started.elapsed().as_secs_f64() * 1000.0);
    if let Ok(value) = HeaderValue::from_str(&elapsed) {
        response.headers_mut().insert(RESPONSE_TIME_HEADER, value);
    }
    response
}

/// Any origin may read; only the configured headers are exposed.
pub fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let exposed: Vec<HeaderName> = config
        .cors_headers
        .iter()
        .filter_map(|h| HeaderName::from_bytes(h.trim().as_bytes()).ok())
        .collect();
    CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([header::ACCEPT, header::CONTENT_TYPE])
        .expose_headers(exposed)
        .max_age(Duration::from_secs(3600))
}

pub fn trace_layer(
) -> TraceLayer<tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>>
{
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(tower_http::LatencyUnit::Micros),
        )
}

/// Renders a handler panic as the standard JSON 500 body.
pub fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "handler panicked");
    let status = StatusCode::INTERNAL_SERVER_ERROR;
    (
        status,
        Json(serde_json::json!({
            "statusCode": status.as_u16(),
            "error": "internal_error",
            "message": "An internal server error occurred",
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware::from_fn, middleware::from_fn_with_state, routing::get, Router};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn api_config() -> Arc<ApiConfig> {
        Arc::new(ApiConfig {
            region_codes: vec!["jbd".into()],
            ..ApiConfig::default()
        })
    }

    fn get_req(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn output_validation_rejects_unknown_city() {
        let app = Router::new()
            .route("/reports", get(|| async { "ok" }))
            .layer(from_fn_with_state(api_config(), validate_output));

        let res = app.clone().oneshot(get_req("/reports?city=xxx")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["validation"]["keys"][0], "city");

        let res = app.oneshot(get_req("/reports?city=jbd")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn response_time_header_is_added() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(from_fn(response_time));
        let res = app.oneshot(get_req("/")).await.unwrap();
        let value = res.headers().get(RESPONSE_TIME_HEADER).unwrap().to_str().unwrap();
        assert!(value.ends_with("ms"));
    }

    #[tokio::test]
    async fn panics_render_as_json_500() {
        let res = panic_response(Box::new("boom"));
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = res.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["statusCode"], 500);
    }

    #[test]
    fn cors_layer_skips_invalid_header_names() {
        let config = ServerConfig {
            cors_headers: vec!["Content-Length".into(), "bad header".into()],
            ..crate::config::Config::default().server
        };
        let _layer = cors_layer(&config);
    }
}
