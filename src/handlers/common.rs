//! Version, liveness, readiness and the catch-all 404.

use crate::error::not_found_body;
use crate::state::AppState;
use axum::{
    extract::{OriginalUri, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
pub struct VersionBody {
    version: String,
}

#[derive(Serialize)]
pub struct HealthBody {
    status: &'static str,
}

#[derive(Serialize)]
pub struct ReadyBody {
    status: &'static str,
    database: &'static str,
}

pub async fn version(State(state): State<AppState>) -> Json<VersionBody> {
    Json(VersionBody {
        version: state.config.version.clone(),
    })
}

pub async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<ReadyBody>) {
    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadyBody {
                status: "ok",
                database: "ok",
            }),
        ),
        Err(err) => {
            tracing::warn!(error = %err, "readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadyBody {
                    status: "degraded",
                    database: "unavailable",
                }),
            )
        }
    }
}

pub async fn not_found(OriginalUri(uri): OriginalUri) -> (StatusCode, Json<Value>) {
    (StatusCode::NOT_FOUND, Json(not_found_body(&uri.to_string())))
}
