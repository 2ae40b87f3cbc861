//! Standard response envelope: `{statusCode, result}`.

use crate::config::ApiConfig;
use crate::error::AppError;
use crate::geo;
use crate::store::Row;
use crate::validation::OutputParams;
use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub status_code: u16,
    pub result: T,
}

pub fn success<T: Serialize>(result: T) -> (StatusCode, Json<Envelope<T>>) {
    (
        StatusCode::OK,
        Json(Envelope {
            status_code: StatusCode::OK.as_u16(),
            result,
        }),
    )
}

/// Rows with a geometry column, encoded per the validated `geoformat`.
pub fn shaped(
    rows: Vec<Row>,
    output: &OutputParams,
    config: &ApiConfig,
) -> Result<(StatusCode, Json<Envelope<Value>>), AppError> {
    let result = geo::shape(rows, output.geo_format, config.topojson_quantization)?;
    Ok(success(result))
}
