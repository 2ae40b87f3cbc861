//! Rows to GeoJSON features: the geometry column becomes the feature geometry, every other column a property.

use crate::error::AppError;
use crate::store::Row;
use geojson::{Feature, FeatureCollection, Geometry};
use serde_json::Value;

/// Column holding the row geometry as GeoJSON (`ST_AsGeoJSON(...)::json`).
pub const GEOMETRY_COLUMN: &str = "the_geom";

pub fn feature_collection(rows: Vec<Row>) -> Result<FeatureCollection, AppError> {
    let features = rows
        .into_iter()
        .map(row_to_feature)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

fn row_to_feature(mut row: Row) -> Result<Feature, AppError> {
    let geometry = match row.remove(GEOMETRY_COLUMN) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(parse_geometry(serde_json::from_str(&s)?)?),
        Some(v) => Some(parse_geometry(v)?),
    };
    Ok(Feature {
        bbox: None,
        geometry,
        id: None,
        properties: Some(row),
        foreign_members: None,
    })
}

fn parse_geometry(value: Value) -> Result<Geometry, AppError> {
    Geometry::try_from(value).map_err(|e| AppError::Internal(format!("invalid geometry: {}", e)))
}
