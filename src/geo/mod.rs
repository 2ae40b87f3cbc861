//! Response shaping for rows that carry a geometry column.

mod features;
mod topology;

pub use features::{feature_collection, GEOMETRY_COLUMN};
pub use topology::{encode as topology, OBJECT_NAME};

use crate::error::AppError;
use crate::store::Row;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Geographic encoding of a response body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GeoFormat {
    GeoJson,
    TopoJson,
}

impl GeoFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            GeoFormat::GeoJson => "geojson",
            GeoFormat::TopoJson => "topojson",
        }
    }
}

impl fmt::Display for GeoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GeoFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "geojson" => Ok(GeoFormat::GeoJson),
            "topojson" => Ok(GeoFormat::TopoJson),
            other => Err(format!("unknown geo format '{}'", other)),
        }
    }
}

/// Shape rows into the requested encoding: a GeoJSON FeatureCollection or a TopoJSON Topology.
pub fn shape(rows: Vec<Row>, format: GeoFormat, quantization: u32) -> Result<Value, AppError> {
    let collection = feature_collection(rows)?;
    match format {
        GeoFormat::GeoJson => Ok(serde_json::to_value(&collection)?),
        GeoFormat::TopoJson => Ok(topology(&collection, quantization)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report_row() -> Row {
        json!({
            "pkey": 1,
            "source": "grasp",
            "the_geom": {"type": "Point", "coordinates": [106.8, -6.2]}
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn parses_known_geo_formats_only() {
        assert_eq!("geojson".parse::<GeoFormat>().unwrap(), GeoFormat::GeoJson);
        assert_eq!("topojson".parse::<GeoFormat>().unwrap(), GeoFormat::TopoJson);
        assert!("cap".parse::<GeoFormat>().is_err());
        assert!("GeoJSON".parse::<GeoFormat>().is_err());
    }

    #[test]
    fn shape_selects_encoding_from_format() {
        let geo = shape(vec![report_row()], GeoFormat::GeoJson, 10_000).unwrap();
        assert_eq!(geo["type"], "FeatureCollection");
        let topo = shape(vec![report_row()], GeoFormat::TopoJson, 10_000).unwrap();
        assert_eq!(topo["type"], "Topology");
        assert_eq!(topo["objects"][OBJECT_NAME]["geometries"][0]["properties"]["source"], "grasp");
    }
}
