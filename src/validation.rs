//! Typed query schemas. Each route declares the struct it needs; `QuerySchema::validate`
//! turns the raw query string map into that struct or a per-field `ValidationError`.

use crate::config::ApiConfig;
use crate::error::ValidationError;
use crate::geo::GeoFormat;
use chrono::{DateTime, FixedOffset, Utc};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Query string as received: key to last value.
pub type RawQuery = HashMap<String, String>;

/// A query schema bound to the API configuration (allow-lists and defaults).
pub trait QuerySchema: Sized {
    fn validate(query: &RawQuery, config: &ApiConfig) -> Result<Self, ValidationError>;
}

/// Parameters accepted by every route: region filter and output encoding.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputParams {
    pub city: Option<String>,
    pub format: String,
    pub geo_format: GeoFormat,
}

/// Inclusive time range with `start <= end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FloodsQuery {
    pub output: OutputParams,
    pub minimum_state: Option<i32>,
}

/// Time-windowed routes: archives and timeseries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowQuery {
    pub output: OutputParams,
    pub window: TimeWindow,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportsQuery {
    pub output: OutputParams,
    /// Lookback in seconds from now.
    pub timeperiod: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InfrastructureKind {
    Floodgates,
    Pumps,
    Waterways,
}

impl InfrastructureKind {
    pub const ALL: [InfrastructureKind; 3] = [
        InfrastructureKind::Floodgates,
        InfrastructureKind::Pumps,
        InfrastructureKind::Waterways,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InfrastructureKind::Floodgates => "floodgates",
            InfrastructureKind::Pumps => "pumps",
            InfrastructureKind::Waterways => "waterways",
        }
    }
}

impl fmt::Display for InfrastructureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InfrastructureKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| {
                ValidationError::field(
                    "type",
                    "\"type\" must be one of [floodgates, pumps, waterways]",
                )
            })
    }
}

/// Parse a `/reports/:id` path segment.
pub fn report_id(raw: &str) -> Result<i64, ValidationError> {
    match raw.parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ValidationError::field("id", "\"id\" must be a positive integer")),
    }
}

/// Accumulates field errors while reading a raw query.
struct Fields<'a> {
    query: &'a RawQuery,
    errors: ValidationError,
}

impl<'a> Fields<'a> {
    fn new(query: &'a RawQuery) -> Self {
        Self {
            query,
            errors: ValidationError::new(),
        }
    }

    fn raw(&self, keys: &[&str]) -> Option<&'a str> {
        keys.iter().find_map(|k| self.query.get(*k)).map(String::as_str)
    }

    fn one_of(&mut self, keys: &[&str], allowed: &[String]) -> Option<String> {
        let value = self.raw(keys)?;
        if allowed.iter().any(|a| a == value) {
            Some(value.to_string())
        } else {
            self.errors.push(
                keys[0],
                format!("\"{}\" must be one of [{}]", keys[0], allowed.join(", ")),
            );
            None
        }
    }

    fn timestamp(&mut self, key: &str) -> Option<DateTime<Utc>> {
        let Some(value) = self.raw(&[key]) else {
            self.errors.push(key, format!("\"{}\" is required", key));
            return None;
        };
        match parse_timestamp(value) {
            Some(ts) => Some(ts.with_timezone(&Utc)),
            None => {
                self.errors.push(
                    key,
                    format!("\"{}\" must be a valid ISO 8601 timestamp (YYYY-MM-DDTHH:mm:ssZ)", key),
                );
                None
            }
        }
    }

    fn integer_in(&mut self, key: &str, min: i64, max: i64) -> Option<i64> {
        let value = self.raw(&[key])?;
        match value.parse::<i64>() {
            Ok(n) if (min..=max).contains(&n) => Some(n),
            _ => {
                self.errors.push(
                    key,
                    format!("\"{}\" must be an integer between {} and {}", key, min, max),
                );
                None
            }
        }
    }

    fn output(&mut self, config: &ApiConfig) -> OutputParams {
        let city = self.one_of(&["city"], &config.region_codes);
        let format = self
            .one_of(&["format"], &config.formats)
            .unwrap_or_else(|| config.format_default.clone());
        let allowed: Vec<String> = config.geo_formats.iter().map(|g| g.to_string()).collect();
        let geo_format = self
            .one_of(&["geoformat", "geoFormat"], &allowed)
            .and_then(|g| g.parse().ok())
            .unwrap_or(config.geo_format_default);
        OutputParams {
            city,
            format,
            geo_format,
        }
    }

    fn window(&mut self) -> Option<TimeWindow> {
        let start = self.timestamp("start");
        let end = self.timestamp("end");
        let (start, end) = (start?, end?);
        if end < start {
            self.errors
                .push("end", "\"end\" must be larger than or equal to \"start\"");
            return None;
        }
        Some(TimeWindow { start, end })
    }

    fn finish<T>(self, value: Option<T>) -> Result<T, ValidationError> {
        match value {
            Some(v) if self.errors.is_empty() => Ok(v),
            _ => Err(self.errors),
        }
    }
}

/// RFC 3339, or the compact `+0700` offset form. A `+` decoded to a space is tolerated.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let candidates = [raw.to_string(), raw.replacen(' ', "+", 1)];
    candidates.iter().find_map(|s| {
        DateTime::parse_from_rfc3339(s)
            .or_else(|_| DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z"))
            .ok()
    })
}

impl QuerySchema for OutputParams {
    fn validate(query: &RawQuery, config: &ApiConfig) -> Result<Self, ValidationError> {
        let mut fields = Fields::new(query);
        let output = fields.output(config);
        fields.finish(Some(output))
    }
}

impl QuerySchema for FloodsQuery {
    fn validate(query: &RawQuery, config: &ApiConfig) -> Result<Self, ValidationError> {
        let mut fields = Fields::new(query);
        let output = fields.output(config);
        let minimum_state = fields
            .integer_in(
                "minimum_state",
                i64::from(config.flood_state_min),
                i64::from(config.flood_state_max),
            )
            .map(|n| n as i32);
        fields.finish(Some(FloodsQuery {
            output,
            minimum_state,
        }))
    }
}

impl QuerySchema for WindowQuery {
    fn validate(query: &RawQuery, config: &ApiConfig) -> Result<Self, ValidationError> {
        let mut fields = Fields::new(query);
        let output = fields.output(config);
        let window = fields.window();
        fields.finish(window.map(|window| WindowQuery { output, window }))
    }
}

impl QuerySchema for ReportsQuery {
    fn validate(query: &RawQuery, config: &ApiConfig) -> Result<Self, ValidationError> {
        let mut fields = Fields::new(query);
        let output = fields.output(config);
        let max = i64::try_from(config.reports_time_window_max).unwrap_or(i64::MAX);
        let timeperiod = fields
            .integer_in("timeperiod", 1, max)
            .map(|n| n as u64)
            .unwrap_or(config.reports_time_window);
        fields.finish(Some(ReportsQuery { output, timeperiod }))
    }
}
