//! Query model: one read-only call per operation against the disaster database.
//!
//! Aggregation (maximum flood state over a window, hourly counts) happens in
//! the database; implementations only bind parameters and return rows.

mod postgres;
mod rows;

pub use postgres::PgStore;
pub use rows::row_to_json;

use crate::error::AppError;
use crate::validation::{InfrastructureKind, TimeWindow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One result row, column name to JSON value. Geometry columns hold GeoJSON.
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Filter for the recent-reports listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportFilter {
    pub city: Option<String>,
    /// Only reports created at or after this instant.
    pub since: DateTime<Utc>,
    pub limit: i64,
}

#[async_trait]
pub trait DisasterStore: Send + Sync {
    /// Cheap round trip used by the readiness probe.
    async fn ping(&self) -> Result<(), AppError>;

    /// Flooded local areas with geometry: `area_id`, `state`, `last_updated`, `the_geom`, names.
    async fn floods(&self, city: Option<&str>, minimum_state: Option<i32>) -> Result<Vec<Row>, AppError>;

    /// Current state of every flooded local area, without geometry.
    async fn flood_states(&self, city: Option<&str>, minimum_state: Option<i32>) -> Result<Vec<Row>, AppError>;

    /// Maximum flood state per area over the window: `area_id`, `last_updated`, `max_state`.
    async fn flood_max_states(&self, window: &TimeWindow, city: Option<&str>) -> Result<Vec<Row>, AppError>;

    /// Number of flooded areas per hour of the window: `ts`, `count`.
    async fn flood_counts(&self, window: &TimeWindow, city: Option<&str>) -> Result<Vec<Row>, AppError>;

    /// Infrastructure features; every kind when `kind` is `None`.
    async fn infrastructure(
        &self,
        kind: Option<InfrastructureKind>,
        city: Option<&str>,
    ) -> Result<Vec<Row>, AppError>;

    async fn reports(&self, filter: &ReportFilter) -> Result<Vec<Row>, AppError>;

    async fn report(&self, id: i64, city: Option<&str>) -> Result<Option<Row>, AppError>;

    async fn reports_archive(&self, window: &TimeWindow, city: Option<&str>) -> Result<Vec<Row>, AppError>;

    /// Number of reports per hour of the window: `ts`, `count`.
    async fn report_counts(&self, window: &TimeWindow, city: Option<&str>) -> Result<Vec<Row>, AppError>;

    /// Instance regions (cities) served by this deployment.
    async fn cities(&self) -> Result<Vec<Row>, AppError>;
}
