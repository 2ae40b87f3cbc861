//! PostGIS-backed store. Every call is a single parameterized statement bounded by the configured timeout.

use crate::config::DatabaseConfig;
use crate::error::AppError;
use crate::store::{row_to_json, DisasterStore, ReportFilter, Row};
use crate::validation::{InfrastructureKind, TimeWindow};
use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};
use std::time::Duration;

const FLOODS_SQL: &str = r#"
SELECT ST_AsGeoJSON(la.the_geom)::json AS the_geom, la.pkey AS area_id, la.geom_id,
       la.area_name, la.parent_name, la.city_name, rs.state, rs.last_updated
FROM cognicity.local_areas la
JOIN cognicity.rem_status rs ON la.pkey = rs.local_area
WHERE rs.state IS NOT NULL
  AND ($1::text IS NULL OR la.instance_region_code = $1)
  AND ($2::int IS NULL OR rs.state >= $2)
"#;

const FLOOD_STATES_SQL: &str = r#"
SELECT rs.local_area AS area_id, rs.state, rs.last_updated
FROM cognicity.rem_status rs
JOIN cognicity.local_areas la ON la.pkey = rs.local_area
WHERE rs.state IS NOT NULL
  AND ($1::text IS NULL OR la.instance_region_code = $1)
  AND ($2::int IS NULL OR rs.state >= $2)
"#;

const FLOOD_MAX_STATES_SQL: &str = r#"
SELECT mf.local_area AS area_id, mf.changed AS last_updated, mf.max_state
FROM cognicity.rem_get_max_flood($1, $2) mf
JOIN cognicity.local_areas la ON la.pkey = mf.local_area
WHERE ($3::text IS NULL OR la.instance_region_code = $3)
"#;

const FLOOD_COUNTS_SQL: &str = r#"
SELECT ts,
       (SELECT count(*)
        FROM cognicity.rem_get_max_flood(ts, ts + interval '1 hour') mf
        JOIN cognicity.local_areas la ON la.pkey = mf.local_area
        WHERE ($3::text IS NULL OR la.instance_region_code = $3)) AS count
FROM generate_series(date_trunc('hour', $1::timestamptz),
                     date_trunc('hour', $2::timestamptz),
                     '1 hour'::interval) AS ts
ORDER BY ts
"#;

const REPORT_COLUMNS: &str = "pkey, created_at, source, status, url, image_url, disaster_type, \
     report_data, tags, title, text, ST_AsGeoJSON(the_geom)::json AS the_geom";

const REPORT_COUNTS_SQL: &str = r#"
SELECT ts, count(r.pkey) AS count
FROM generate_series(date_trunc('hour', $1::timestamptz),
                     date_trunc('hour', $2::timestamptz),
                     '1 hour'::interval) AS ts
LEFT JOIN cognicity.all_reports r
  ON date_trunc('hour', r.created_at) = ts
 AND ($3::text IS NULL OR r.tags->>'instance_region_code' = $3)
GROUP BY ts
ORDER BY ts
"#;

const CITIES_SQL: &str = r#"
SELECT code, name, ST_AsGeoJSON(the_geom)::json AS the_geom
FROM cognicity.instance_regions
ORDER BY code
"#;

/// SELECT for one infrastructure table; `$1` is the optional region code.
fn infrastructure_select(kind: InfrastructureKind) -> String {
    format!(
        "SELECT name, '{kind}'::text AS type, ST_AsGeoJSON(the_geom)::json AS the_geom \
         FROM infrastructure.{kind} \
         WHERE ($1::text IS NULL OR tags->>'instance_region_code' = $1)",
        kind = kind.as_str()
    )
}

fn infrastructure_sql(kind: Option<InfrastructureKind>) -> String {
    match kind {
        Some(k) => infrastructure_select(k),
        None => InfrastructureKind::ALL
            .into_iter()
            .map(infrastructure_select)
            .collect::<Vec<_>>()
            .join(" UNION ALL "),
    }
}

pub struct PgStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgStore {
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Open a pool against `config.url`. Connection acquisition shares the query timeout.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.timeout)
            .connect(&config.url)
            .await?;
        Ok(Self::new(pool, config.timeout))
    }

    async fn fetch_all<'q>(&self, query: Query<'q, Postgres, PgArguments>) -> Result<Vec<Row>, AppError> {
        let rows = tokio::time::timeout(self.timeout, query.fetch_all(&self.pool))
            .await
            .map_err(|_| AppError::Timeout(self.timeout))??;
        Ok(rows.iter().map(row_to_json).collect())
    }
}

#[async_trait]
impl DisasterStore for PgStore {
    async fn ping(&self) -> Result<(), AppError> {
        self.fetch_all(sqlx::query("SELECT 1")).await.map(|_| ())
    }

    async fn floods(&self, city: Option<&str>, minimum_state: Option<i32>) -> Result<Vec<Row>, AppError> {
        tracing::debug!(sql = FLOODS_SQL, ?city, ?minimum_state, "query");
        self.fetch_all(sqlx::query(FLOODS_SQL).bind(city).bind(minimum_state))
            .await
    }

    async fn flood_states(&self, city: Option<&str>, minimum_state: Option<i32>) -> Result<Vec<Row>, AppError> {
        tracing::debug!(sql = FLOOD_STATES_SQL, ?city, ?minimum_state, "query");
        self.fetch_all(sqlx::query(FLOOD_STATES_SQL).bind(city).bind(minimum_state))
            .await
    }

    async fn flood_max_states(&self, window: &TimeWindow, city: Option<&str>) -> Result<Vec<Row>, AppError> {
        tracing::debug!(sql = FLOOD_MAX_STATES_SQL, start = %window.start, end = %window.end, ?city, "query");
        self.fetch_all(
            sqlx::query(FLOOD_MAX_STATES_SQL)
                .bind(window.start)
                .bind(window.end)
                .bind(city),
        )
        .await
    }

    async fn flood_counts(&self, window: &TimeWindow, city: Option<&str>) -> Result<Vec<Row>, AppError> {
        tracing::debug!(sql = FLOOD_COUNTS_SQL, start = %window.start, end = %window.end, ?city, "query");
        self.fetch_all(
            sqlx::query(FLOOD_COUNTS_SQL)
                .bind(window.start)
                .bind(window.end)
                .bind(city),
        )
        .await
    }

    async fn infrastructure(
        &self,
        kind: Option<InfrastructureKind>,
        city: Option<&str>,
    ) -> Result<Vec<Row>, AppError> {
        let sql = infrastructure_sql(kind);
        tracing::debug!(sql = %sql, ?city, "query");
        self.fetch_all(sqlx::query(&sql).bind(city)).await
    }

    async fn reports(&self, filter: &ReportFilter) -> Result<Vec<Row>, AppError> {
        let sql = format!(
            "SELECT {} FROM cognicity.all_reports \
             WHERE created_at >= $1 \
               AND ($2::text IS NULL OR tags->>'instance_region_code' = $2) \
             ORDER BY created_at DESC LIMIT $3",
            REPORT_COLUMNS
        );
        tracing::debug!(sql = %sql, since = %filter.since, city = ?filter.city, limit = filter.limit, "query");
        self.fetch_all(
            sqlx::query(&sql)
                .bind(filter.since)
                .bind(filter.city.as_deref())
                .bind(filter.limit),
        )
        .await
    }

    async fn report(&self, id: i64, city: Option<&str>) -> Result<Option<Row>, AppError> {
        let sql = format!(
            "SELECT {} FROM cognicity.all_reports \
             WHERE pkey = $1 \
               AND ($2::text IS NULL OR tags->>'instance_region_code' = $2)",
            REPORT_COLUMNS
        );
        tracing::debug!(sql = %sql, id, ?city, "query");
        let rows = self.fetch_all(sqlx::query(&sql).bind(id).bind(city)).await?;
        Ok(rows.into_iter().next())
    }

    async fn reports_archive(&self, window: &TimeWindow, city: Option<&str>) -> Result<Vec<Row>, AppError> {
        let sql = format!(
            "SELECT {} FROM cognicity.all_reports \
             WHERE created_at >= $1 AND created_at <= $2 \
               AND ($3::text IS NULL OR tags->>'instance_region_code' = $3) \
             ORDER BY created_at DESC",
            REPORT_COLUMNS
        );
        tracing::debug!(sql = %sql, start = %window.start, end = %window.end, ?city, "query");
        self.fetch_all(
            sqlx::query(&sql)
                .bind(window.start)
                .bind(window.end)
                .bind(city),
        )
        .await
    }

    async fn report_counts(&self, window: &TimeWindow, city: Option<&str>) -> Result<Vec<Row>, AppError> {
        tracing::debug!(sql = REPORT_COUNTS_SQL, start = %window.start, end = %window.end, ?city, "query");
        self.fetch_all(
            sqlx::query(REPORT_COUNTS_SQL)
                .bind(window.start)
                .bind(window.end)
                .bind(city),
        )
        .await
    }

    async fn cities(&self) -> Result<Vec<Row>, AppError> {
        tracing::debug!(sql = CITIES_SQL, "query");
        self.fetch_all(sqlx::query(CITIES_SQL)).await
    }
}
