//! Disaster reports: recent listing, single report, archive window and hourly counts.

use crate::error::AppError;
use crate::extractors::ValidatedQuery;
use crate::response::{shaped, success};
use crate::state::AppState;
use crate::store::ReportFilter;
use crate::validation::{report_id, OutputParams, ReportsQuery, WindowQuery};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;

/// Reports created within the last `timeperiod` seconds, newest first.
pub async fn list(
    State(state): State<AppState>,
    ValidatedQuery(q): ValidatedQuery<ReportsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let lookback = chrono::Duration::from_std(std::time::Duration::from_secs(q.timeperiod))
        .map_err(|e| AppError::Internal(format!("timeperiod out of range: {}", e)))?;
    let since = Utc::now()
        .checked_sub_signed(lookback)
        .ok_or_else(|| AppError::Internal("timeperiod out of range".into()))?;
    let filter = ReportFilter {
        city: q.output.city.clone(),
        since,
        limit: state.config.reports_limit,
    };
    let rows = state.store.reports(&filter).await?;
    shaped(rows, &q.output, &state.config)
}

pub async fn read(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedQuery(q): ValidatedQuery<OutputParams>,
) -> Result<impl IntoResponse, AppError> {
    let id = report_id(&id)?;
    let row = state
        .store
        .report(id, q.city.as_deref())
        .await?
        .ok_or_else(|| AppError::NotFound(format!("report {}", id)))?;
    shaped(vec![row], &q, &state.config)
}

pub async fn archive(
    State(state): State<AppState>,
    ValidatedQuery(q): ValidatedQuery<WindowQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rows = state
        .store
        .reports_archive(&q.window, q.output.city.as_deref())
        .await?;
    shaped(rows, &q.output, &state.config)
}

pub async fn timeseries(
    State(state): State<AppState>,
    ValidatedQuery(q): ValidatedQuery<WindowQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rows = state
        .store
        .report_counts(&q.window, q.output.city.as_deref())
        .await?;
    Ok(success(rows))
}
