//! Flood state: current flooded areas, per-area states, archive maxima and hourly counts.

use crate::error::AppError;
use crate::extractors::ValidatedQuery;
use crate::response::{shaped, success};
use crate::state::AppState;
use crate::validation::{FloodsQuery, WindowQuery};
use axum::{extract::State, response::IntoResponse};

pub async fn list(
    State(state): State<AppState>,
    ValidatedQuery(q): ValidatedQuery<FloodsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rows = state
        .store
        .floods(q.output.city.as_deref(), q.minimum_state)
        .await?;
    shaped(rows, &q.output, &state.config)
}

pub async fn states(
    State(state): State<AppState>,
    ValidatedQuery(q): ValidatedQuery<FloodsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rows = state
        .store
        .flood_states(q.output.city.as_deref(), q.minimum_state)
        .await?;
    Ok(success(rows))
}

/// Maximum state reached by each area within `[start, end]`.
pub async fn archive(
    State(state): State<AppState>,
    ValidatedQuery(q): ValidatedQuery<WindowQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rows = state
        .store
        .flood_max_states(&q.window, q.output.city.as_deref())
        .await?;
    Ok(success(rows))
}

pub async fn timeseries(
    State(state): State<AppState>,
    ValidatedQuery(q): ValidatedQuery<WindowQuery>,
) -> Result<impl IntoResponse, AppError> {
    let rows = state
        .store
        .flood_counts(&q.window, q.output.city.as_deref())
        .await?;
    Ok(success(rows))
}
