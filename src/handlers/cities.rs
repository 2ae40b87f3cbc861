use crate::error::AppError;
use crate::extractors::ValidatedQuery;
use crate::response::shaped;
use crate::state::AppState;
use crate::validation::OutputParams;
use axum::{extract::State, response::IntoResponse};

/// Instance regions served by this deployment, with their boundaries.
pub async fn list(
    State(state): State<AppState>,
    ValidatedQuery(q): ValidatedQuery<OutputParams>,
) -> Result<impl IntoResponse, AppError> {
    let rows = state.store.cities().await?;
    shaped(rows, &q, &state.config)
}
