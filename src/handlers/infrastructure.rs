use crate::error::AppError;
use crate::extractors::ValidatedQuery;
use crate::response::shaped;
use crate::state::AppState;
use crate::validation::{InfrastructureKind, OutputParams};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
};

pub async fn list_all(
    State(state): State<AppState>,
    ValidatedQuery(q): ValidatedQuery<OutputParams>,
) -> Result<impl IntoResponse, AppError> {
    let rows = state.store.infrastructure(None, q.city.as_deref()).await?;
    shaped(rows, &q, &state.config)
}

pub async fn list(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    ValidatedQuery(q): ValidatedQuery<OutputParams>,
) -> Result<impl IntoResponse, AppError> {
    let kind: InfrastructureKind = kind.parse()?;
    let rows = state.store.infrastructure(Some(kind), q.city.as_deref()).await?;
    shaped(rows, &q, &state.config)
}
