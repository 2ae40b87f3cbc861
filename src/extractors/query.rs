//! Extract and validate query parameters against a route's schema.

use crate::error::{AppError, ValidationError};
use crate::state::AppState;
use crate::validation::{QuerySchema, RawQuery};
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Query},
    http::{request::Parts, Uri},
};

/// Query parameters that passed schema `T`. Rejects with 400 before the handler runs.
#[derive(Clone, Debug)]
pub struct ValidatedQuery<T>(pub T);

#[async_trait]
impl<T> FromRequestParts<AppState> for ValidatedQuery<T>
where
    T: QuerySchema + Send,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let raw = raw_query(&parts.uri)?;
        let value = T::validate(&raw, &state.config)?;
        Ok(ValidatedQuery(value))
    }
}

/// Decode the query string of `uri`; an absent query string is an empty map.
pub fn raw_query(uri: &Uri) -> Result<RawQuery, ValidationError> {
    Query::<RawQuery>::try_from_uri(uri)
        .map(|Query(q)| q)
        .map_err(|e| ValidationError::field("query", e.body_text()))
}
