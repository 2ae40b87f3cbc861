//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
    #[error("validation: {0}")]
    Validation(String),
}

/// One rejected query parameter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub key: String,
    pub message: String,
}

/// Query parameters that failed their route schema. Collects every failing field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationError {
    pub details: Vec<FieldError>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-field rejection.
    pub fn field(key: impl Into<String>, message: impl Into<String>) -> Self {
        let mut err = Self::new();
        err.push(key, message);
        err
    }

    pub fn push(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.details.push(FieldError {
            key: key.into(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.details.is_empty()
    }

    /// Rejected keys in the order they were reported, without duplicates.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::with_capacity(self.details.len());
        for d in &self.details {
            if !keys.contains(&d.key) {
                keys.push(d.key.clone());
            }
        }
        keys
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.details.iter().map(|d| d.message.as_str()).collect();
        f.write_str(&messages.join("; "))
    }
}

impl std::error::Error for ValidationError {}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("database query timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("internal: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Db(_)
            | AppError::Timeout(_)
            | AppError::Serialization(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable `error` field of the body, snake_case for every kind.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::Db(_) => "database_error",
            AppError::Timeout(_) => "database_timeout",
            AppError::Serialization(_) => "serialization_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationDetail>,
}

#[derive(Serialize)]
pub struct ValidationDetail {
    pub source: &'static str,
    pub keys: Vec<String>,
    pub details: Vec<FieldError>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let validation = match &self {
            AppError::Validation(v) => Some(ValidationDetail {
                source: "query",
                keys: v.keys(),
                details: v.details.clone(),
            }),
            _ => None,
        };
        let body = ErrorBody {
            status_code: status.as_u16(),
            error: self.code().to_string(),
            message: self.to_string(),
            validation,
        };
        (status, Json(body)).into_response()
    }
}

/// Body for requests that matched no route.
pub fn not_found_body(url: &str) -> serde_json::Value {
    serde_json::json!({
        "statusCode": StatusCode::NOT_FOUND.as_u16(),
        "message": "URL not found",
        "url": url
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_keys_are_unique_and_ordered() {
        let mut err = ValidationError::new();
        err.push("start", "\"start\" is required");
        err.push("city", "\"city\" must be one of [jbd]");
        err.push("start", "\"start\" must be a valid ISO 8601 timestamp");
        assert_eq!(err.keys(), vec!["start".to_string(), "city".to_string()]);
        assert_eq!(err.details.len(), 3);
    }

    #[test]
    fn status_codes_follow_error_kind() {
        assert_eq!(
            AppError::from(ValidationError::field("city", "bad")).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::NotFound("1".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::Timeout(Duration::from_millis(10)).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(AppError::Timeout(Duration::from_millis(10)).code(), "database_timeout");
    }

    #[test]
    fn display_joins_field_messages() {
        let mut err = ValidationError::new();
        err.push("start", "a");
        err.push("end", "b");
        assert_eq!(err.to_string(), "a; b");
    }

    #[test]
    fn error_codes_are_snake_case() {
        let errors = [
            AppError::from(ValidationError::field("city", "bad")),
            AppError::NotFound("report 9".into()),
            AppError::Db(sqlx::Error::PoolTimedOut),
            AppError::Timeout(Duration::from_millis(10)),
            AppError::Internal("x".into()),
        ];
        for err in errors {
            let code = err.code();
            assert!(
                code.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "{} is not snake_case",
                code
            );
        }
        assert_eq!(AppError::NotFound("1".into()).code(), "not_found");
    }
}
