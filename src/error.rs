use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to connect to database: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("{context}: {source}")]
    Query {
        context: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("invalid email or password")]
    Auth,

    #[error("failed to hash password: {0}")]
    Hash(String),

    #[error("failed to {stage} transaction: {source}")]
    Transaction {
        stage: &'static str,
        #[source]
        source: sqlx::Error,
    },

    #[error("{0} timed out")]
    Timeout(&'static str),
}

pub type AppResult<T> = Result<T, AppError>;

// SQLSTATE raised when `statement_timeout` fires.
const QUERY_CANCELED: &str = "57014";

impl AppError {
    /// Adapter for `map_err` that tags a driver error with the statement it came from.
    pub fn query(context: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
        move |source| AppError::Query { context, source }
    }

    pub fn transaction(stage: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
        move |source| AppError::Transaction { stage, source }
    }

    /// Postgres cancelled the statement because `statement_timeout` expired.
    pub fn is_statement_timeout(&self) -> bool {
        match self {
            AppError::Query { source, .. } => source
                .as_database_error()
                .and_then(|e| e.code())
                .is_some_and(|code| code == QUERY_CANCELED),
            _ => false,
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Auth => StatusCode::UNAUTHORIZED,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Connection(_)
            | AppError::Query { .. }
            | AppError::Hash(_)
            | AppError::Transaction { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_type, message) = match &self {
            AppError::NotFound(msg) => ("not_found", msg.clone()),
            AppError::Auth => ("invalid_credentials", self.to_string()),
            AppError::Timeout(_) => ("timeout", "The request timed out".to_string()),
            _ => {
                tracing::error!(error = %self, "internal error");
                ("internal_error", "An internal error occurred".to_string())
            }
        };

        (
            status,
            Json(json!({
                "error": {
                    "type": error_type,
                    "message": message
                }
            })),
        )
            .into_response()
    }
}
