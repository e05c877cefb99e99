use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Application-level errors
///
/// Stage failures (`Synthesis`, `Enrichment`) keep the raw model output for
/// diagnostics. It is logged where the failure happens and never rendered into
/// the response body.
#[derive(thiserror::Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Query synthesis failed: {message}")]
    Synthesis {
        message: String,
        raw: Option<String>,
    },

    #[error("Ranking failed: {message}")]
    Enrichment {
        message: String,
        raw: Option<String>,
    },

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("External API error: {0}")]
    ExternalApi(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn synthesis(message: impl Into<String>, raw: Option<String>) -> Self {
        AppError::Synthesis {
            message: message.into(),
            raw,
        }
    }

    pub fn enrichment(message: impl Into<String>, raw: Option<String>) -> Self {
        AppError::Enrichment {
            message: message.into(),
            raw,
        }
    }

    /// Raw LLM text attached to a stage failure, if any
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            AppError::Synthesis { raw, .. } | AppError::Enrichment { raw, .. } => raw.as_deref(),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg),
            // details may quote model output, so they stay in the logs
            AppError::Synthesis { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Query synthesis failed".to_string(),
            ),
            AppError::Enrichment { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Ranking failed".to_string(),
            ),
            AppError::Catalog(_)
            | AppError::Database(_)
            | AppError::Cache(_)
            | AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()),
            AppError::ExternalApi(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::HttpClient(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
