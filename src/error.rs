use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("invalid input for {field}: expected {expected}")]
    Validation { field: &'static str, expected: &'static str },

    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error("movie not found")]
    MovieNotFound,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("stored document could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::MalformedBody(_) | AppError::MovieNotFound => {
                StatusCode::BAD_REQUEST
            },
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Database(_) | AppError::Decode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Unauthorized(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }
        (status, Json(json!({ "status": "fail", "error": self.to_string() }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
