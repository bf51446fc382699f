use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// JSON body used for every error and for plain confirmations.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("No token, authorization denied")]
    Unauthenticated,

    #[error("Token is not valid")]
    InvalidCredential,

    #[error("Not authorized")]
    NotAuthorized,

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    /// Server-side failure whose message is safe to show the caller.
    #[error("{0}")]
    Failed(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Unauthenticated | AppError::InvalidCredential | AppError::NotAuthorized => {
                StatusCode::UNAUTHORIZED
            }
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Failed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) | AppError::Pool(_) | AppError::Internal(_) => {
                tracing::error!("{}", self);
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(Message::new("Internal server error")),
                )
                    .into_response();
            }
        };

        (status, Json(Message::new(self.to_string()))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
