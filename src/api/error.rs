use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Not the owner of this file")]
    NotOwner,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Secure link has expired")]
    Expired,

    #[error("Secure link has already been used")]
    AlreadyUsed,

    #[error("A file cannot be shared with its owner")]
    SelfShare,

    #[error("No user is registered with email '{0}'")]
    RecipientNotFound(String),

    #[error("Invalid permission: {0}")]
    InvalidPermission(String),

    #[error("Storage failure: {0}")]
    StorageFailure(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Payload Too Large: {0}")]
    PayloadTooLarge(String),
}

impl AppError {
    /// Expired and used links share the user-facing "gone" outcome.
    pub fn is_gone(&self) -> bool {
        matches!(self, AppError::Expired | AppError::AlreadyUsed)
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotOwner | AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Expired | AppError::AlreadyUsed => StatusCode::GONE,
            AppError::SelfShare
            | AppError::RecipientNotFound(_)
            | AppError::InvalidPermission(_)
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::StorageFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(e: sea_orm::DbErr) -> Self {
        AppError::StorageFailure(e.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::StorageFailure(format!("{:#}", e))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AppError::StorageFailure(msg) => {
                tracing::error!("Storage failure: {}", msg);
                "Internal Server Error".to_string()
            }
            // Both map to 410; the reason stays visible to the caller.
            AppError::Expired | AppError::AlreadyUsed => self.to_string(),
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": message,
            "gone": self.is_gone(),
        }));

        (status, body).into_response()
    }
}
