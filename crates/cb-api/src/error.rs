//! JSON error envelope for the admin endpoints.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use cb_archive::ArchiveError;
use cb_core::error::AppError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("admin credential missing or invalid")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error("{0}")]
    Internal(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::ValidationError(msg) => Self::BadRequest(msg),
            // Records are only ever named inside request bodies.
            err @ AppError::NotFound(..) => Self::BadRequest(err.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(format!("i/o error: {err}"))
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Archive(ArchiveError::Io(_) | ArchiveError::Storage(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Archive(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        // Server-side details stay in the log.
        let message = if status.is_server_error() {
            log::error!("request failed: {self}");
            "internal server error".to_owned()
        } else {
            self.to_string()
        };
        HttpResponse::build(status).json(json!({ "success": false, "error": message }))
    }
}
