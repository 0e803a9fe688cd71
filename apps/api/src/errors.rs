use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::document::source::SourceError;
use crate::editor::session::EditorError;
use crate::flatten::FlattenError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// The request is well-formed but the document is in the wrong state for it.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Source document unreadable: {0}")]
    SourceDocumentUnreadable(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<EditorError> for AppError {
    fn from(err: EditorError) -> Self {
        match err {
            EditorError::NotEditable => AppError::Conflict(err.to_string()),
            EditorError::DuplicateFieldId(_) | EditorError::InvalidPageNumber(_) => {
                AppError::Validation(err.to_string())
            }
        }
    }
}

impl From<SourceError> for AppError {
    fn from(err: SourceError) -> Self {
        AppError::SourceDocumentUnreadable(err.to_string())
    }
}

impl From<FlattenError> for AppError {
    fn from(err: FlattenError) -> Self {
        match err {
            FlattenError::Unreadable(_) => AppError::SourceDocumentUnreadable(err.to_string()),
            FlattenError::Write(_) => AppError::Export(err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::SourceDocumentUnreadable(msg) => {
                tracing::warn!("Source document unreadable: {msg}");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "SOURCE_DOCUMENT_UNREADABLE",
                    msg.clone(),
                )
            }
            AppError::Export(msg) => {
                tracing::error!("Export error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "EXPORT_ERROR",
                    "The document could not be exported".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
