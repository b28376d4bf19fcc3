use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use careplan_export::ExportError;
use careplan_order::{FieldErrors, SubmissionError, ValidationReport};

#[derive(Debug)]
pub enum AppError {
    /// Field-by-field shape errors; the body is the field map itself.
    Validation(FieldErrors),
    /// Duplicate check found blocking errors; the body is the full report.
    Rejected(ValidationReport),
    BadRequest(String),
    NotFound(String),
    /// Care-plan generation failed after the order was rolled back.
    GenerationFailed(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    pub fn submission(err: SubmissionError) -> Self {
        match err {
            SubmissionError::Invalid(errors) => AppError::Validation(errors),
            SubmissionError::Rejected(report) => AppError::Rejected(report),
            err @ SubmissionError::Drafting { .. } => AppError::GenerationFailed(err.to_string()),
            SubmissionError::Store(e) => AppError::Anyhow(e.into()),
        }
    }

    pub fn export(err: ExportError) -> Self {
        match err {
            ExportError::InvalidFormat(_) | ExportError::InvalidDate { .. } => {
                AppError::BadRequest(err.to_string())
            }
            other => AppError::Anyhow(other.into()),
        }
    }
}

fn detail(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            AppError::Rejected(report) => (StatusCode::BAD_REQUEST, Json(report)).into_response(),
            AppError::BadRequest(msg) => detail(StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => detail(StatusCode::NOT_FOUND, msg),
            AppError::GenerationFailed(msg) => {
                tracing::error!("Care plan generation failed: {}", msg);
                detail(StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {:#}", err);
                detail(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        }
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::Anyhow(err.into())
    }
}
