use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use trajekt_booking::BookingError;
use trajekt_domain::repository::StoreError;
use trajekt_payment::ReconError;

/// API-boundary error. Domain errors convert into the variant that carries
/// their HTTP meaning; everything unexpected falls into `Internal` and is
/// logged rather than leaked.
#[derive(Debug)]
pub enum AppError {
    Validation(String),
    NotFound(String),
    Conflict(String),
    Unprocessable(String),
    SignatureRejected(String),
    GatewayUnavailable(String),
    Internal(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::SignatureRejected(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::GatewayUnavailable(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Internal(err) => {
                tracing::error!("Internal Server Error: {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let message = err.to_string();
        match err {
            BookingError::Validation(_) | BookingError::Pricing(_) => AppError::Validation(message),
            BookingError::Capacity(_) | BookingError::Conflict => AppError::Conflict(message),
            BookingError::InvalidTransition { .. } | BookingError::TooLateToCancel { .. } => {
                AppError::Unprocessable(message)
            }
            BookingError::NotFound(_) => AppError::NotFound(message),
            BookingError::Store(inner) => AppError::from(inner),
        }
    }
}

impl From<ReconError> for AppError {
    fn from(err: ReconError) -> Self {
        let message = err.to_string();
        match err {
            ReconError::SignatureMismatch { .. } => AppError::SignatureRejected(message),
            ReconError::UnknownOrder(_) => AppError::NotFound(message),
            ReconError::RefundNotEligible(_) => AppError::Unprocessable(message),
            ReconError::Gateway(_) => AppError::GatewayUnavailable(message),
            ReconError::Booking(inner) => AppError::from(inner),
            ReconError::Store(inner) => AppError::from(inner),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        let message = err.to_string();
        match err {
            StoreError::NotFound(_) => AppError::NotFound(message),
            StoreError::Duplicate(_) | StoreError::VersionConflict(_) => AppError::Conflict(message),
            other => AppError::Internal(other.into()),
        }
    }
}
