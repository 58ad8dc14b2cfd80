use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use warnet_catalog::OccupancyError;
use warnet_core::CoreError;
use warnet_order::{BookingError, LedgerError, SessionError};

#[derive(Debug)]
pub enum AppError {
    ValidationError(String),
    PaymentRequired(String),
    NotFoundError(String),
    ConflictError(String),
    GoneError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::PaymentRequired(msg) => (StatusCode::PAYMENT_REQUIRED, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::GoneError(msg) => (StatusCode::GONE, msg),
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationError(msg) => AppError::ValidationError(msg),
            CoreError::PaymentRejected(msg) => AppError::PaymentRequired(msg),
            other => AppError::Anyhow(other.into()),
        }
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        let msg = err.to_string();
        match err {
            BookingError::Validation(_) => AppError::ValidationError(msg),
            BookingError::NotFound(_) => AppError::NotFoundError(msg),
            BookingError::InvalidTransition { .. } => AppError::ConflictError(msg),
            BookingError::WindowExpired { .. } => AppError::GoneError(msg),
            BookingError::Ledger(e) => match e {
                LedgerError::NoBalance { .. } | LedgerError::InsufficientBalance { .. } => {
                    AppError::PaymentRequired(msg)
                }
                LedgerError::NotFound { .. } => AppError::NotFoundError(msg),
                LedgerError::InvalidAmount(_) => AppError::ValidationError(msg),
            },
            BookingError::Occupancy(e) => match e {
                OccupancyError::AlreadyOccupied { .. } => AppError::ConflictError(msg),
                OccupancyError::NotInitialized(_) | OccupancyError::UnknownSlot { .. } => {
                    AppError::NotFoundError(msg)
                }
                OccupancyError::InvalidDuration(_) => AppError::ValidationError(msg),
            },
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Booking(e) => e.into(),
            SessionError::Collaborator(e) => e.into(),
            e @ (SessionError::VenueNotFound(_)
            | SessionError::NoBookingForLogin { .. }
            | SessionError::NoActiveSession { .. }) => AppError::NotFoundError(e.to_string()),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}
