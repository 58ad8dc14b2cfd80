use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use uuid::Uuid;
use warnet_core::{PaymentConfirmation, PaymentMethod, PaymentStatus};
use warnet_order::{Booking, BookingRequest, ScheduledAt};
use warnet_shared::Masked;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    #[serde(alias = "userId")]
    pub user_id: String,
    #[serde(alias = "venueId", alias = "warnetId")]
    pub venue_id: String,
    #[serde(alias = "pcNumber", alias = "pc")]
    pub pc_number: u32,
    pub date: NaiveDate,
    /// `HH:MM` or `HH:MM:SS`
    pub time: String,
    #[serde(alias = "durationHours", alias = "duration")]
    pub duration_hours: f64,
    #[serde(default, alias = "isMemberBooking", alias = "isMember")]
    pub is_member_booking: bool,
}

impl TryFrom<CreateBookingRequest> for BookingRequest {
    type Error = AppError;

    fn try_from(req: CreateBookingRequest) -> Result<Self, AppError> {
        let time = NaiveTime::parse_from_str(&req.time, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(&req.time, "%H:%M"))
            .map_err(|_| AppError::ValidationError(format!("invalid time: {}", req.time)))?;

        Ok(BookingRequest {
            user_id: req.user_id,
            venue_id: req.venue_id,
            pc_number: req.pc_number,
            scheduled_at: ScheduledAt { date: req.date, time },
            duration_hours: req.duration_hours,
            is_member_booking: req.is_member_booking,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PayBookingRequest {
    #[serde(alias = "paymentMethod")]
    pub payment_method: PaymentMethod,
    #[serde(default, alias = "proofOfPayment")]
    pub proof_of_payment: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReassignRequest {
    #[serde(alias = "pcNumber", alias = "pc")]
    pub pc_number: u32,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/bookings
pub async fn create_booking(
    State(state): State<AppState>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state.orchestrator.create_booking(req.try_into()?).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// GET /v1/bookings/{id}
pub async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    state
        .orchestrator
        .booking(booking_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFoundError(format!("Booking not found: {}", booking_id)))
}

/// GET /v1/users/{user_id}/bookings
pub async fn list_user_bookings(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<Vec<Booking>> {
    Json(state.orchestrator.bookings_for_user(&user_id).await)
}

/// POST /v1/bookings/{id}/pay
/// Settles through the payment gateway first; the booking only moves to
/// paid once the gateway reports success.
pub async fn pay_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<PayBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state
        .orchestrator
        .booking(booking_id)
        .await
        .ok_or_else(|| AppError::NotFoundError(format!("Booking not found: {}", booking_id)))?;

    let confirmation = PaymentConfirmation {
        booking_id,
        method: req.payment_method,
        proof_of_payment: req.proof_of_payment.map(Masked::new),
    };

    match state.payments.settle(&confirmation).await? {
        PaymentStatus::Succeeded => {
            let paid = state
                .orchestrator
                .confirm_payment(booking_id, confirmation.method, confirmation.proof_of_payment)
                .await?;
            Ok((StatusCode::OK, Json(paid)))
        }
        PaymentStatus::Processing => {
            tracing::info!("Payment for booking {} still processing", booking_id);
            Ok((StatusCode::ACCEPTED, Json(booking)))
        }
        PaymentStatus::Failed => Err(AppError::PaymentRequired(format!(
            "payment for booking {} failed",
            booking_id
        ))),
    }
}

/// POST /v1/bookings/{id}/cancel
pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.orchestrator.cancel(booking_id).await?))
}

/// POST /v1/bookings/{id}/reassign
pub async fn reassign_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<ReassignRequest>,
) -> Result<Json<Booking>, AppError> {
    Ok(Json(state.orchestrator.reassign(booking_id, req.pc_number).await?))
}
