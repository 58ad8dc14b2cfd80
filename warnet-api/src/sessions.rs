use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use warnet_order::{Booking, SessionReport, VenueLogin, VenueLogout};

use crate::error::AppError;
use crate::state::AppState;

/// Body of the operator's login/logout call. Without a booking id the
/// user's active (logout) or oldest paid (login) booking at the venue is used.
#[derive(Debug, Deserialize)]
pub struct VenueSessionRequest {
    #[serde(alias = "userId")]
    pub user_id: String,
    #[serde(default, alias = "bookingId")]
    pub booking_id: Option<Uuid>,
}

/// POST /v1/venues/{venue_id}/login
pub async fn login(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
    Json(req): Json<VenueSessionRequest>,
) -> Result<Json<Booking>, AppError> {
    let booking = state
        .orchestrator
        .login(VenueLogin {
            venue_id,
            user_id: req.user_id,
            booking_id: req.booking_id,
        })
        .await?;
    Ok(Json(booking))
}

/// POST /v1/venues/{venue_id}/logout
pub async fn logout(
    State(state): State<AppState>,
    Path(venue_id): Path<String>,
    Json(req): Json<VenueSessionRequest>,
) -> Result<Json<SessionReport>, AppError> {
    let report = state
        .orchestrator
        .logout(VenueLogout {
            venue_id,
            user_id: req.user_id,
            booking_id: req.booking_id,
        })
        .await?;
    Ok(Json(report))
}
