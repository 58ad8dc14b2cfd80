use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use warnet_order::WalletEntry;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TopUpRequest {
    #[serde(alias = "amount", alias = "amountMinutes", alias = "amount_minutes")]
    pub minutes: f64,
}

/// GET /v1/users/{user_id}/wallets
pub async fn list_wallets(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Json<Vec<WalletEntry>> {
    Json(state.orchestrator.wallets_for_user(&user_id).await)
}

/// GET /v1/users/{user_id}/wallets/{venue_id}
pub async fn get_wallet(
    State(state): State<AppState>,
    Path((user_id, venue_id)): Path<(String, String)>,
) -> Result<Json<WalletEntry>, AppError> {
    state
        .orchestrator
        .wallet(&user_id, &venue_id)
        .await
        .map(Json)
        .ok_or_else(|| AppError::NotFoundError(format!("No wallet for {} at {}", user_id, venue_id)))
}

/// POST /v1/users/{user_id}/wallets/{venue_id}/topup
pub async fn top_up(
    State(state): State<AppState>,
    Path((user_id, venue_id)): Path<(String, String)>,
    Json(req): Json<TopUpRequest>,
) -> Result<Json<WalletEntry>, AppError> {
    let entry = state.orchestrator.top_up(&user_id, &venue_id, req.minutes).await?;
    Ok(Json(entry))
}
