use axum::{
    http::Method,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod bookings;
pub mod error;
pub mod sessions;
pub mod state;
pub mod venues;
pub mod wallets;
pub mod worker;

pub use error::AppError;
pub use state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::USER_AGENT,
        ]);

    Router::new()
        .route("/health", get(health))
        .route("/v1/bookings", post(bookings::create_booking))
        .route("/v1/bookings/{id}", get(bookings::get_booking))
        .route("/v1/bookings/{id}/pay", post(bookings::pay_booking))
        .route("/v1/bookings/{id}/cancel", post(bookings::cancel_booking))
        .route("/v1/bookings/{id}/reassign", post(bookings::reassign_booking))
        .route("/v1/users/{user_id}/bookings", get(bookings::list_user_bookings))
        .route("/v1/users/{user_id}/wallets", get(wallets::list_wallets))
        .route("/v1/users/{user_id}/wallets/{venue_id}", get(wallets::get_wallet))
        .route("/v1/users/{user_id}/wallets/{venue_id}/topup", post(wallets::top_up))
        .route("/v1/venues/{venue_id}/login", post(sessions::login))
        .route("/v1/venues/{venue_id}/logout", post(sessions::logout))
        .route("/v1/venues/{venue_id}/pcs", get(venues::list_pcs))
        .route("/v1/venues/{venue_id}/events", get(venues::venue_events))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
