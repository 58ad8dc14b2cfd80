use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use warnet_api::{app, AppState};
use warnet_catalog::{PricingEngine, StaticVenueCatalog, Venue};
use warnet_core::{BroadcastPublisher, ManualClock, MockPaymentGateway};
use warnet_order::{BookingPolicy, InMemoryRepository, SessionOrchestrator};

struct TestApp {
    router: Router,
    clock: Arc<ManualClock>,
}

async fn test_app() -> TestApp {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let events = BroadcastPublisher::new(64);
    let catalog = StaticVenueCatalog::new(vec![Venue {
        id: "net-1".to_string(),
        name: "Net One".to_string(),
        total_pcs: 4,
        regular_price_per_hour: 10_000,
        member_price_per_hour: 7_000,
    }]);

    let orchestrator = Arc::new(SessionOrchestrator::new(
        BookingPolicy::default(),
        PricingEngine::default(),
        Arc::new(InMemoryRepository::new()),
        Arc::new(catalog),
        Arc::new(events.clone()),
        clock.clone(),
    ));
    orchestrator.load().await.unwrap();

    let router = app(AppState {
        orchestrator,
        payments: Arc::new(MockPaymentGateway),
        events,
    });
    TestApp { router, clock }
}

async fn call(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn booking_body(user: &str, pc: u32, hours: f64, member: bool) -> Value {
    json!({
        "userId": user,
        "warnetId": "net-1",
        "pcNumber": pc,
        "date": "2026-10-18",
        "time": "20:00",
        "duration": hours,
        "isMember": member
    })
}

async fn paid_booking(router: &Router, user: &str, pc: u32, hours: f64, member: bool) -> String {
    let (status, booking) = call(router, "POST", "/v1/bookings", Some(booking_body(user, pc, hours, member))).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = booking["id"].as_str().unwrap().to_string();

    let (status, paid) = call(
        router,
        "POST",
        &format!("/v1/bookings/{}/pay", id),
        Some(json!({ "payment_method": "qris" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["payment_status"], "PAID");
    id
}

#[tokio::test]
async fn test_health() {
    let app = test_app().await;
    let (status, body) = call(&app.router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_member_booking_session_flow() {
    let app = test_app().await;
    let id = paid_booking(&app.router, "ani", 2, 2.0, true).await;

    let (status, wallets) = call(&app.router, "GET", "/v1/users/ani/wallets", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(wallets[0]["remaining_minutes"], 120.0);

    let (status, active) = call(&app.router, "POST", "/v1/venues/net-1/login", Some(json!({ "userId": "ani" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(active["status"], "ACTIVE");
    assert_eq!(active["id"], id.as_str());

    app.clock.advance(Duration::minutes(30));
    let (_, pcs) = call(&app.router, "GET", "/v1/venues/net-1/pcs", None).await;
    assert_eq!(pcs.as_array().unwrap().len(), 4);
    assert_eq!(pcs[1]["status"], "OCCUPIED");
    assert_eq!(pcs[1]["remaining_minutes"], 90.0);

    let (status, wallet) = call(&app.router, "GET", "/v1/users/ani/wallets/net-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(wallet["remaining_minutes"], 90.0);

    let (status, report) = call(&app.router, "POST", "/v1/venues/net-1/logout", Some(json!({ "user_id": "ani" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["booking"]["status"], "COMPLETED");
    assert_eq!(report["wallet_minutes_consumed"], 30.0);

    let (_, pcs) = call(&app.router, "GET", "/v1/venues/net-1/pcs", None).await;
    assert_eq!(pcs[1]["status"], "AVAILABLE");
}

#[tokio::test]
async fn test_cancel_window() {
    let app = test_app().await;
    let early = paid_booking(&app.router, "budi", 1, 1.0, false).await;
    app.clock.advance(Duration::seconds(119));
    let (status, cancelled) = call(&app.router, "POST", &format!("/v1/bookings/{}/cancel", early), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "CANCELLED");

    let late = paid_booking(&app.router, "budi", 1, 1.0, false).await;
    app.clock.advance(Duration::seconds(120));
    let (status, body) = call(&app.router, "POST", &format!("/v1/bookings/{}/cancel", late), None).await;
    assert_eq!(status, StatusCode::GONE);
    assert!(body["error"].as_str().unwrap().contains("Cancellation window"));

    // Cancelling twice is an invalid transition
    let (status, _) = call(&app.router, "POST", &format!("/v1/bookings/{}/cancel", early), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_occupied_pc_and_reassignment() {
    let app = test_app().await;
    paid_booking(&app.router, "citra", 3, 1.0, false).await;
    let queued = paid_booking(&app.router, "dedi", 3, 1.0, false).await;

    let (status, _) = call(&app.router, "POST", "/v1/venues/net-1/login", Some(json!({ "userId": "citra" }))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app.router, "POST", "/v1/venues/net-1/login", Some(json!({ "userId": "dedi" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, moved) = call(
        &app.router,
        "POST",
        &format!("/v1/bookings/{}/reassign", queued),
        Some(json!({ "pc": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(moved["pc_number"], 4);

    let (status, active) = call(&app.router, "POST", "/v1/venues/net-1/login", Some(json!({ "userId": "dedi" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(active["pc_number"], 4);

    // A running session stays on its PC
    let (status, _) = call(
        &app.router,
        "POST",
        &format!("/v1/bookings/{}/reassign", queued),
        Some(json!({ "pc": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_error_mapping() {
    let app = test_app().await;

    let (status, _) = call(&app.router, "GET", &format!("/v1/bookings/{}", uuid::Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&app.router, "POST", "/v1/bookings", Some(booking_body("eka", 1, 0.0, false))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app.router, "POST", "/v1/bookings", Some(booking_body("eka", 1, 1e12, false))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app.router, "POST", "/v1/bookings", Some(booking_body("eka", 99, 1.0, false))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut unknown_venue = booking_body("eka", 1, 1.0, false);
    unknown_venue["warnetId"] = json!("nowhere");
    let (status, _) = call(&app.router, "POST", "/v1/bookings", Some(unknown_venue)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // First member booking below the minimum
    let (status, _) = call(&app.router, "POST", "/v1/bookings", Some(booking_body("eka", 1, 1.0, true))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app.router, "POST", "/v1/venues/net-1/logout", Some(json!({ "userId": "eka" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wallet_payment_requires_balance() {
    let app = test_app().await;
    let (_, booking) = call(&app.router, "POST", "/v1/bookings", Some(booking_body("fajar", 1, 1.0, false))).await;
    let id = booking["id"].as_str().unwrap().to_string();

    let (status, _) = call(
        &app.router,
        "POST",
        &format!("/v1/bookings/{}/pay", id),
        Some(json!({ "paymentMethod": "member_wallet" })),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);

    let (status, wallet) = call(
        &app.router,
        "POST",
        "/v1/users/fajar/wallets/net-1/topup",
        Some(json!({ "minutes": 90 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(wallet["remaining_minutes"], 90.0);

    let (status, paid) = call(
        &app.router,
        "POST",
        &format!("/v1/bookings/{}/pay", id),
        Some(json!({ "paymentMethod": "member_wallet" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["payment_method"], "member_wallet");

    let (_, wallets) = call(&app.router, "GET", "/v1/users/fajar/wallets", None).await;
    assert_eq!(wallets[0]["remaining_minutes"], 30.0);

    let (status, _) = call(
        &app.router,
        "POST",
        &format!("/v1/bookings/{}/pay", id),
        Some(json!({ "paymentMethod": "cash" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_transfer_without_proof_is_rejected() {
    let app = test_app().await;
    let (_, booking) = call(&app.router, "POST", "/v1/bookings", Some(booking_body("gita", 1, 1.0, false))).await;
    let id = booking["id"].as_str().unwrap().to_string();

    let (status, _) = call(
        &app.router,
        "POST",
        &format!("/v1/bookings/{}/pay", id),
        Some(json!({ "payment_method": "bank_transfer" })),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);

    let (_, stored) = call(&app.router, "GET", &format!("/v1/bookings/{}", id), None).await;
    assert_eq!(stored["payment_status"], "PENDING");
}
