use std::sync::Arc;
use warnet_core::{BroadcastPublisher, PaymentGateway};
use warnet_order::SessionOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<SessionOrchestrator>,
    pub payments: Arc<dyn PaymentGateway>,
    /// Local fan-out feeding the SSE endpoint.
    pub events: BroadcastPublisher,
}
