use async_trait::async_trait;
use tokio::sync::broadcast;
use warnet_shared::models::DomainEvent;

use crate::CoreResult;

/// Sink for domain events. Delivery is best effort; the core never rolls back
/// a committed transition because a subscriber was unreachable.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> CoreResult<()>;
}

/// In-process fan-out used by the SSE stream and by tests.
#[derive(Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<DomainEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, event: &DomainEvent) -> CoreResult<()> {
        // No subscribers is not an error.
        let _ = self.tx.send(event.clone());
        Ok(())
    }
}

/// Publishes to every inner sink, logging failures instead of stopping at the first.
pub struct FanoutPublisher {
    sinks: Vec<std::sync::Arc<dyn EventPublisher>>,
}

impl FanoutPublisher {
    pub fn new(sinks: Vec<std::sync::Arc<dyn EventPublisher>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl EventPublisher for FanoutPublisher {
    async fn publish(&self, event: &DomainEvent) -> CoreResult<()> {
        for sink in &self.sinks {
            if let Err(e) = sink.publish(event).await {
                tracing::error!("Failed to publish {}: {}", event.topic(), e);
            }
        }
        Ok(())
    }
}
