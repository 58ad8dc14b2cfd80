use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{error, info};
use warnet_core::{CoreError, CoreResult, EventPublisher};
use warnet_shared::models::DomainEvent;

/// Publishes domain events to one Kafka topic, keyed by venue so every
/// venue's events stay ordered within a partition.
#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
    topic: String,
}

impl EventProducer {
    pub fn new(brokers: &str, topic: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
        })
    }

    pub async fn send(&self, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(&self.topic).key(key).payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!(
                    "Sent message to {}/{}: partition {} offset {}",
                    self.topic, key, delivery.partition, delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", self.topic, e);
                Err(e)
            }
        }
    }
}

#[async_trait]
impl EventPublisher for EventProducer {
    async fn publish(&self, event: &DomainEvent) -> CoreResult<()> {
        let payload = serde_json::to_string(event)?;
        self.send(event.venue_id(), &payload)
            .await
            .map_err(|e| CoreError::Unavailable(format!("kafka: {}", e)))
    }
}
