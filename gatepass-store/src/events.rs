use async_trait::async_trait;
use gatepass_order::OrderNotifier;
use gatepass_shared::models::events::{OrderConfirmedEvent, TicketCheckedInEvent};
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use std::time::Duration;
use tracing::{error, info};

use crate::app_config::KafkaConfig;

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
    ) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic).key(key).payload(payload);

        match self
            .producer
            .send(record, Timeout::After(Duration::from_secs(0)))
            .await
        {
            Ok(delivery) => {
                info!(
                    "Sent message to {}/{}: partition {} offset {}",
                    topic, key, delivery.partition, delivery.offset
                );
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }
}

/// Publishes order notifications as JSON, keyed by order id so one order's
/// events stay on one partition.
pub struct KafkaNotifier {
    producer: EventProducer,
    order_topic: String,
    checkin_topic: String,
}

impl KafkaNotifier {
    pub fn new(config: &KafkaConfig) -> Result<Self, rdkafka::error::KafkaError> {
        Ok(Self {
            producer: EventProducer::new(&config.brokers)?,
            order_topic: config.order_topic.clone(),
            checkin_topic: config.checkin_topic.clone(),
        })
    }
}

#[async_trait]
impl OrderNotifier for KafkaNotifier {
    async fn order_confirmed(
        &self,
        event: &OrderConfirmedEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let payload = serde_json::to_string(event)?;
        self.producer
            .publish(&self.order_topic, &event.order_id.to_string(), &payload)
            .await?;
        Ok(())
    }

    async fn ticket_checked_in(
        &self,
        event: &TicketCheckedInEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let payload = serde_json::to_string(event)?;
        self.producer
            .publish(&self.checkin_topic, &event.order_id.to_string(), &payload)
            .await?;
        Ok(())
    }
}
