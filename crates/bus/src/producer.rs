//! Acked Kafka producer.

use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use serde::Serialize;

use crate::error::BusError;

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

/// Producer whose `send_json` resolves only once the broker acknowledges
/// the write, so callers can order offset commits after delivery.
pub struct BusProducer {
    inner: FutureProducer,
}

impl BusProducer {
    /// Create a producer. `acks` controls how many replicas must confirm:
    /// `"1"` (leader only) for control-plane emits, `"all"` where the
    /// deployment runs replicated topics.
    pub fn connect(brokers: &str, acks: &str) -> Result<Self, BusError> {
        let inner: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", acks)
            .create()
            .map_err(|e| BusError::Config(format!("failed to create producer: {e}")))?;

        tracing::info!(brokers = %brokers, acks = %acks, "kafka producer ready");

        Ok(Self { inner })
    }

    /// Serialize `value` as JSON and send it keyed by `key`, waiting for
    /// broker acknowledgement.
    pub async fn send_json<T: Serialize>(
        &self,
        topic: &str,
        key: &str,
        value: &T,
    ) -> Result<(), BusError> {
        let payload = serde_json::to_string(value)
            .map_err(|e| BusError::Payload(format!("failed to serialize event: {e}")))?;

        let record = FutureRecord::to(topic).key(key).payload(&payload);
        self.inner
            .send(record, Timeout::After(SEND_TIMEOUT))
            .await
            .map_err(|(e, _)| BusError::Kafka(e))?;

        tracing::debug!(topic, key, bytes = payload.len(), "event produced");
        Ok(())
    }
}
