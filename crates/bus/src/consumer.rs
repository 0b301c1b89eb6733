//! Manual-commit Kafka consumer.

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::BorrowedMessage;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use alertflow_core::config::KafkaConfig;

use crate::error::BusError;

/// A consumer-group member with auto-commit disabled.
///
/// Offsets are committed explicitly by the processing loop after the
/// message's side effects have succeeded; a crash before the commit means
/// redelivery, which every downstream handler tolerates.
pub struct BusConsumer {
    inner: StreamConsumer,
}

impl BusConsumer {
    /// Create a consumer and subscribe it to `topics`.
    pub fn connect(config: &KafkaConfig, topics: &[&str]) -> Result<Self, BusError> {
        let inner: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .create()
            .map_err(|e| BusError::Config(format!("failed to create consumer: {e}")))?;

        inner
            .subscribe(topics)
            .map_err(|e| BusError::Config(format!("failed to subscribe to {topics:?}: {e}")))?;

        tracing::info!(
            brokers = %config.brokers,
            group_id = %config.group_id,
            ?topics,
            "kafka consumer subscribed"
        );

        Ok(Self { inner })
    }

    /// Wait for the next message. Returns `None` when `cancel` fires, so
    /// loops unwind without abandoning a received-but-unprocessed message.
    pub async fn recv(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Option<BorrowedMessage<'_>>, BusError> {
        tokio::select! {
            _ = cancel.cancelled() => Ok(None),
            msg = self.inner.recv() => Ok(Some(msg?)),
        }
    }

    /// Commit the offset of a processed message.
    pub fn commit(&self, msg: &BorrowedMessage<'_>) -> Result<(), BusError> {
        self.inner
            .commit_message(msg, CommitMode::Async)
            .map_err(|e| BusError::Commit(e.to_string()))
    }
}

/// Decode a JSON event payload. Empty payloads and malformed JSON are
/// persistent data errors, reported distinctly from transport failures.
pub fn decode<T: DeserializeOwned>(payload: Option<&[u8]>) -> Result<T, BusError> {
    let bytes = payload.ok_or_else(|| BusError::Payload("empty payload".to_string()))?;
    let text = std::str::from_utf8(bytes)
        .map_err(|e| BusError::Payload(format!("payload is not utf-8: {e}")))?;
    serde_json::from_str(text).map_err(|e| BusError::Payload(format!("invalid event: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alertflow_core::events::RuleChanged;
    use alertflow_core::Alert;

    #[test]
    fn decode_alert_payload() {
        let json = br#"{
            "alert_id": "3fa85f64-5717-4562-b3fc-2c963f66afa6",
            "schema_version": 1,
            "event_ts": 1700000000,
            "severity": "HIGH",
            "source": "api",
            "name": "timeout"
        }"#;
        let alert: Alert = decode(Some(json.as_slice())).unwrap();
        assert_eq!(alert.source, "api");
    }

    #[test]
    fn decode_rejects_empty_payload() {
        let err = decode::<Alert>(None).unwrap_err();
        assert!(matches!(err, BusError::Payload(_)));
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        let err = decode::<Alert>(Some(&[0xff, 0xfe][..])).unwrap_err();
        assert!(err.to_string().contains("utf-8"));
    }

    #[test]
    fn decode_rejects_malformed_event() {
        let err = decode::<RuleChanged>(Some(b"{\"rule_id\": 42}".as_slice())).unwrap_err();
        assert!(matches!(err, BusError::Payload(_)));
    }
}
