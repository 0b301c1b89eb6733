//! Bus error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BusError {
    #[error("kafka configuration error: {0}")]
    Config(String),

    #[error("kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("message payload error: {0}")]
    Payload(String),

    #[error("offset commit error: {0}")]
    Commit(String),
}
