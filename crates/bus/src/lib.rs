//! Kafka plumbing shared by every data-plane service.
//!
//! This crate provides:
//! - `BusConsumer`: manual-commit stream consumer with cancellation-aware
//!   receive, for at-least-once processing loops
//! - `BusProducer`: producer whose sends resolve only after broker
//!   acknowledgement
//! - payload decoding helpers for the JSON events on every topic

pub mod consumer;
pub mod error;
pub mod producer;

pub use consumer::{decode, BusConsumer};
pub use error::BusError;
pub use producer::BusProducer;

// Consumers need the `Message` trait in scope to read payloads.
pub use rdkafka::message::{BorrowedMessage, Message};
