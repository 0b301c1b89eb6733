//! Rule control plane: validation and the publish path.
//!
//! The admin layer calls [`RulePublisher`] for every mutation that changes
//! rule matchability. Each call performs a durable store write followed by
//! a leader-acked `rule.changed` emit; emit failure fails the call so the
//! admin caller retries.

pub mod publisher;
pub mod validate;

pub use publisher::{NewRule, PublishError, RulePublisher};
pub use validate::{validate_criteria, ValidationError};
