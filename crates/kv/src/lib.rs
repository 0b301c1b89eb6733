//! Redis access: the rule snapshot and service metrics.
//!
//! Key layout:
//! - `rules:snapshot` — JSON [`alertflow_core::Snapshot`], no TTL
//! - `rules:version` — monotonic integer, bumped atomically with every
//!   snapshot write
//! - `metrics:<service>` — JSON metrics snapshot, short TTL

pub mod error;
pub mod reporter;
pub mod store;

pub use error::KvError;
pub use reporter::run_metrics_reporter;
pub use store::{KvStore, SNAPSHOT_KEY, VERSION_KEY};
