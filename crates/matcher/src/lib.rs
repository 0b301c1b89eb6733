//! Alert matcher: evaluates every alert against the compiled rule
//! snapshot and fans matches out per tenant.
//!
//! The compiled [`Indexes`] sits behind a single atomically swapped
//! reference; match operations load the pointer once and never observe a
//! half-reloaded structure. Reloads are triggered by a periodic version
//! poll and by a side consumer on `rule.changed`.

pub mod engine;
pub mod error;
pub mod indexes;
pub mod reload;

pub use engine::run_alert_loop;
pub use error::MatchError;
pub use indexes::Indexes;
pub use reload::{load_indexes, run_rule_change_listener, run_version_poller, SharedIndexes};
