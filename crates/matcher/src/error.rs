//! Matcher error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatchError {
    /// Startup found no snapshot: the matcher must not run ruleless.
    #[error("no rule snapshot in the kv store; refusing to start without rules")]
    NoSnapshot,

    #[error(transparent)]
    Kv(#[from] alertflow_kv::KvError),

    #[error(transparent)]
    Bus(#[from] alertflow_bus::BusError),
}
