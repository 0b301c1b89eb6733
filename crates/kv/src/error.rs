//! KV error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("snapshot encoding error: {0}")]
    Encoding(String),

    #[error("snapshot compare-and-swap exhausted after {attempts} attempts")]
    CasExhausted { attempts: u32 },
}
