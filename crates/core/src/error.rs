use thiserror::Error;

/// Startup configuration failures. These are fatal: services log the
/// specific variable and exit non-zero rather than run half-configured.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingVar(&'static str),
}
