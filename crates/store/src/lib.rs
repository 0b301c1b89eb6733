//! PostgreSQL access for the data plane.
//!
//! The data plane touches three tables. Migrations live with the admin
//! stack; the shapes this crate relies on are:
//!
//! ```sql
//! CREATE TABLE rules (
//!     rule_id    UUID PRIMARY KEY,
//!     client_id  TEXT NOT NULL,
//!     severity   TEXT NOT NULL,
//!     source     TEXT NOT NULL,
//!     name       TEXT NOT NULL,
//!     enabled    BOOLEAN NOT NULL DEFAULT true,
//!     version    BIGINT NOT NULL DEFAULT 1,
//!     created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
//!     updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
//!     UNIQUE (client_id, severity, source, name)
//! );
//!
//! CREATE TABLE endpoints (
//!     endpoint_id UUID PRIMARY KEY,
//!     rule_id     UUID NOT NULL REFERENCES rules (rule_id) ON DELETE CASCADE,
//!     kind        TEXT NOT NULL CHECK (kind IN ('email', 'slack', 'webhook')),
//!     value       TEXT NOT NULL,
//!     enabled     BOOLEAN NOT NULL DEFAULT true,
//!     UNIQUE (rule_id, kind, value)
//! );
//!
//! CREATE TABLE notifications (
//!     notification_id UUID PRIMARY KEY,
//!     client_id       TEXT NOT NULL,
//!     alert_id        UUID NOT NULL,
//!     severity        TEXT NOT NULL,
//!     source          TEXT NOT NULL,
//!     name            TEXT NOT NULL,
//!     context         JSONB,
//!     rule_ids        UUID[] NOT NULL,
//!     status          TEXT NOT NULL CHECK (status IN ('RECEIVED', 'SENT')),
//!     created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
//!     updated_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
//!     UNIQUE (client_id, alert_id)
//! );
//! ```

pub mod endpoints;
pub mod error;
pub mod notifications;
pub mod rules;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use alertflow_core::config::PostgresConfig;

pub use endpoints::EndpointRepo;
pub use error::StoreError;
pub use notifications::NotificationRepo;
pub use rules::RuleRepo;

/// Open a connection pool from service configuration.
pub async fn connect(config: &PostgresConfig) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.dsn)
        .await?;
    tracing::info!(host = %config.redacted_host(), "postgres pool ready");
    Ok(pool)
}
