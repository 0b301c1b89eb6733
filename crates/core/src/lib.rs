pub mod alert;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod metrics;
pub mod notification;
pub mod rule;
pub mod snapshot;

pub use alert::{Alert, Severity};
pub use config::load_dotenv;
pub use endpoint::{Endpoint, EndpointKind};
pub use error::ConfigError;
pub use events::{AlertMatched, NotificationReady, RuleChangeAction, RuleChanged};
pub use metrics::MetricsCollector;
pub use notification::{Notification, NotificationStatus};
pub use rule::{Rule, WILDCARD};
pub use snapshot::{Snapshot, SnapshotRule};
