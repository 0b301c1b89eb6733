//! Redis-backed snapshot and metrics store.

use std::sync::Arc;

use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;

use alertflow_core::config::RedisConfig;
use alertflow_core::Snapshot;

use crate::error::KvError;

pub const SNAPSHOT_KEY: &str = "rules:snapshot";
pub const VERSION_KEY: &str = "rules:version";

/// Compare-and-swap: write the snapshot and bump the version only if the
/// version is still what the writer read. An absent version counts as 0 so
/// the very first write bootstraps the keys. Runs atomically server-side,
/// so readers never observe a snapshot without its version bump.
const CAS_SCRIPT: &str = r#"
local current = redis.call('GET', KEYS[2])
if current == false then current = '0' end
if current ~= ARGV[2] then return 0 end
redis.call('SET', KEYS[1], ARGV[1])
redis.call('INCR', KEYS[2])
return 1
"#;

pub fn metrics_key(service: &str) -> String {
    format!("metrics:{service}")
}

/// Shared-state client. The snapshot builder is the only writer; matchers
/// and the metrics reporters are readers/side-writers.
#[derive(Clone)]
pub struct KvStore {
    conn: MultiplexedConnection,
    cas: Arc<redis::Script>,
}

impl KvStore {
    pub async fn connect(config: &RedisConfig) -> Result<Self, KvError> {
        let client = redis::Client::open(config.addr.as_str())?;
        let conn = client.get_multiplexed_async_connection().await?;
        tracing::info!(addr = %config.addr, "redis connection ready");
        Ok(Self {
            conn,
            cas: Arc::new(redis::Script::new(CAS_SCRIPT)),
        })
    }

    /// Current snapshot version; 0 when no snapshot has ever been written.
    pub async fn version(&self) -> Result<u64, KvError> {
        let mut conn = self.conn.clone();
        let version: Option<u64> = conn.get(VERSION_KEY).await?;
        Ok(version.unwrap_or(0))
    }

    /// Load the snapshot together with the version it was read at.
    /// `None` means no snapshot exists yet.
    pub async fn load_snapshot(&self) -> Result<Option<(Snapshot, u64)>, KvError> {
        let mut conn = self.conn.clone();
        let (raw, version): (Option<String>, Option<u64>) = redis::pipe()
            .get(SNAPSHOT_KEY)
            .get(VERSION_KEY)
            .query_async(&mut conn)
            .await?;

        let Some(raw) = raw else {
            return Ok(None);
        };
        let snapshot = decode_snapshot(&raw)?;
        Ok(Some((snapshot, version.unwrap_or(0))))
    }

    /// Atomically replace the snapshot and bump `rules:version`, but only
    /// if the version still equals `expected_version`. Returns whether the
    /// swap happened; `false` means another writer got there first and the
    /// caller should reload and re-patch.
    pub async fn store_snapshot_if_version(
        &self,
        snapshot: &Snapshot,
        expected_version: u64,
    ) -> Result<bool, KvError> {
        let raw = encode_snapshot(snapshot)?;
        let mut conn = self.conn.clone();
        let swapped: i64 = self
            .cas
            .key(SNAPSHOT_KEY)
            .key(VERSION_KEY)
            .arg(raw)
            .arg(expected_version.to_string())
            .invoke_async(&mut conn)
            .await?;
        Ok(swapped == 1)
    }

    /// Publish a metrics snapshot under `metrics:<service>` with a TTL so
    /// dead services age out of dashboards.
    pub async fn put_metrics(
        &self,
        service: &str,
        payload: &serde_json::Value,
        ttl_secs: u64,
    ) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(metrics_key(service), payload.to_string(), ttl_secs)
            .await?;
        Ok(())
    }
}

fn encode_snapshot(snapshot: &Snapshot) -> Result<String, KvError> {
    serde_json::to_string(snapshot).map_err(|e| KvError::Encoding(e.to_string()))
}

fn decode_snapshot(raw: &str) -> Result<Snapshot, KvError> {
    serde_json::from_str(raw).map_err(|e| KvError::Encoding(e.to_string()))
}
