//! Process-wide metrics counters.
//!
//! Counters are plain atomic integers registered on first use; hot paths
//! increment without locking. A background reporter (see `alertflow-kv`)
//! snapshots the collector on an interval and publishes the JSON to the
//! KV store under `metrics:<service>`.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

/// Thread-safe named counter registry for one service process.
#[derive(Debug)]
pub struct MetricsCollector {
    service: String,
    started: Instant,
    counters: RwLock<HashMap<String, Arc<AtomicU64>>>,
}

impl MetricsCollector {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            started: Instant::now(),
            counters: RwLock::new(HashMap::new()),
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Fetch (registering if needed) the counter with the given name.
    pub fn counter(&self, name: &str) -> Arc<AtomicU64> {
        let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(counter) = counters.get(name) {
            return counter.clone();
        }
        drop(counters);
        let mut counters = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        counters
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(AtomicU64::new(0)))
            .clone()
    }

    pub fn incr(&self, name: &str) {
        self.counter(name).fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, name: &str, value: u64) {
        self.counter(name).fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self, name: &str) -> u64 {
        self.counter(name).load(Ordering::Relaxed)
    }

    /// Point-in-time view of every counter, sorted by name.
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, counter)| (name.clone(), counter.load(Ordering::Relaxed)))
            .collect()
    }

    /// JSON document written to `metrics:<service>`.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "service": self.service,
            "uptime_secs": self.started.elapsed().as_secs(),
            "counters": self.snapshot(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn incr_and_add() {
        let metrics = MetricsCollector::new("test");
        metrics.incr("alerts_consumed");
        metrics.incr("alerts_consumed");
        metrics.add("matches_emitted", 5);
        assert_eq!(metrics.get("alerts_consumed"), 2);
        assert_eq!(metrics.get("matches_emitted"), 5);
        assert_eq!(metrics.get("never_touched"), 0);
    }

    #[test]
    fn snapshot_is_sorted_and_complete() {
        let metrics = MetricsCollector::new("test");
        metrics.incr("b_counter");
        metrics.incr("a_counter");
        let snap = metrics.snapshot();
        let names: Vec<_> = snap.keys().cloned().collect();
        assert_eq!(names, vec!["a_counter", "b_counter"]);
    }

    #[test]
    fn concurrent_increments_are_lossless() {
        let metrics = Arc::new(MetricsCollector::new("test"));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let m = metrics.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    m.incr("hits");
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.get("hits"), 8000);
    }

    #[test]
    fn to_json_carries_service_and_counters() {
        let metrics = MetricsCollector::new("matcher");
        metrics.incr("alerts_consumed");
        let json = metrics.to_json();
        assert_eq!(json["service"], "matcher");
        assert_eq!(json["counters"]["alerts_consumed"], 1);
    }
}
