//! The compiled rule snapshot shared through the KV store.
//!
//! The snapshot is produced by the snapshot builder and read by every
//! matcher instance; readers never mutate it. Patch operations here are
//! pure so the builder can apply them in memory and persist the result
//! with a single atomic write.
//!
//! Index lists are keyed by literal criterion values, with the wildcard
//! `"*"` participating as an ordinary key. Dictionaries intern every
//! literal ever seen and are never compacted, so stale entries are
//! expected and harmless.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::rule::Rule;

/// Bumped when the snapshot JSON layout changes.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// What the matcher needs to know about a rule once it matched: who owns
/// it and how to report it downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotRule {
    pub rule_id: Uuid,
    pub client_id: String,
}

/// Inverted-index projection of all enabled rules.
///
/// `ruleInt` is a process-local integer assigned when a rule first enters
/// the snapshot; it is not stable across rebuilds. Every ruleInt present
/// in any index list has an entry in `rules`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub schema_version: u32,
    pub severity_dict: HashMap<String, u32>,
    pub source_dict: HashMap<String, u32>,
    pub name_dict: HashMap<String, u32>,
    pub by_severity: HashMap<String, Vec<u32>>,
    pub by_source: HashMap<String, Vec<u32>>,
    pub by_name: HashMap<String, Vec<u32>>,
    pub rules: HashMap<u32, SnapshotRule>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

impl Snapshot {
    pub fn new() -> Self {
        Self {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            severity_dict: HashMap::new(),
            source_dict: HashMap::new(),
            name_dict: HashMap::new(),
            by_severity: HashMap::new(),
            by_source: HashMap::new(),
            by_name: HashMap::new(),
            rules: HashMap::new(),
        }
    }

    /// Number of rules currently indexed.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Find the ruleInt assigned to a rule id, if it is in the snapshot.
    pub fn rule_int(&self, rule_id: Uuid) -> Option<u32> {
        self.rules
            .iter()
            .find(|(_, r)| r.rule_id == rule_id)
            .map(|(ri, _)| *ri)
    }

    fn next_rule_int(&self) -> u32 {
        self.rules.keys().max().map_or(0, |max| max + 1)
    }

    /// Index an enabled rule, replacing any prior entries for the same
    /// rule id. A disabled rule is treated as a removal, so applying the
    /// stored state of a rule is always correct regardless of which
    /// change event led here.
    ///
    /// Applying the same rule twice leaves the snapshot unchanged.
    pub fn apply_upsert(&mut self, rule: &Rule) {
        if !rule.enabled {
            self.apply_remove(rule.rule_id);
            return;
        }

        let rule_int = match self.rule_int(rule.rule_id) {
            Some(existing) => {
                self.deindex(existing);
                existing
            }
            None => self.next_rule_int(),
        };

        intern(&mut self.severity_dict, &rule.severity);
        intern(&mut self.source_dict, &rule.source);
        intern(&mut self.name_dict, &rule.name);

        index_insert(&mut self.by_severity, &rule.severity, rule_int);
        index_insert(&mut self.by_source, &rule.source, rule_int);
        index_insert(&mut self.by_name, &rule.name, rule_int);

        self.rules.insert(
            rule_int,
            SnapshotRule {
                rule_id: rule.rule_id,
                client_id: rule.client_id.clone(),
            },
        );
    }

    /// Remove a rule from every index list and from the rule table.
    /// Returns `false` if the rule id is unknown (already absent).
    pub fn apply_remove(&mut self, rule_id: Uuid) -> bool {
        let Some(rule_int) = self.rule_int(rule_id) else {
            return false;
        };
        self.deindex(rule_int);
        self.rules.remove(&rule_int);
        true
    }

    fn deindex(&mut self, rule_int: u32) {
        for index in [&mut self.by_severity, &mut self.by_source, &mut self.by_name] {
            index.retain(|_, list| {
                list.retain(|ri| *ri != rule_int);
                !list.is_empty()
            });
        }
    }

    /// Every ruleInt referenced by an index list resolves in `rules`, and
    /// every indexed rule appears in all three indexes exactly once.
    pub fn is_consistent(&self) -> bool {
        for index in [&self.by_severity, &self.by_source, &self.by_name] {
            for list in index.values() {
                for rule_int in list {
                    if !self.rules.contains_key(rule_int) {
                        return false;
                    }
                }
            }
        }
        for rule_int in self.rules.keys() {
            for index in [&self.by_severity, &self.by_source, &self.by_name] {
                let occurrences: usize = index
                    .values()
                    .map(|list| list.iter().filter(|ri| *ri == rule_int).count())
                    .sum();
                if occurrences != 1 {
                    return false;
                }
            }
        }
        true
    }
}

/// Assign the next dictionary slot to a literal if it is new. Slots are
/// never reclaimed, so `len()` is always a fresh value.
fn intern(dict: &mut HashMap<String, u32>, value: &str) {
    if !dict.contains_key(value) {
        let next = dict.len() as u32;
        dict.insert(value.to_string(), next);
    }
}

fn index_insert(index: &mut HashMap<String, Vec<u32>>, key: &str, rule_int: u32) {
    let list = index.entry(key.to_string()).or_default();
    if !list.contains(&rule_int) {
        list.push(rule_int);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn rule(id: Uuid, client: &str, severity: &str, source: &str, name: &str) -> Rule {
        Rule {
            rule_id: id,
            client_id: client.to_string(),
            severity: severity.to_string(),
            source: source.to_string(),
            name: name.to_string(),
            enabled: true,
            version: 1,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn upsert_indexes_all_three_fields() {
        let mut snap = Snapshot::new();
        let id = Uuid::new_v4();
        snap.apply_upsert(&rule(id, "client-1", "HIGH", "api", "timeout"));

        let ri = snap.rule_int(id).unwrap();
        assert_eq!(snap.by_severity["HIGH"], vec![ri]);
        assert_eq!(snap.by_source["api"], vec![ri]);
        assert_eq!(snap.by_name["timeout"], vec![ri]);
        assert_eq!(snap.rules[&ri].client_id, "client-1");
        assert!(snap.is_consistent());
    }

    #[test]
    fn upsert_is_idempotent() {
        let mut snap = Snapshot::new();
        let r = rule(Uuid::new_v4(), "client-1", "HIGH", "api", "timeout");
        snap.apply_upsert(&r);
        let first = snap.clone();
        snap.apply_upsert(&r);
        assert_eq!(snap, first);
    }

    #[test]
    fn update_reindexes_changed_field() {
        // CREATED with name=timeout, then UPDATED to name=error: the
        // ruleInt must move to the new key and leave nothing behind.
        let mut snap = Snapshot::new();
        let id = Uuid::new_v4();
        snap.apply_upsert(&rule(id, "client-1", "HIGH", "api", "timeout"));
        let ri = snap.rule_int(id).unwrap();

        snap.apply_upsert(&rule(id, "client-1", "HIGH", "api", "error"));
        assert_eq!(snap.rule_int(id), Some(ri));
        assert_eq!(snap.by_name["error"], vec![ri]);
        assert!(!snap.by_name.contains_key("timeout"));
        assert!(snap.is_consistent());
    }

    #[test]
    fn remove_drops_emptied_keys() {
        let mut snap = Snapshot::new();
        let keep = Uuid::new_v4();
        let drop = Uuid::new_v4();
        snap.apply_upsert(&rule(keep, "client-1", "HIGH", "api", "timeout"));
        snap.apply_upsert(&rule(drop, "client-2", "LOW", "api", "timeout"));

        assert!(snap.apply_remove(drop));
        assert!(!snap.by_severity.contains_key("LOW"));
        assert_eq!(snap.by_source["api"].len(), 1);
        assert_eq!(snap.len(), 1);
        assert!(snap.is_consistent());
    }

    #[test]
    fn remove_unknown_rule_is_noop() {
        let mut snap = Snapshot::new();
        snap.apply_upsert(&rule(Uuid::new_v4(), "client-1", "HIGH", "api", "timeout"));
        let before = snap.clone();
        assert!(!snap.apply_remove(Uuid::new_v4()));
        assert_eq!(snap, before);
    }

    #[test]
    fn disabled_rule_is_removed_on_upsert() {
        let mut snap = Snapshot::new();
        let id = Uuid::new_v4();
        snap.apply_upsert(&rule(id, "client-1", "HIGH", "api", "timeout"));

        let mut disabled = rule(id, "client-1", "HIGH", "api", "timeout");
        disabled.enabled = false;
        snap.apply_upsert(&disabled);

        assert!(snap.is_empty());
        assert!(snap.by_severity.is_empty());
        assert!(snap.by_source.is_empty());
        assert!(snap.by_name.is_empty());
    }

    #[test]
    fn wildcard_is_an_ordinary_key() {
        let mut snap = Snapshot::new();
        let id = Uuid::new_v4();
        snap.apply_upsert(&rule(id, "client-2", "*", "api", "timeout"));
        let ri = snap.rule_int(id).unwrap();
        assert_eq!(snap.by_severity["*"], vec![ri]);
        assert!(snap.severity_dict.contains_key("*"));
    }

    #[test]
    fn dictionaries_keep_stale_entries() {
        let mut snap = Snapshot::new();
        let id = Uuid::new_v4();
        snap.apply_upsert(&rule(id, "client-1", "HIGH", "api", "timeout"));
        snap.apply_remove(id);
        // Indexes are empty, dictionaries still carry the literals.
        assert!(snap.by_severity.is_empty());
        assert!(snap.severity_dict.contains_key("HIGH"));
        assert!(snap.name_dict.contains_key("timeout"));
    }

    #[test]
    fn rule_ints_are_unique_per_rule() {
        let mut snap = Snapshot::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        snap.apply_upsert(&rule(a, "client-1", "HIGH", "api", "timeout"));
        snap.apply_upsert(&rule(b, "client-1", "LOW", "db", "latency"));
        assert_ne!(snap.rule_int(a), snap.rule_int(b));
    }

    #[test]
    fn mutation_sequence_quiesces_to_enabled_set() {
        // Create three rules, update one, disable one, delete one: the
        // snapshot must end up holding exactly the surviving enabled rule.
        let mut snap = Snapshot::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        snap.apply_upsert(&rule(a, "client-1", "HIGH", "api", "timeout"));
        snap.apply_upsert(&rule(b, "client-2", "*", "api", "timeout"));
        snap.apply_upsert(&rule(c, "client-3", "LOW", "db", "latency"));

        snap.apply_upsert(&rule(a, "client-1", "CRITICAL", "api", "timeout"));
        let mut b_disabled = rule(b, "client-2", "*", "api", "timeout");
        b_disabled.enabled = false;
        snap.apply_upsert(&b_disabled);
        snap.apply_remove(c);

        assert_eq!(snap.len(), 1);
        let ri = snap.rule_int(a).unwrap();
        assert_eq!(snap.by_severity["CRITICAL"], vec![ri]);
        assert!(snap.is_consistent());
    }

    #[test]
    fn json_roundtrip_preserves_structure() {
        let mut snap = Snapshot::new();
        snap.apply_upsert(&rule(Uuid::new_v4(), "client-1", "HIGH", "api", "timeout"));
        snap.apply_upsert(&rule(Uuid::new_v4(), "client-2", "*", "api", "timeout"));

        let json = serde_json::to_string(&snap).unwrap();
        let back: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
        assert!(back.is_consistent());
    }
}
