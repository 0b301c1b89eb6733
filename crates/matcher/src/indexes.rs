//! Compiled match indexes and the intersection algorithm.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use uuid::Uuid;

use alertflow_core::{Alert, Snapshot, SnapshotRule, WILDCARD};

/// One field's inverted index: candidate lists for iteration plus hash
/// sets for O(1) membership during intersection.
#[derive(Debug, Default)]
struct FieldIndex {
    lists: HashMap<String, Vec<u32>>,
    sets: HashMap<String, HashSet<u32>>,
}

impl FieldIndex {
    fn from_snapshot(lists: &HashMap<String, Vec<u32>>) -> Self {
        let sets = lists
            .iter()
            .map(|(key, list)| (key.clone(), list.iter().copied().collect()))
            .collect();
        Self {
            lists: lists.clone(),
            sets,
        }
    }

    /// `lists[value] ∪ lists["*"]`. A rule indexes each field under
    /// exactly one key, so the union is disjoint.
    fn candidates(&self, value: &str) -> Vec<u32> {
        let mut out = Vec::new();
        if let Some(list) = self.lists.get(value) {
            out.extend_from_slice(list);
        }
        if let Some(list) = self.lists.get(WILDCARD) {
            out.extend_from_slice(list);
        }
        out
    }

    /// Membership in `sets[value] ∪ sets["*"]`.
    fn contains(&self, value: &str, rule_int: u32) -> bool {
        self.sets
            .get(value)
            .is_some_and(|set| set.contains(&rule_int))
            || self
                .sets
                .get(WILDCARD)
                .is_some_and(|set| set.contains(&rule_int))
    }
}

/// The matcher's in-memory projection of one snapshot version.
///
/// Built fresh on every reload from deserialized snapshot JSON, so a new
/// `Indexes` shares no mutable state with the one it replaces.
#[derive(Debug)]
pub struct Indexes {
    by_severity: FieldIndex,
    by_source: FieldIndex,
    by_name: FieldIndex,
    rules: HashMap<u32, SnapshotRule>,
    version: u64,
}

impl Indexes {
    pub fn build(snapshot: &Snapshot, version: u64) -> Self {
        Self {
            by_severity: FieldIndex::from_snapshot(&snapshot.by_severity),
            by_source: FieldIndex::from_snapshot(&snapshot.by_source),
            by_name: FieldIndex::from_snapshot(&snapshot.by_name),
            rules: snapshot.rules.clone(),
            version,
        }
    }

    /// Snapshot version this structure was compiled from.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Find every rule matching the alert's 3-tuple and group the matches
    /// by tenant: `client_id` to the rule ids that fired for it.
    ///
    /// Candidates for each field are the field's literal list unioned with
    /// its wildcard list. The smallest candidate list is scanned; the
    /// other two fields are checked by set membership. The result map is
    /// ordered so emission order is deterministic per alert.
    pub fn match_alert(&self, alert: &Alert) -> BTreeMap<String, Vec<Uuid>> {
        let severity = alert.severity.as_str();

        let l_sev = self.by_severity.candidates(severity);
        let l_src = self.by_source.candidates(&alert.source);
        let l_name = self.by_name.candidates(&alert.name);

        // Probe the smallest list; membership-test the other two.
        let mut survivors = BTreeSet::new();
        if l_sev.len() <= l_src.len() && l_sev.len() <= l_name.len() {
            for rule_int in l_sev {
                if self.by_source.contains(&alert.source, rule_int)
                    && self.by_name.contains(&alert.name, rule_int)
                {
                    survivors.insert(rule_int);
                }
            }
        } else if l_src.len() <= l_name.len() {
            for rule_int in l_src {
                if self.by_severity.contains(severity, rule_int)
                    && self.by_name.contains(&alert.name, rule_int)
                {
                    survivors.insert(rule_int);
                }
            }
        } else {
            for rule_int in l_name {
                if self.by_severity.contains(severity, rule_int)
                    && self.by_source.contains(&alert.source, rule_int)
                {
                    survivors.insert(rule_int);
                }
            }
        }

        let mut by_client: BTreeMap<String, Vec<Uuid>> = BTreeMap::new();
        for rule_int in survivors {
            if let Some(rule) = self.rules.get(&rule_int) {
                by_client
                    .entry(rule.client_id.clone())
                    .or_default()
                    .push(rule.rule_id);
            }
        }
        by_client
    }
}
