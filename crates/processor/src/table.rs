//! Group table: per-group state owned by one aggregator or reducer
//!
//! The table is a flat map from [`GroupFingerprint`] to a [`GroupEntry`]. It is
//! generic over the per-group payload so the stream aggregator (functor states
//! by destination) and the merge reducer (functor states by shard) share the
//! same bookkeeping and eviction logic.
//!
//! ## Eviction
//!
//! By default the table grows without bound. An [`EvictionPolicy`] can cap
//! the number of groups (least recently updated groups go first) and expire
//! groups that have not been updated for a while. Expiry is swept lazily on
//! every update. The group being updated is never evicted by its own update.

use crate::group::GroupKey;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;
use streamstats_types::GroupFingerprint;
use tracing::trace;

/// Memory bound for a group table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionPolicy {
    /// Maximum number of live groups
    pub max_groups: Option<usize>,

    /// Groups idle for longer than this are dropped
    pub idle_ttl: Option<Duration>,
}

impl EvictionPolicy {
    /// Keep every group forever
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_max_groups(mut self, max_groups: usize) -> Self {
        self.max_groups = Some(max_groups);
        self
    }

    pub fn with_idle_ttl(mut self, idle_ttl: Duration) -> Self {
        self.idle_ttl = Some(idle_ttl);
        self
    }

    pub fn is_unbounded(&self) -> bool {
        self.max_groups.is_none() && self.idle_ttl.is_none()
    }
}

/// One group and its payload
#[derive(Debug, Clone)]
pub struct GroupEntry<S> {
    /// Grouping values, kept for display
    pub key: GroupKey,

    /// Payload owned by the table
    pub state: S,

    /// Number of updates folded into this group
    pub updates: u64,

    /// When the group was created
    pub created_at: DateTime<Utc>,

    /// When the group was last updated
    pub last_update: DateTime<Utc>,

    /// Recency position, larger is more recent
    tick: u64,
}

impl<S> GroupEntry<S> {
    fn is_idle(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let age = now.signed_duration_since(self.last_update);
        age.num_milliseconds() > ttl.as_millis() as i64
    }
}

/// Outcome of [`GroupTable::upsert`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Upsert {
    /// The group did not exist before this update
    pub created: bool,

    /// Groups dropped to make room or because they expired
    pub evicted: Vec<GroupFingerprint>,
}

/// Fingerprint-keyed group table
#[derive(Debug)]
pub struct GroupTable<S> {
    entries: HashMap<GroupFingerprint, GroupEntry<S>>,

    /// tick -> fingerprint, oldest first
    recency: BTreeMap<u64, GroupFingerprint>,

    next_tick: u64,
    policy: EvictionPolicy,
    evicted_total: u64,
}

impl<S> Default for GroupTable<S> {
    fn default() -> Self {
        Self::new(EvictionPolicy::unbounded())
    }
}

impl<S> GroupTable<S> {
    pub fn new(policy: EvictionPolicy) -> Self {
        Self {
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            next_tick: 0,
            policy,
            evicted_total: 0,
        }
    }

    pub fn policy(&self) -> &EvictionPolicy {
        &self.policy
    }

    /// Look up the entry for `fingerprint`, creating it when new, and mark it
    /// as the most recently updated group
    ///
    /// Expired groups are swept first; when the group is new and the table is
    /// full, least recently updated groups are evicted to make room.
    pub fn upsert(
        &mut self,
        fingerprint: &GroupFingerprint,
        key: GroupKey,
        now: DateTime<Utc>,
    ) -> (&mut GroupEntry<S>, Upsert)
    where
        S: Default,
    {
        let mut outcome = Upsert {
            evicted: self.sweep_idle(now, Some(fingerprint)),
            ..Upsert::default()
        };

        if !self.entries.contains_key(fingerprint) {
            if let Some(max_groups) = self.policy.max_groups {
                while self.entries.len() >= max_groups.max(1) {
                    match self.evict_oldest() {
                        Some(evicted) => outcome.evicted.push(evicted),
                        None => break,
                    }
                }
            }
            outcome.created = true;
        }

        let tick = self.next_tick;
        self.next_tick += 1;

        let entry = self
            .entries
            .entry(fingerprint.clone())
            .or_insert_with(|| GroupEntry {
                key,
                state: S::default(),
                updates: 0,
                created_at: now,
                last_update: now,
                tick,
            });

        self.recency.remove(&entry.tick);
        self.recency.insert(tick, fingerprint.clone());
        entry.tick = tick;
        entry.updates += 1;
        entry.last_update = now;

        (entry, outcome)
    }

    /// Drop every group idle for longer than the policy's TTL
    pub fn evict_idle(&mut self, now: DateTime<Utc>) -> Vec<GroupFingerprint> {
        self.sweep_idle(now, None)
    }

    fn sweep_idle(&mut self, now: DateTime<Utc>, keep: Option<&GroupFingerprint>) -> Vec<GroupFingerprint> {
        let Some(ttl) = self.policy.idle_ttl else {
            return Vec::new();
        };

        // Recency order is update order, so the sweep stops at the first
        // group that is still fresh
        let mut expired = Vec::new();
        for fingerprint in self.recency.values() {
            if Some(fingerprint) == keep {
                continue;
            }
            match self.entries.get(fingerprint) {
                Some(entry) if entry.is_idle(ttl, now) => expired.push(fingerprint.clone()),
                Some(_) => break,
                None => {}
            }
        }

        for fingerprint in &expired {
            self.remove(fingerprint);
            self.evicted_total += 1;
            trace!(group = %fingerprint.short(), "Evicted idle group");
        }
        expired
    }

    fn evict_oldest(&mut self) -> Option<GroupFingerprint> {
        let (_, fingerprint) = self.recency.pop_first()?;
        self.entries.remove(&fingerprint);
        self.evicted_total += 1;
        trace!(group = %fingerprint.short(), "Evicted least recently updated group");
        Some(fingerprint)
    }

    pub fn get(&self, fingerprint: &GroupFingerprint) -> Option<&GroupEntry<S>> {
        self.entries.get(fingerprint)
    }

    pub fn remove(&mut self, fingerprint: &GroupFingerprint) -> Option<GroupEntry<S>> {
        let entry = self.entries.remove(fingerprint)?;
        self.recency.remove(&entry.tick);
        Some(entry)
    }

    pub fn contains(&self, fingerprint: &GroupFingerprint) -> bool {
        self.entries.contains_key(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total number of groups evicted since creation
    pub fn evicted_total(&self) -> u64 {
        self.evicted_total
    }

    /// Entries from least to most recently updated
    pub fn iter(&self) -> impl Iterator<Item = (&GroupFingerprint, &GroupEntry<S>)> {
        self.recency
            .values()
            .filter_map(|fp| self.entries.get(fp).map(|entry| (fp, entry)))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.recency.clear();
    }
}

impl<S: Serialize> GroupTable<S> {
    /// JSON snapshot of every group, keyed by fingerprint
    pub fn snapshot(&self) -> Value {
        let groups: Map<String, Value> = self
            .iter()
            .map(|(fingerprint, entry)| {
                let mut group = Map::new();
                group.insert("group".to_string(), entry.key.to_object());
                group.insert("updates".to_string(), Value::from(entry.updates));
                group.insert(
                    "last_update".to_string(),
                    Value::String(entry.last_update.to_rfc3339()),
                );
                group.insert(
                    "state".to_string(),
                    serde_json::to_value(&entry.state).unwrap_or(Value::Null),
                );
                (fingerprint.to_string(), Value::Object(group))
            })
            .collect();
        Value::Object(groups)
    }
}
