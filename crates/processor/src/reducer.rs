//! Merge reducer: one authoritative result per group across shards
//!
//! Shards emit a running estimate for every event they fold, so the same
//! shard reports the same group over and over. Re-applying functors to those
//! running values would count them again (`sum` of 2 then 5 is not 7). The
//! reducer therefore keeps only the **latest** state per (group, shard) and
//! folds the shard states with [`Functor::merge`](crate::aggregation::Functor::merge)
//! whenever one of them changes.
//!
//! States come from [`PartialResult::states`]. Records that carry no state,
//! for example plain records from another process, are rebuilt from their
//! emitted values with `Functor::from_emitted`.

use crate::aggregation::{MergeOrder, Sample, StatsPlan};
use crate::fields::{FieldResolver, JsonFieldResolver};
use crate::group::GroupKey;
use crate::metrics::StatsMetrics;
use crate::result::{GroupStates, PartialResult};
use crate::table::{EvictionPolicy, GroupEntry, GroupTable};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use streamstats_types::{Event, EventId, GroupFingerprint, ShardId};
use tracing::{debug, trace};

/// Latest states reported by one shard for one group
#[derive(Debug, Clone, Serialize)]
pub struct ShardSlot {
    pub shard: ShardId,

    /// Sequence number of the result the states came from
    pub sequence: u64,

    /// Arrival position of the first result from this shard
    pub first_seen: u64,

    /// Arrival position of the latest result from this shard
    pub last_updated: u64,

    pub states: GroupStates,
}

/// Per-group payload of the reducer's table
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeGroup {
    pub shards: Vec<ShardSlot>,
}

impl MergeGroup {
    /// Slots in the fold order requested by a functor
    fn ordered(&self, order: MergeOrder) -> Vec<&ShardSlot> {
        let mut slots: Vec<&ShardSlot> = self.shards.iter().collect();
        match order {
            MergeOrder::FirstSeen => slots.sort_by_key(|slot| slot.first_seen),
            MergeOrder::LastUpdated => slots.sort_by_key(|slot| slot.last_updated),
        }
        slots
    }
}

/// Statistics for a merge reducer
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ReducerStats {
    /// Partial results folded
    pub results_merged: u64,

    /// Results older than the latest one already seen from their shard
    pub stale_results: u64,

    pub groups_created: u64,

    pub groups_evicted: u64,

    pub live_groups: u64,
}

/// Combines partial results from any number of shards
///
/// The reducer is not thread-safe on its own; put it behind a
/// [`SharedMergeReducer`] or drive it from a single task.
pub struct MergeReducer {
    plan: StatsPlan,
    shard: ShardId,
    table: GroupTable<MergeGroup>,
    resolver: Arc<dyn FieldResolver>,
    metrics: Option<StatsMetrics>,
    arrivals: u64,
    sequence: u64,
    stats: ReducerStats,
}

impl MergeReducer {
    /// Create a reducer for results produced by aggregators running `plan`
    pub fn new(plan: &StatsPlan) -> Self {
        Self {
            plan: plan.for_merge(),
            shard: ShardId::new("merge"),
            table: GroupTable::default(),
            resolver: Arc::new(JsonFieldResolver),
            metrics: None,
            arrivals: 0,
            sequence: 0,
            stats: ReducerStats::default(),
        }
    }

    /// Producer name written into merged results
    pub fn with_shard(mut self, shard: ShardId) -> Self {
        self.shard = shard;
        self
    }

    pub fn with_eviction(mut self, policy: EvictionPolicy) -> Self {
        self.table = GroupTable::new(policy);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn FieldResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_metrics(mut self, metrics: StatsMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Fold one partial result and emit the merged result for its group
    pub fn reduce(&mut self, result: &PartialResult) -> PartialResult {
        self.fold(
            result.fingerprint.clone(),
            result.group.clone(),
            &result.shard,
            Some(result.sequence),
            &result.states,
            &result.record,
            Utc::now(),
        )
    }

    /// Fold a plain record reported by `shard`
    ///
    /// The group is taken from the record's fingerprint tag when present and
    /// derived from the grouping fields otherwise. Values are rebuilt into
    /// states from the destination fields. A plain record always supersedes
    /// earlier reports from the same shard.
    pub fn ingest_record(&mut self, shard: &ShardId, record: &Event) -> PartialResult {
        let group = GroupKey::resolve(self.plan.group_by(), record, self.resolver.as_ref());
        let fingerprint = record
            .fingerprint
            .clone()
            .unwrap_or_else(|| group.fingerprint());
        self.fold(
            fingerprint,
            group,
            shard,
            None,
            &GroupStates::new(),
            record,
            Utc::now(),
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn fold(
        &mut self,
        fingerprint: GroupFingerprint,
        group: GroupKey,
        shard: &ShardId,
        sequence: Option<u64>,
        states: &GroupStates,
        record: &Event,
        now: DateTime<Utc>,
    ) -> PartialResult {
        self.arrivals += 1;
        let arrival = self.arrivals;

        let (entry, upsert) = self.table.upsert(&fingerprint, group, now);

        let slot_index = match entry.state.shards.iter().position(|s| &s.shard == shard) {
            Some(index) => index,
            None => {
                entry.state.shards.push(ShardSlot {
                    shard: shard.clone(),
                    sequence: 0,
                    first_seen: arrival,
                    last_updated: arrival,
                    states: GroupStates::new(),
                });
                entry.state.shards.len() - 1
            }
        };
        let slot = &mut entry.state.shards[slot_index];

        let stale = matches!(sequence, Some(seq) if seq < slot.sequence);
        if stale {
            self.stats.stale_results += 1;
            trace!(
                shard = %shard,
                sequence = ?sequence,
                latest = slot.sequence,
                "Ignoring stale partial result"
            );
        } else {
            slot.sequence = sequence.unwrap_or(slot.sequence + 1);
            slot.last_updated = arrival;
            for function in self.plan.functions() {
                if function.functor.is_introspective() {
                    continue;
                }
                let destination = function.destination_name();
                let state = states.get(destination).cloned().or_else(|| {
                    function
                        .source
                        .as_ref()
                        .and_then(|path| self.resolver.read(record, path))
                        .and_then(|value| function.functor.from_emitted(&value))
                });
                if let Some(state) = state {
                    slot.states.insert(destination.to_string(), state);
                }
            }
        }

        let (mut merged, merged_states) = render(&self.plan, self.resolver.as_ref(), entry);
        let key = entry.key.clone();

        self.emit_introspective(&mut merged);
        merged.fingerprint = Some(fingerprint.clone());

        if upsert.created {
            self.stats.groups_created += 1;
            debug!(group = %fingerprint.short(), "Created merge group");
        }
        self.stats.groups_evicted += upsert.evicted.len() as u64;
        self.stats.results_merged += 1;
        self.stats.live_groups = self.table.len() as u64;
        if let Some(metrics) = &self.metrics {
            metrics.record_event(&self.shard, upsert.created, upsert.evicted.len(), self.table.len());
            metrics.record_merge();
        }

        self.sequence += 1;
        PartialResult {
            fingerprint,
            shard: self.shard.clone(),
            sequence: self.sequence,
            group: key,
            record: merged,
            states: merged_states,
        }
    }

    fn emit_introspective(&self, record: &mut Event) {
        let signature = EventId::from_string(self.shard.as_str());
        let mut snapshot: Option<Value> = None;
        for function in self.plan.functions() {
            if !function.functor.is_introspective() {
                continue;
            }
            let snapshot = snapshot.get_or_insert_with(|| self.table.snapshot());
            let (_, emitted) = function
                .functor
                .apply(&Sample::new(Some(snapshot), &signature), None);
            self.resolver.write(record, &function.destination, emitted);
        }
    }

    /// Current merged result for one group, without folding anything
    pub fn current(&self, fingerprint: &GroupFingerprint) -> Option<PartialResult> {
        let entry = self.table.get(fingerprint)?;
        Some(self.snapshot_result(fingerprint, entry))
    }

    /// Current merged result of every group, least recently updated first
    ///
    /// Meant for end of stream, when only final values matter.
    pub fn finish(&self) -> Vec<PartialResult> {
        self.table
            .iter()
            .map(|(fingerprint, entry)| self.snapshot_result(fingerprint, entry))
            .collect()
    }

    fn snapshot_result(&self, fingerprint: &GroupFingerprint, entry: &GroupEntry<MergeGroup>) -> PartialResult {
        let (mut record, states) = render(&self.plan, self.resolver.as_ref(), entry);
        self.emit_introspective(&mut record);
        record.fingerprint = Some(fingerprint.clone());
        PartialResult {
            fingerprint: fingerprint.clone(),
            shard: self.shard.clone(),
            sequence: self.sequence,
            group: entry.key.clone(),
            record,
            states,
        }
    }

    pub fn evict_idle(&mut self, now: DateTime<Utc>) -> Vec<GroupFingerprint> {
        let evicted = self.table.evict_idle(now);
        self.stats.groups_evicted += evicted.len() as u64;
        self.stats.live_groups = self.table.len() as u64;
        evicted
    }

    pub fn plan(&self) -> &StatsPlan {
        &self.plan
    }

    pub fn group_count(&self) -> usize {
        self.table.len()
    }

    pub fn stats(&self) -> ReducerStats {
        self.stats.clone()
    }

    pub fn snapshot(&self) -> Value {
        self.table.snapshot()
    }
}

impl std::fmt::Debug for MergeReducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MergeReducer")
            .field("shard", &self.shard)
            .field("groups", &self.table.len())
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

/// Fold the shard states of one group into an outgoing record
fn render(
    plan: &StatsPlan,
    resolver: &dyn FieldResolver,
    entry: &GroupEntry<MergeGroup>,
) -> (Event, GroupStates) {
    let mut record = Event::empty();
    let mut merged_states = GroupStates::new();

    for function in plan.functions() {
        if function.functor.is_introspective() {
            continue;
        }
        let destination = function.destination_name();
        let merged = entry
            .state
            .ordered(function.functor.merge_order())
            .into_iter()
            .filter_map(|slot| slot.states.get(destination))
            .fold(None, |acc, state| match acc {
                None => Some(state.clone()),
                Some(acc) => Some(function.functor.merge(acc, state)),
            });

        let emitted = match &merged {
            Some(state) => function.functor.emit(state),
            None => function.functor.emit_empty(),
        };
        resolver.write(&mut record, &function.destination, emitted);
        if let Some(state) = merged {
            merged_states.insert(destination.to_string(), state);
        }
    }

    for (path, (_, value)) in plan.group_by().iter().zip(entry.key.fields()) {
        resolver.write(&mut record, path, value.clone());
    }

    (record, merged_states)
}

/// Merge reducer behind a mutex, for thread-based embedders
///
/// Clones share the same reducer.
#[derive(Debug, Clone)]
pub struct SharedMergeReducer {
    inner: Arc<Mutex<MergeReducer>>,
}

impl SharedMergeReducer {
    pub fn new(reducer: MergeReducer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(reducer)),
        }
    }

    pub fn reduce(&self, result: &PartialResult) -> PartialResult {
        self.inner.lock().reduce(result)
    }

    pub fn ingest_record(&self, shard: &ShardId, record: &Event) -> PartialResult {
        self.inner.lock().ingest_record(shard, record)
    }

    pub fn finish(&self) -> Vec<PartialResult> {
        self.inner.lock().finish()
    }

    pub fn stats(&self) -> ReducerStats {
        self.inner.lock().stats()
    }
}
