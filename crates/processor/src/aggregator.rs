//! Stream aggregator: folds one event at a time into its group table
//!
//! Each call to [`StreamAggregator::process`] runs the whole per-event
//! algorithm before returning:
//!
//! 1. Resolve the grouping fields (misses become `null`) and fingerprint them
//! 2. Look up or create the group entry, applying the eviction policy
//! 3. Run every function against its source field and store the new state
//! 4. Write emitted values and grouping values into a fresh outgoing record
//! 5. Tag the record and the input event with the group fingerprint
//! 6. Return exactly one [`PartialResult`]
//!
//! Nothing in this path fails: unresolvable fields are absent samples and
//! wrong-typed samples are skipped by the functors.

use crate::aggregation::{Sample, StatsPlan};
use crate::fields::{FieldResolver, JsonFieldResolver};
use crate::group::GroupKey;
use crate::metrics::StatsMetrics;
use crate::result::{GroupStates, PartialResult};
use crate::signature::{ExplicitOrContentHash, SignatureExtractor};
use crate::table::{EvictionPolicy, GroupTable};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use streamstats_types::{Event, EventId, GroupFingerprint, ShardId};
use tracing::{debug, trace};

/// Statistics for a stream aggregator
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct AggregatorStats {
    /// Total events folded
    pub events_processed: u64,

    /// Groups created, including re-creations after eviction
    pub groups_created: u64,

    /// Groups dropped by the eviction policy
    pub groups_evicted: u64,

    /// Declared source fields that did not resolve
    pub missing_samples: u64,

    /// Groups currently held
    pub live_groups: u64,
}

/// Per-shard group-by aggregator
///
/// Owns its group table exclusively; `process` takes `&mut self`, so one
/// event is fully folded before the next is accepted. Parallelism comes from
/// running several aggregators, one per shard, and merging their output
/// with a [`MergeReducer`](crate::reducer::MergeReducer).
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use streamstats_processor::{StatsPlan, StreamAggregator};
/// use streamstats_types::Event;
///
/// let plan = StatsPlan::parse(&["sum(amount) as total"], &["user"]).unwrap();
/// let mut aggregator = StreamAggregator::new(plan);
///
/// aggregator.process(&mut Event::new(json!({"user": "a", "amount": 10})));
/// let result = aggregator.process(&mut Event::new(json!({"user": "a", "amount": 5})));
///
/// assert_eq!(result.value("total"), Some(&json!(15.0)));
/// ```
pub struct StreamAggregator {
    plan: StatsPlan,
    shard: ShardId,
    table: GroupTable<GroupStates>,
    resolver: Arc<dyn FieldResolver>,
    signatures: Arc<dyn SignatureExtractor>,
    metrics: Option<StatsMetrics>,
    sequence: u64,
    stats: AggregatorStats,
}

impl StreamAggregator {
    /// Create an aggregator with an unbounded table and default collaborators
    ///
    /// The shard id is freshly generated, so independently built aggregators
    /// never share a slot in a merge reducer.
    pub fn new(plan: StatsPlan) -> Self {
        Self {
            plan,
            shard: ShardId::generate(),
            table: GroupTable::default(),
            resolver: Arc::new(JsonFieldResolver),
            signatures: Arc::new(ExplicitOrContentHash::new()),
            metrics: None,
            sequence: 0,
            stats: AggregatorStats::default(),
        }
    }

    pub fn with_shard(mut self, shard: ShardId) -> Self {
        self.shard = shard;
        self
    }

    /// Replace the group table with an empty one bounded by `policy`
    pub fn with_eviction(mut self, policy: EvictionPolicy) -> Self {
        self.table = GroupTable::new(policy);
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn FieldResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_signatures(mut self, signatures: Arc<dyn SignatureExtractor>) -> Self {
        self.signatures = signatures;
        self
    }

    pub fn with_metrics(mut self, metrics: StatsMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Fold one event and emit its partial result
    ///
    /// The input event is tagged with the group fingerprint.
    pub fn process(&mut self, event: &mut Event) -> PartialResult {
        self.process_at(event, Utc::now())
    }

    /// [`process`](Self::process) with an explicit clock, used for idle expiry
    pub fn process_at(&mut self, event: &mut Event, now: DateTime<Utc>) -> PartialResult {
        let key = GroupKey::resolve(self.plan.group_by(), event, self.resolver.as_ref());
        let fingerprint = key.fingerprint();
        let signature = self.signatures.signature(event);

        let (entry, upsert) = self.table.upsert(&fingerprint, key.clone(), now);

        let mut record = Event::empty();
        let mut states = GroupStates::new();
        let mut missing = 0u64;

        for function in self.plan.functions() {
            if function.functor.is_introspective() {
                continue;
            }

            let value = function
                .source
                .as_ref()
                .map(|path| self.resolver.read(event, path));
            let sample = match &value {
                Some(value) => {
                    if value.is_none() {
                        missing += 1;
                        trace!(
                            function = %function.spec,
                            group = %fingerprint.short(),
                            "Source field did not resolve"
                        );
                    }
                    Sample::new(value.as_ref(), &signature)
                }
                None => Sample::unsourced(&signature),
            };

            let destination = function.destination_name();
            let prior = entry.state.remove(destination);
            let (state, emitted) = function.functor.apply(&sample, prior);
            entry.state.insert(destination.to_string(), state.clone());
            states.insert(destination.to_string(), state);
            self.resolver.write(&mut record, &function.destination, emitted);
        }

        self.emit_introspective(&mut record, &signature);

        for (path, (_, value)) in self.plan.group_by().iter().zip(key.fields()) {
            self.resolver.write(&mut record, path, value.clone());
        }
        record.fingerprint = Some(fingerprint.clone());
        event.fingerprint = Some(fingerprint.clone());

        if upsert.created {
            self.stats.groups_created += 1;
            debug!(
                shard = %self.shard,
                group = %fingerprint.short(),
                groups = self.table.len(),
                "Created group"
            );
        }
        if !upsert.evicted.is_empty() {
            self.stats.groups_evicted += upsert.evicted.len() as u64;
            debug!(
                shard = %self.shard,
                evicted = upsert.evicted.len(),
                "Evicted groups"
            );
        }
        self.stats.events_processed += 1;
        self.stats.missing_samples += missing;
        self.stats.live_groups = self.table.len() as u64;

        if let Some(metrics) = &self.metrics {
            metrics.record_event(&self.shard, upsert.created, upsert.evicted.len(), self.table.len());
            metrics.record_missing_samples(&self.shard, missing);
        }

        self.sequence += 1;
        PartialResult {
            fingerprint,
            shard: self.shard.clone(),
            sequence: self.sequence,
            group: key,
            record,
            states,
        }
    }

    /// Functions that report on the table run after every other function, so
    /// the snapshot includes the current event
    fn emit_introspective(&self, record: &mut Event, signature: &EventId) {
        let mut snapshot: Option<Value> = None;
        for function in self.plan.functions() {
            if !function.functor.is_introspective() {
                continue;
            }
            let snapshot = snapshot.get_or_insert_with(|| self.table.snapshot());
            let (_, emitted) = function
                .functor
                .apply(&Sample::new(Some(snapshot), signature), None);
            self.resolver.write(record, &function.destination, emitted);
        }
    }

    /// Drop groups idle for longer than the eviction policy's TTL
    pub fn evict_idle(&mut self, now: DateTime<Utc>) -> Vec<GroupFingerprint> {
        let evicted = self.table.evict_idle(now);
        self.stats.groups_evicted += evicted.len() as u64;
        self.stats.live_groups = self.table.len() as u64;
        evicted
    }

    /// Current functor states of one group
    pub fn group_states(&self, fingerprint: &GroupFingerprint) -> Option<&GroupStates> {
        self.table.get(fingerprint).map(|entry| &entry.state)
    }

    /// JSON snapshot of the group table
    pub fn snapshot(&self) -> Value {
        self.table.snapshot()
    }

    pub fn plan(&self) -> &StatsPlan {
        &self.plan
    }

    pub fn shard(&self) -> &ShardId {
        &self.shard
    }

    pub fn group_count(&self) -> usize {
        self.table.len()
    }

    pub fn stats(&self) -> AggregatorStats {
        self.stats.clone()
    }

    /// Release all group state, keeping the plan and collaborators
    pub fn reset(&mut self) {
        self.table.clear();
        self.stats.live_groups = 0;
    }
}

impl std::fmt::Debug for StreamAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamAggregator")
            .field("shard", &self.shard)
            .field("groups", &self.table.len())
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use serde_json::json;
    use std::time::Duration;

    fn aggregator(functions: &[&str], by: &[&str]) -> StreamAggregator {
        StreamAggregator::new(StatsPlan::parse(functions, by).unwrap())
    }

    #[test]
    fn test_one_result_per_event() {
        let mut agg = aggregator(&["count()"], &["user"]);
        for (i, user) in ["a", "b", "a"].iter().enumerate() {
            let result = agg.process(&mut Event::new(json!({"user": user})).with_id(format!("e{i}")));
            assert_eq!(result.sequence, i as u64 + 1);
        }
        assert_eq!(agg.stats().events_processed, 3);
        assert_eq!(agg.stats().groups_created, 2);
        assert_eq!(agg.group_count(), 2);
    }

    #[test]
    fn test_record_carries_group_values_and_fingerprint() {
        let mut agg = aggregator(&["sum(amount) as total"], &["user", "region"]);
        let mut event = Event::new(json!({"user": "a", "amount": 3}));
        let result = agg.process(&mut event);

        assert_eq!(result.record.data, json!({"user": "a", "region": null, "total": 3.0}));
        assert_eq!(result.record.fingerprint.as_ref(), Some(&result.fingerprint));
        assert_eq!(event.fingerprint.as_ref(), Some(&result.fingerprint));
        assert_eq!(result.states.len(), 1);
    }

    #[test]
    fn test_default_destination_is_literal() {
        let mut agg = aggregator(&["max(a.b)"], &["user"]);
        let result = agg.process(&mut Event::new(json!({"user": "u", "a": {"b": 4}})));
        assert_eq!(result.record.data["max(a.b)"], json!(4));
    }

    #[test]
    fn test_nested_destination() {
        let mut agg = aggregator(&["min(v) as stats.low"], &["user"]);
        let result = agg.process(&mut Event::new(json!({"user": "u", "v": 2})));
        assert_eq!(result.record.data["stats"]["low"], json!(2));
    }

    #[test]
    fn test_missing_samples_are_counted() {
        let mut agg = aggregator(&["sum(amount)", "count(amount) as n"], &["user"]);
        let result = agg.process(&mut Event::new(json!({"user": "a"})));
        assert_eq!(result.value("sum(amount)"), Some(&json!(0.0)));
        assert_eq!(result.value("n"), Some(&json!(0)));
        assert_eq!(agg.stats().missing_samples, 2);
    }

    #[test]
    fn test_aggregates_snapshot_includes_current_event() {
        let mut agg = aggregator(&["count()", "aggregates()"], &["user"]);
        let result = agg.process(&mut Event::new(json!({"user": "a"})));
        let snapshot = result.value("aggregates()").unwrap();
        let group = &snapshot[result.fingerprint.as_str()];
        assert_eq!(group["group"], json!({"user": "a"}));
        assert_eq!(group["state"]["count()"]["kind"], json!("count"));
        assert!(!result.states.contains_key("aggregates()"));
    }

    #[test]
    fn test_eviction_restarts_group_from_zero() {
        let plan = StatsPlan::parse(&["sum(v) as total"], &["user"]).unwrap();
        let mut agg = StreamAggregator::new(plan)
            .with_eviction(EvictionPolicy::unbounded().with_max_groups(1));

        agg.process(&mut Event::new(json!({"user": "a", "v": 5})));
        agg.process(&mut Event::new(json!({"user": "b", "v": 1})));
        let result = agg.process(&mut Event::new(json!({"user": "a", "v": 2})));

        assert_eq!(result.value("total"), Some(&json!(2.0)));
        assert_eq!(agg.stats().groups_evicted, 2);
        assert_eq!(agg.group_count(), 1);
    }

    #[test]
    fn test_idle_expiry() {
        let plan = StatsPlan::parse(&["count()"], &["user"]).unwrap();
        let mut agg = StreamAggregator::new(plan)
            .with_eviction(EvictionPolicy::unbounded().with_idle_ttl(Duration::from_secs(5)));
        let start = Utc::now();

        agg.process_at(&mut Event::new(json!({"user": "a"})).with_id("1"), start);
        let evicted = agg.evict_idle(start + ChronoDuration::seconds(10));
        assert_eq!(evicted.len(), 1);
        assert_eq!(agg.group_count(), 0);
    }

    #[test]
    fn test_metrics_are_recorded() {
        let metrics = StatsMetrics::default();
        let shard = ShardId::indexed(3);
        let mut agg = aggregator(&["count()"], &["user"])
            .with_shard(shard.clone())
            .with_metrics(metrics.clone());
        agg.process(&mut Event::new(json!({"user": "a"})));
        assert_eq!(metrics.events(&shard), 1);
        assert_eq!(metrics.live_groups(&shard), 1);
    }

    #[test]
    fn test_reset_releases_groups() {
        let mut agg = aggregator(&["count()"], &["user"]);
        agg.process(&mut Event::new(json!({"user": "a"})));
        agg.reset();
        assert_eq!(agg.group_count(), 0);
        assert_eq!(agg.snapshot(), json!({}));
    }

    #[test]
    fn test_default_shards_are_distinct() {
        let left = aggregator(&["count()"], &["user"]);
        let right = aggregator(&["count()"], &["user"]);
        assert_ne!(left.shard(), right.shard());
    }

    #[test]
    fn test_identical_anonymous_events_count_once() {
        let mut agg = aggregator(&["count()"], &["user"]);
        for _ in 0..3 {
            agg.process(&mut Event::new(json!({"user": "a"})));
        }
        let result = agg.process(&mut Event::new(json!({"user": "a"})));
        assert_eq!(result.value("count()"), Some(&json!(1)));

        let result = agg.process(&mut Event::new(json!({"user": "a"})).with_id("evt-9"));
        assert_eq!(result.value("count()"), Some(&json!(2)));
    }
}
