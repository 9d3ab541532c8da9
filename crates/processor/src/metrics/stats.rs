//! Engine metrics: events folded, group churn and merge throughput

use super::labels::{LabelNames, MetricLabels, OutcomeLabel};
use super::registry::MetricsRegistry;

use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use streamstats_types::ShardId;

type Labels = Vec<(String, String)>;

/// Handles to the engine's metric families
///
/// Cloning is cheap; clones update the same series.
#[derive(Debug, Clone, Default)]
pub struct StatsMetrics {
    events: Family<Labels, Counter>,
    groups: Family<Labels, Counter>,
    missing_samples: Family<Labels, Counter>,
    live_groups: Family<Labels, Gauge>,
    merged_results: Counter,
}

impl StatsMetrics {
    /// Create the metric families and register them
    pub fn register(registry: &MetricsRegistry) -> Self {
        let metrics = Self::default();
        registry.register_with(|registry| {
            registry.register(
                "events",
                "Events folded into a group table",
                metrics.events.clone(),
            );
            registry.register(
                "groups",
                "Group lifecycle transitions by outcome",
                metrics.groups.clone(),
            );
            registry.register(
                "missing_samples",
                "Declared source fields that did not resolve",
                metrics.missing_samples.clone(),
            );
            registry.register(
                "live_groups",
                "Groups currently held in memory",
                metrics.live_groups.clone(),
            );
            registry.register(
                "merged_results",
                "Partial results folded by merge reducers",
                metrics.merged_results.clone(),
            );
        });

        metrics
    }

    /// Record one event folded by `shard`
    pub fn record_event(&self, shard: &ShardId, created: bool, evicted: usize, live_groups: usize) {
        let labels = shard.labels();
        self.events.get_or_create(&labels.clone().into_vec()).inc();

        let outcome = if created {
            OutcomeLabel::Created
        } else {
            OutcomeLabel::Updated
        };
        self.groups
            .get_or_create(&labels.clone().with(LabelNames::OUTCOME, outcome).into_vec())
            .inc();
        if evicted > 0 {
            self.groups
                .get_or_create(
                    &labels
                        .clone()
                        .with(LabelNames::OUTCOME, OutcomeLabel::Evicted)
                        .into_vec(),
                )
                .inc_by(evicted as u64);
        }

        self.live_groups
            .get_or_create(&labels.into_vec())
            .set(live_groups as i64);
    }

    pub fn record_missing_samples(&self, shard: &ShardId, count: u64) {
        if count > 0 {
            self.missing_samples
                .get_or_create(&shard.labels().into_vec())
                .inc_by(count);
        }
    }

    pub fn record_merge(&self) {
        self.merged_results.inc();
    }

    /// Events folded by `shard` so far
    pub fn events(&self, shard: &ShardId) -> u64 {
        self.events.get_or_create(&shard.labels().into_vec()).get()
    }

    /// Groups of `shard` that went through `outcome` so far
    pub fn groups(&self, shard: &ShardId, outcome: OutcomeLabel) -> u64 {
        let labels = shard.labels().with(LabelNames::OUTCOME, outcome);
        self.groups.get_or_create(&labels.into_vec()).get()
    }

    pub fn live_groups(&self, shard: &ShardId) -> i64 {
        self.live_groups.get_or_create(&shard.labels().into_vec()).get()
    }

    pub fn merged_results(&self) -> u64 {
        self.merged_results.get()
    }
}
