//! Sharded aggregation pipeline on tokio tasks
//!
//! Events are routed round-robin to `shards` aggregator tasks. Every partial
//! result goes through one channel into a single reducer task, which is the
//! merge barrier, and merged results come out of [`ShardedStats::recv`].
//!
//! ```text
//! send ─┬─> shard-0 ─┐
//!       ├─> shard-1 ─┼─> reducer ─> [LatestBuffer] ─> recv
//!       └─> shard-N ─┘
//! ```
//!
//! All channels are bounded by [`PipelineConfig::channel_capacity`]. Output
//! must be drained while sending, otherwise `send` eventually waits for
//! capacity that never frees up.

use crate::aggregation::{FunctorRegistry, StatsPlan};
use crate::aggregator::{AggregatorStats, StreamAggregator};
use crate::config::{PipelineConfig, StatsConfig};
use crate::error::{PipelineError, PipelineResult, Result};
use crate::metrics::{MetricsRegistry, StatsMetrics};
use crate::pipeline::buffer::LatestBuffer;
use crate::reducer::{MergeReducer, ReducerStats};
use crate::result::PartialResult;
use crate::table::EvictionPolicy;

use serde::{Deserialize, Serialize};
use streamstats_types::{Event, ShardId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Final statistics of a pipeline, collected on shutdown
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// One entry per shard, in shard order
    pub shards: Vec<AggregatorStats>,

    pub reducer: ReducerStats,
}

impl PipelineStats {
    /// Events folded across all shards
    pub fn events_processed(&self) -> u64 {
        self.shards.iter().map(|s| s.events_processed).sum()
    }
}

/// Running sharded pipeline
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use streamstats_processor::config::PipelineConfig;
/// use streamstats_processor::{ShardedStats, StatsPlan};
/// use streamstats_types::Event;
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let plan = StatsPlan::parse(&["count()"], &["user"])?;
/// let mut pipeline = ShardedStats::spawn(plan, &PipelineConfig::default().with_shards(2))?;
///
/// for i in 0..3 {
///     let event = Event::new(json!({"user": "a"})).with_id(format!("e{i}"));
///     pipeline.send(event).await?;
/// }
///
/// let (results, stats) = pipeline.shutdown().await?;
/// assert_eq!(results.last().and_then(|r| r.value("count()")), Some(&json!(3)));
/// assert_eq!(stats.events_processed(), 3);
/// # Ok(())
/// # }
/// ```
pub struct ShardedStats {
    inputs: Vec<mpsc::Sender<Event>>,
    next: usize,
    output: mpsc::Receiver<PartialResult>,
    shard_tasks: Vec<JoinHandle<AggregatorStats>>,
    reducer_task: JoinHandle<ReducerStats>,
}

impl ShardedStats {
    /// Start the pipeline with unbounded group tables and no metrics
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(plan: StatsPlan, config: &PipelineConfig) -> Result<Self> {
        Self::spawn_with(plan, config, EvictionPolicy::unbounded(), None)
    }

    /// Start the pipeline a [`StatsConfig`] describes
    ///
    /// With `metrics_enabled`, metrics are registered in the process-wide
    /// [`MetricsRegistry`].
    pub fn from_config(config: &StatsConfig, functions: &FunctorRegistry) -> Result<Self> {
        let plan = config.plan(functions)?;
        let metrics = config
            .metrics_enabled
            .then(|| StatsMetrics::register(MetricsRegistry::global()));
        Self::spawn_with(plan, &config.pipeline, config.eviction.policy(), metrics)
    }

    /// Start the pipeline with an eviction policy for every group table
    pub fn spawn_with(
        plan: StatsPlan,
        config: &PipelineConfig,
        eviction: EvictionPolicy,
        metrics: Option<StatsMetrics>,
    ) -> Result<Self> {
        config.validate()?;

        let (merge_tx, merge_rx) = mpsc::channel(config.channel_capacity);
        let (output_tx, output_rx) = mpsc::channel(config.channel_capacity);

        let mut inputs = Vec::with_capacity(config.shards);
        let mut shard_tasks = Vec::with_capacity(config.shards);

        for index in 0..config.shards {
            let (tx, rx) = mpsc::channel(config.channel_capacity);
            let mut aggregator = StreamAggregator::new(plan.clone())
                .with_shard(ShardId::indexed(index))
                .with_eviction(eviction);
            if let Some(metrics) = &metrics {
                aggregator = aggregator.with_metrics(metrics.clone());
            }

            inputs.push(tx);
            shard_tasks.push(tokio::spawn(run_shard(aggregator, rx, merge_tx.clone())));
        }
        // Only the shard tasks hold senders now; the reducer stops once they finish.
        drop(merge_tx);

        let mut reducer = MergeReducer::new(&plan).with_eviction(eviction);
        if let Some(metrics) = metrics {
            reducer = reducer.with_metrics(metrics);
        }
        let buffer = config.buffer_capacity.map(LatestBuffer::new);
        let reducer_task = tokio::spawn(run_reducer(reducer, buffer, merge_rx, output_tx));

        info!(
            shards = config.shards,
            channel_capacity = config.channel_capacity,
            buffered = config.buffer_capacity.is_some(),
            "Started sharded stats pipeline"
        );

        Ok(Self {
            inputs,
            next: 0,
            output: output_rx,
            shard_tasks,
            reducer_task,
        })
    }

    /// Route one event to the next shard
    pub async fn send(&mut self, event: Event) -> PipelineResult<()> {
        let index = self.next % self.inputs.len();
        self.next = self.next.wrapping_add(1);

        self.inputs[index]
            .send(event)
            .await
            .map_err(|_| PipelineError::ChannelClosed {
                stage: ShardId::indexed(index).to_string(),
            })
    }

    /// Next merged result; `None` once every stage has stopped
    pub async fn recv(&mut self) -> Option<PartialResult> {
        self.output.recv().await
    }

    pub fn shard_count(&self) -> usize {
        self.inputs.len()
    }

    /// Close the inputs and wait for every task to finish
    ///
    /// Events already sent are still folded. Returns the results not yet
    /// received together with the final statistics.
    pub async fn shutdown(self) -> PipelineResult<(Vec<PartialResult>, PipelineStats)> {
        let Self {
            inputs,
            mut output,
            shard_tasks,
            reducer_task,
            ..
        } = self;
        drop(inputs);

        let mut remaining = Vec::new();
        while let Some(result) = output.recv().await {
            remaining.push(result);
        }

        let mut stats = PipelineStats::default();
        for (index, task) in shard_tasks.into_iter().enumerate() {
            stats.shards.push(join(ShardId::indexed(index).to_string(), task).await?);
        }
        stats.reducer = join("reducer".to_string(), reducer_task).await?;

        info!(
            events = stats.events_processed(),
            merged = stats.reducer.results_merged,
            "Sharded stats pipeline stopped"
        );

        Ok((remaining, stats))
    }
}

impl std::fmt::Debug for ShardedStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedStats")
            .field("shards", &self.inputs.len())
            .field("next", &self.next)
            .finish()
    }
}

async fn run_shard(
    mut aggregator: StreamAggregator,
    mut input: mpsc::Receiver<Event>,
    merge: mpsc::Sender<PartialResult>,
) -> AggregatorStats {
    while let Some(mut event) = input.recv().await {
        let result = aggregator.process(&mut event);
        if merge.send(result).await.is_err() {
            warn!(shard = %aggregator.shard(), "Reducer stopped, dropping shard output");
            break;
        }
    }

    debug!(shard = %aggregator.shard(), "Shard input closed");
    aggregator.stats()
}

async fn run_reducer(
    mut reducer: MergeReducer,
    mut buffer: Option<LatestBuffer>,
    mut merge: mpsc::Receiver<PartialResult>,
    output: mpsc::Sender<PartialResult>,
) -> ReducerStats {
    while let Some(partial) = merge.recv().await {
        let merged = reducer.reduce(&partial);
        let ready = match buffer.as_mut() {
            Some(buffer) => buffer.push(merged).unwrap_or_default(),
            None => vec![merged],
        };

        for result in ready {
            if output.send(result).await.is_err() {
                warn!("Pipeline output dropped, stopping reducer");
                return reducer.stats();
            }
        }
    }

    if let Some(buffer) = buffer.as_mut() {
        for result in buffer.flush() {
            if output.send(result).await.is_err() {
                break;
            }
        }
    }

    debug!("Reducer input closed");
    reducer.stats()
}

async fn join<T>(stage: String, task: JoinHandle<T>) -> PipelineResult<T> {
    task.await.map_err(|e| PipelineError::TaskFailed {
        stage,
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn plan() -> StatsPlan {
        StatsPlan::parse(&["count()", "sum(amount) as total"], &["user"]).unwrap()
    }

    #[tokio::test]
    async fn test_spawn_rejects_invalid_config() {
        let config = PipelineConfig::default().with_shards(0);
        assert!(ShardedStats::spawn(plan(), &config).is_err());
    }

    #[tokio::test]
    async fn test_merges_across_shards() {
        let mut pipeline =
            ShardedStats::spawn(plan(), &PipelineConfig::default().with_shards(3)).unwrap();
        assert_eq!(pipeline.shard_count(), 3);

        for amount in 1..=6 {
            pipeline
                .send(Event::new(json!({"user": "a", "amount": amount})))
                .await
                .unwrap();
        }

        let (results, stats) = pipeline.shutdown().await.unwrap();
        assert_eq!(results.len(), 6);

        let last = results.last().unwrap();
        assert_eq!(last.value("count()"), Some(&json!(6)));
        assert_eq!(last.value("total"), Some(&json!(21.0)));

        assert_eq!(stats.shards.len(), 3);
        assert_eq!(stats.events_processed(), 6);
        assert!(stats.shards.iter().all(|s| s.events_processed == 2));
        assert_eq!(stats.reducer.results_merged, 6);
    }

    #[tokio::test]
    async fn test_recv_while_sending() {
        let config = PipelineConfig {
            shards: 2,
            channel_capacity: 1,
            buffer_capacity: None,
        };
        let mut pipeline = ShardedStats::spawn(plan(), &config).unwrap();

        let mut received = 0;
        for i in 0..4 {
            let user = if i % 2 == 0 { "a" } else { "b" };
            pipeline
                .send(Event::new(json!({"user": user, "amount": 1})))
                .await
                .unwrap();
            if pipeline.recv().await.is_some() {
                received += 1;
            }
        }

        let (rest, _) = pipeline.shutdown().await.unwrap();
        assert_eq!(received + rest.len(), 4);
    }

    #[tokio::test]
    async fn test_buffer_keeps_latest_per_group() {
        let config = PipelineConfig::default().with_shards(2).with_buffer(16);
        let mut pipeline = ShardedStats::spawn(plan(), &config).unwrap();

        for (i, user) in ["a", "b", "a", "a", "b"].into_iter().enumerate() {
            let event = Event::new(json!({"user": user, "amount": 2})).with_id(format!("e{i}"));
            pipeline.send(event).await.unwrap();
        }

        let (results, _) = pipeline.shutdown().await.unwrap();
        assert_eq!(results.len(), 2);

        let count = |user: &str| {
            results
                .iter()
                .find(|r| r.group_value("user") == Some(&json!(user)))
                .and_then(|r| r.value("count()").cloned())
        };
        assert_eq!(count("a"), Some(json!(3)));
        assert_eq!(count("b"), Some(json!(2)));
    }

    #[tokio::test]
    async fn test_shutdown_without_events() {
        let pipeline = ShardedStats::spawn(plan(), &PipelineConfig::default()).unwrap();
        let (results, stats) = pipeline.shutdown().await.unwrap();
        assert!(results.is_empty());
        assert_eq!(stats.events_processed(), 0);
        assert_eq!(stats.reducer, ReducerStats::default());
    }

    #[tokio::test]
    async fn test_from_config() {
        let config = StatsConfig {
            functions: vec!["dc(item) as items".to_string()],
            by: vec!["user".to_string()],
            metrics_enabled: false,
            pipeline: PipelineConfig::default().with_shards(2),
            ..StatsConfig::default()
        };
        let mut pipeline = ShardedStats::from_config(&config, &FunctorRegistry::with_builtins()).unwrap();
        for item in ["x", "y", "x"] {
            pipeline
                .send(Event::new(json!({"user": "a", "item": item})))
                .await
                .unwrap();
        }
        let (results, _) = pipeline.shutdown().await.unwrap();
        assert_eq!(results.last().and_then(|r| r.value("items")), Some(&json!(2)));

        let empty = StatsConfig::default();
        assert!(ShardedStats::from_config(&empty, &FunctorRegistry::with_builtins()).is_err());
    }

    #[tokio::test]
    async fn test_metrics_are_shared_between_stages() {
        let metrics = StatsMetrics::default();
        let mut pipeline = ShardedStats::spawn_with(
            plan(),
            &PipelineConfig::default().with_shards(2),
            EvictionPolicy::unbounded(),
            Some(metrics.clone()),
        )
        .unwrap();

        for _ in 0..4 {
            pipeline.send(Event::new(json!({"user": "a"}))).await.unwrap();
        }
        pipeline.shutdown().await.unwrap();

        assert_eq!(metrics.events(&ShardId::indexed(0)), 2);
        assert_eq!(metrics.events(&ShardId::indexed(1)), 2);
        assert_eq!(metrics.merged_results(), 4);
    }
}
