//! Running aggregators and reducers together
//!
//! This module wires the engine's parts into a complete stage:
//! - [`ShardedStats`]: aggregator tasks per shard feeding one reducer task
//! - [`LatestBuffer`]: coalesces superseded results before a slow sink
//!
//! # Example
//!
//! ```rust,no_run
//! use streamstats_processor::config::StatsConfig;
//! use streamstats_processor::aggregation::FunctorRegistry;
//! use streamstats_processor::pipeline::ShardedStats;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = StatsConfig::load(Some("stats.yaml".into()))?;
//! let plan = config.plan(&FunctorRegistry::with_builtins())?;
//! let mut pipeline = ShardedStats::spawn_with(
//!     plan,
//!     &config.pipeline,
//!     config.eviction.policy(),
//!     None,
//! )?;
//!
//! while let Some(result) = pipeline.recv().await {
//!     println!("{}", result.record_json()?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod sharded;

pub use buffer::LatestBuffer;
pub use sharded::{PipelineStats, ShardedStats};
