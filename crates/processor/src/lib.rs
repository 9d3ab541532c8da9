//! Streaming group-by aggregation engine
//!
//! Events are grouped by the values of declared fields and folded into
//! per-group functor states (`count`, `sum`, `dc`, `avg`, ...). Every input
//! event produces a [`PartialResult`] holding the group's current best
//! estimate. Partial results from independent aggregators carry their states,
//! so a [`MergeReducer`] can combine them into results identical to a single
//! aggregator over the union of the inputs.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use streamstats_processor::{MergeReducer, StatsPlan, StreamAggregator};
//! use streamstats_types::{Event, ShardId};
//!
//! let plan = StatsPlan::parse(&["count()", "dc(item)"], &["user"]).unwrap();
//! let mut left = StreamAggregator::new(plan.clone()).with_shard(ShardId::indexed(0));
//! let mut right = StreamAggregator::new(plan.clone()).with_shard(ShardId::indexed(1));
//! let mut reducer = MergeReducer::new(&plan);
//!
//! reducer.reduce(&left.process(&mut Event::new(json!({"user": "a", "item": "x"}))));
//! let merged = reducer.reduce(&right.process(&mut Event::new(json!({"user": "a", "item": "y"}))));
//!
//! assert_eq!(merged.value("count()"), Some(&json!(2)));
//! assert_eq!(merged.value("dc(item)"), Some(&json!(2)));
//! ```

pub mod aggregation;
pub mod aggregator;
pub mod config;
pub mod error;
pub mod fields;
pub mod group;
pub mod metrics;
pub mod pipeline;
pub mod reducer;
pub mod result;
pub mod signature;
pub mod table;
pub mod telemetry;

// Re-export commonly used types
pub use aggregation::{
    DuplicateDestinationPolicy, FunctionSpec, Functor, FunctorRegistry, FunctorState, MergeOrder,
    Sample, StatsPlan,
};

pub use aggregator::{AggregatorStats, StreamAggregator};

pub use reducer::{MergeReducer, ReducerStats, SharedMergeReducer};

pub use result::{GroupStates, PartialResult};

pub use group::GroupKey;

pub use table::EvictionPolicy;

pub use fields::{FieldResolver, JsonFieldResolver, MetaFirstResolver};

pub use signature::{
    ContentHashSignature, ExplicitOrContentHash, FieldSignature, SignatureExtractor,
};

pub use pipeline::{LatestBuffer, PipelineStats, ShardedStats};

pub use config::{EvictionConfig, LogFormat, LoggingConfig, PipelineConfig, StatsConfig};

pub use error::{
    AggregationError, PipelineError, ProcessorError, Result as ProcessorResult,
};

pub use metrics::{MetricsRegistry, StatsMetrics};

pub use telemetry::init_tracing;
