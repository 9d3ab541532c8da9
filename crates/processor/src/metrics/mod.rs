//! Prometheus metrics for the aggregation engine
//!
//! Metrics are optional: an aggregator or pipeline only records them when a
//! [`StatsMetrics`] handle is attached. All metrics follow Prometheus naming
//! conventions and are labelled by shard.

mod labels;
mod registry;
mod stats;

pub use labels::{LabelNames, LabelSet, MetricLabels, OutcomeLabel};
pub use registry::{MetricsRegistry, METRICS_REGISTRY};
pub use stats::StatsMetrics;

use thiserror::Error;

/// Errors that can occur in the metrics subsystem
#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Metric encoding error: {0}")]
    EncodingError(String),
}

pub type Result<T> = std::result::Result<T, MetricsError>;
