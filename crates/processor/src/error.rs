//! Error types for the aggregation engine
//!
//! Only construction-time and pipeline-plumbing failures are errors. Problems
//! with individual events (missing fields, wrong sample types) are absorbed by
//! the functors and never surface here.

use streamstats_types::FieldPathError;
use thiserror::Error;

/// Main processor error type
#[derive(Error, Debug)]
pub enum ProcessorError {
    /// Aggregation plan errors
    #[error("aggregation error: {0}")]
    Aggregation(#[from] AggregationError),

    /// Sharded pipeline errors
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Configuration errors
    #[error("configuration error: {source}")]
    Configuration {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Generic error for unexpected conditions
    #[error("unexpected error: {0}")]
    Unexpected(String),
}

/// Errors raised while building an aggregation plan
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregationError {
    /// Function name not present in the registry
    #[error("unknown stats function: {name}")]
    UnknownFunction { name: String },

    /// Two function specs write the same destination field
    #[error("duplicate destination field '{field}'")]
    DuplicateDestination { field: String },

    /// Function requires a source field but none was given
    #[error("stats function '{function}' requires a source field")]
    MissingSource { function: String },

    /// Function spec text could not be parsed
    #[error("invalid function spec '{spec}': {reason}")]
    InvalidFunctionSpec { spec: String, reason: String },

    /// A source, destination or grouping field is not a valid path
    #[error("invalid field path: {0}")]
    InvalidFieldPath(#[from] FieldPathError),
}

/// Errors raised by the async sharded pipeline
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    /// A stage stopped receiving
    #[error("channel closed: {stage}")]
    ChannelClosed { stage: String },

    /// A stage task panicked or was cancelled
    #[error("task failed: {stage}, reason: {reason}")]
    TaskFailed { stage: String, reason: String },
}

/// Result type alias for processor operations
pub type Result<T> = std::result::Result<T, ProcessorError>;

/// Result type alias for plan construction
pub type AggregationResult<T> = std::result::Result<T, AggregationError>;

/// Result type alias for pipeline operations
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

impl From<serde_json::Error> for ProcessorError {
    fn from(err: serde_json::Error) -> Self {
        ProcessorError::Serialization(err.to_string())
    }
}

impl From<figment::Error> for ProcessorError {
    fn from(err: figment::Error) -> Self {
        ProcessorError::Configuration {
            source: Box::new(err),
        }
    }
}

impl From<anyhow::Error> for ProcessorError {
    fn from(err: anyhow::Error) -> Self {
        ProcessorError::Unexpected(err.to_string())
    }
}
