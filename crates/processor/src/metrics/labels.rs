//! Label management for Prometheus metrics

use std::fmt;
use streamstats_types::ShardId;

/// Common label names used across metrics
pub struct LabelNames;

impl LabelNames {
    pub const SHARD: &'static str = "shard";
    pub const OUTCOME: &'static str = "outcome";
}

/// What happened to a group during one update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeLabel {
    Created,
    Updated,
    Evicted,
}

impl fmt::Display for OutcomeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeLabel::Created => write!(f, "created"),
            OutcomeLabel::Updated => write!(f, "updated"),
            OutcomeLabel::Evicted => write!(f, "evicted"),
        }
    }
}

/// A set of metric labels
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct LabelSet {
    labels: Vec<(String, String)>,
}

impl LabelSet {
    /// Create a new empty label set
    pub fn new() -> Self {
        Self { labels: Vec::new() }
    }

    /// Add a label to the set
    pub fn with(mut self, name: impl Into<String>, value: impl fmt::Display) -> Self {
        self.labels.push((name.into(), value.to_string()));
        self
    }

    /// Get all labels as a slice
    pub fn as_slice(&self) -> &[(String, String)] {
        &self.labels
    }

    /// Labels in the form prometheus-client families are keyed by
    pub fn into_vec(self) -> Vec<(String, String)> {
        self.labels
    }
}

/// Trait for types that can provide metric labels
pub trait MetricLabels {
    fn labels(&self) -> LabelSet;
}

impl MetricLabels for ShardId {
    fn labels(&self) -> LabelSet {
        LabelSet::new().with(LabelNames::SHARD, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_labels() {
        let labels = ShardId::indexed(2).labels();
        assert_eq!(
            labels.as_slice(),
            &[("shard".to_string(), "shard-2".to_string())]
        );
    }

    #[test]
    fn test_label_set_builder() {
        let labels = LabelSet::new()
            .with(LabelNames::SHARD, "a")
            .with(LabelNames::OUTCOME, OutcomeLabel::Evicted);
        assert_eq!(labels.as_slice()[1].1, "evicted");
        assert_eq!(labels.into_vec().len(), 2);
    }
}
