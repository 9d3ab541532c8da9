//! Partial results emitted by aggregators and reducers

use crate::aggregation::FunctorState;
use crate::error::Result;
use crate::group::GroupKey;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use streamstats_types::{Event, FieldPath, GroupFingerprint, ShardId};

/// Functor states of one group, keyed by destination field
pub type GroupStates = BTreeMap<String, FunctorState>;

/// Current best estimate for one group
///
/// One is emitted per input event. A later result with the same fingerprint
/// supersedes every earlier one; nothing is ever retracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialResult {
    /// Group the result belongs to
    pub fingerprint: GroupFingerprint,

    /// Producer of the result
    pub shard: ShardId,

    /// Per-producer emission counter, starting at 1
    pub sequence: u64,

    /// Grouping values
    pub group: GroupKey,

    /// Outgoing record: grouping values plus one value per destination
    pub record: Event,

    /// Functor states behind the record's values
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub states: GroupStates,
}

impl PartialResult {
    /// Emitted value for a destination field
    ///
    /// `destination` is first looked up as a literal top-level key (generated
    /// names like `sum(a.b)`), then as a path.
    pub fn value(&self, destination: &str) -> Option<&Value> {
        self.record.data.get(destination).or_else(|| {
            FieldPath::parse(destination)
                .ok()
                .and_then(|path| self.record.get(&path))
        })
    }

    /// Grouping value by field name
    pub fn group_value(&self, field: &str) -> Option<&Value> {
        self.group.get(field)
    }

    /// Outgoing record as one line of JSON
    pub fn record_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.record.data)?)
    }
}
