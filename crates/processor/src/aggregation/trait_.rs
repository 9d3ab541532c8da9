use super::state::FunctorState;
use serde_json::{Number, Value};
use std::fmt::Debug;
use streamstats_types::EventId;

/// One input to a functor: the resolved source value and the event identity
#[derive(Debug, Clone, Copy)]
pub struct Sample<'a> {
    value: Option<&'a Value>,
    sourced: bool,
    signature: &'a EventId,
}

impl<'a> Sample<'a> {
    /// Sample read from a declared source field (`None` when it did not resolve)
    pub fn new(value: Option<&'a Value>, signature: &'a EventId) -> Self {
        Self {
            value,
            sourced: true,
            signature,
        }
    }

    /// Sample for a function declared without a source field, e.g. `count()`
    pub fn unsourced(signature: &'a EventId) -> Self {
        Self {
            value: None,
            sourced: false,
            signature,
        }
    }

    /// The sample value; JSON `null` counts as absent
    pub fn value(&self) -> Option<&'a Value> {
        self.value.filter(|v| !v.is_null())
    }

    /// Whether the function declared a source field
    pub fn is_sourced(&self) -> bool {
        self.sourced
    }

    /// Identity signature of the event the sample was read from
    pub fn signature(&self) -> &'a EventId {
        self.signature
    }

    /// The sample, or each of its elements when it is an array
    pub fn elements(&self) -> Vec<&'a Value> {
        match self.value() {
            Some(Value::Array(items)) => items.iter().filter(|v| !v.is_null()).collect(),
            Some(value) => vec![value],
            None => Vec::new(),
        }
    }
}

/// Order in which per-shard states are folded by the merge reducer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOrder {
    /// Shards in the order the reducer first heard from them
    FirstSeen,
    /// Shards in the order of their latest update, most recent last
    LastUpdated,
}

/// Core trait for all stats functions (functors)
///
/// A functor is a pure incremental state transition. It owns no state of its
/// own: the group table hands it the previous state of one
/// (group, destination) slot together with the new sample, and stores
/// whatever it returns.
///
/// Implementations must:
/// - accept `None` as the previous state and start from a zero-state
/// - accept a state of another functor's variant the same way
/// - ignore samples of the wrong type instead of failing
///
/// The merge half of the trait lets partial states computed by independent
/// shards be combined into one, the same way the accumulators of distributed
/// aggregators are merged.
pub trait Functor: Send + Sync + Debug {
    /// Registered function name
    fn name(&self) -> &str;

    /// Whether `name()` without a source field is a construction error
    fn requires_source(&self) -> bool {
        true
    }

    /// Fold one sample into the state and return the new state with the
    /// value to emit for it
    fn apply(&self, sample: &Sample<'_>, state: Option<FunctorState>) -> (FunctorState, Value);

    /// Combine two states of this functor
    fn merge(&self, acc: FunctorState, other: &FunctorState) -> FunctorState;

    /// Render a state as the emitted value
    fn emit(&self, state: &FunctorState) -> Value;

    /// Rebuild a state from a value this functor emitted earlier
    ///
    /// Used when an upstream record carries emitted values but no states.
    /// Returns `None` when nothing sensible can be rebuilt.
    fn from_emitted(&self, value: &Value) -> Option<FunctorState>;

    /// Fold order for shard states
    fn merge_order(&self) -> MergeOrder {
        MergeOrder::FirstSeen
    }

    /// Introspective functors bypass per-group state and emit a snapshot of
    /// the whole group table instead
    fn is_introspective(&self) -> bool {
        false
    }

    /// Value emitted for a group that has no usable sample yet
    fn emit_empty(&self) -> Value {
        let signature = EventId::from_string(String::new());
        let (state, _) = self.apply(&Sample::new(None, &signature), None);
        self.emit(&state)
    }
}

/// Helper trait for reading JSON samples as numbers
pub trait ToF64 {
    /// JSON numbers only
    fn to_f64(&self) -> Option<f64>;

    /// JSON numbers and numeric strings
    fn cast_f64(&self) -> Option<f64>;
}

impl ToF64 for Value {
    fn to_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64().filter(|x| x.is_finite()),
            _ => None,
        }
    }

    fn cast_f64(&self) -> Option<f64> {
        match self {
            Value::String(s) => s.trim().parse::<f64>().ok().filter(|x| x.is_finite()),
            other => other.to_f64(),
        }
    }
}

/// JSON number for `x`, or `null` when `x` is not finite
pub(crate) fn number(x: f64) -> Value {
    Number::from_f64(x).map(Value::Number).unwrap_or(Value::Null)
}
