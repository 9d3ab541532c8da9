use super::state::FunctorState;
use super::trait_::{Functor, Sample};

use serde_json::Value;

/// Aggregates functor - diagnostic snapshot of the owning group table
///
/// This functor keeps no per-group state. The aggregator hands it the table
/// snapshot as its sample, after every other function of the event has run,
/// and the snapshot is emitted as-is.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aggregates;

impl Functor for Aggregates {
    fn name(&self) -> &str {
        "aggregates"
    }

    fn requires_source(&self) -> bool {
        false
    }

    fn apply(&self, sample: &Sample<'_>, _state: Option<FunctorState>) -> (FunctorState, Value) {
        let snapshot = sample.value().cloned().unwrap_or(Value::Null);
        (FunctorState::Custom(Value::Null), snapshot)
    }

    fn merge(&self, acc: FunctorState, _other: &FunctorState) -> FunctorState {
        acc
    }

    fn emit(&self, _state: &FunctorState) -> Value {
        Value::Null
    }

    fn from_emitted(&self, _value: &Value) -> Option<FunctorState> {
        None
    }

    fn is_introspective(&self) -> bool {
        true
    }
}
