use super::state::FunctorState;
use super::trait_::{Functor, MergeOrder, Sample};

use serde_json::Value;

/// First functor - the first present sample of each group, never replaced
#[derive(Debug, Clone, Copy, Default)]
pub struct First;

/// Last functor - the latest present sample of each group
#[derive(Debug, Clone, Copy, Default)]
pub struct Last;

impl Functor for First {
    fn name(&self) -> &str {
        "first"
    }

    fn apply(&self, sample: &Sample<'_>, state: Option<FunctorState>) -> (FunctorState, Value) {
        let current = match state {
            Some(FunctorState::First(current)) => current,
            _ => None,
        };
        let next = current.or_else(|| sample.value().cloned());
        let emitted = next.clone().unwrap_or(Value::Null);
        (FunctorState::First(next), emitted)
    }

    fn merge(&self, acc: FunctorState, other: &FunctorState) -> FunctorState {
        let current = match acc {
            FunctorState::First(current) => current,
            _ => None,
        };
        let other = match other {
            FunctorState::First(other) => other.clone(),
            _ => None,
        };
        FunctorState::First(current.or(other))
    }

    fn emit(&self, state: &FunctorState) -> Value {
        match state {
            FunctorState::First(Some(value)) => value.clone(),
            _ => Value::Null,
        }
    }

    fn from_emitted(&self, value: &Value) -> Option<FunctorState> {
        (!value.is_null()).then(|| FunctorState::First(Some(value.clone())))
    }
}

impl Functor for Last {
    fn name(&self) -> &str {
        "last"
    }

    fn apply(&self, sample: &Sample<'_>, state: Option<FunctorState>) -> (FunctorState, Value) {
        let current = match state {
            Some(FunctorState::Last(current)) => current,
            _ => None,
        };
        let next = sample.value().cloned().or(current);
        let emitted = next.clone().unwrap_or(Value::Null);
        (FunctorState::Last(next), emitted)
    }

    fn merge(&self, acc: FunctorState, other: &FunctorState) -> FunctorState {
        let current = match acc {
            FunctorState::Last(current) => current,
            _ => None,
        };
        let other = match other {
            FunctorState::Last(other) => other.clone(),
            _ => None,
        };
        FunctorState::Last(other.or(current))
    }

    fn emit(&self, state: &FunctorState) -> Value {
        match state {
            FunctorState::Last(Some(value)) => value.clone(),
            _ => Value::Null,
        }
    }

    fn from_emitted(&self, value: &Value) -> Option<FunctorState> {
        (!value.is_null()).then(|| FunctorState::Last(Some(value.clone())))
    }

    fn merge_order(&self) -> MergeOrder {
        MergeOrder::LastUpdated
    }
}
