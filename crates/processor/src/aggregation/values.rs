use super::state::FunctorState;
use super::trait_::{Functor, Sample};

use serde_json::Value;

/// Values functor - ordered list of unique sample values per group
///
/// Array samples contribute each of their elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct Values;

/// List functor - ordered list of every sample value per group
///
/// Array samples contribute each of their elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct List;

fn push_unique(list: &mut Vec<Value>, value: &Value) {
    if !list.contains(value) {
        list.push(value.clone());
    }
}

impl Functor for Values {
    fn name(&self) -> &str {
        "values"
    }

    fn apply(&self, sample: &Sample<'_>, state: Option<FunctorState>) -> (FunctorState, Value) {
        let mut list = match state {
            Some(FunctorState::Values(list)) => list,
            _ => Vec::new(),
        };
        for value in sample.elements() {
            push_unique(&mut list, value);
        }
        let emitted = Value::Array(list.clone());
        (FunctorState::Values(list), emitted)
    }

    fn merge(&self, acc: FunctorState, other: &FunctorState) -> FunctorState {
        let mut list = match acc {
            FunctorState::Values(list) => list,
            _ => Vec::new(),
        };
        if let FunctorState::Values(other) = other {
            for value in other {
                push_unique(&mut list, value);
            }
        }
        FunctorState::Values(list)
    }

    fn emit(&self, state: &FunctorState) -> Value {
        match state {
            FunctorState::Values(list) => Value::Array(list.clone()),
            _ => Value::Array(Vec::new()),
        }
    }

    fn from_emitted(&self, value: &Value) -> Option<FunctorState> {
        value.as_array().map(|items| FunctorState::Values(items.clone()))
    }
}

impl Functor for List {
    fn name(&self) -> &str {
        "list"
    }

    fn apply(&self, sample: &Sample<'_>, state: Option<FunctorState>) -> (FunctorState, Value) {
        let mut list = match state {
            Some(FunctorState::List(list)) => list,
            _ => Vec::new(),
        };
        list.extend(sample.elements().into_iter().cloned());
        let emitted = Value::Array(list.clone());
        (FunctorState::List(list), emitted)
    }

    fn merge(&self, acc: FunctorState, other: &FunctorState) -> FunctorState {
        let mut list = match acc {
            FunctorState::List(list) => list,
            _ => Vec::new(),
        };
        if let FunctorState::List(other) = other {
            list.extend(other.iter().cloned());
        }
        FunctorState::List(list)
    }

    fn emit(&self, state: &FunctorState) -> Value {
        match state {
            FunctorState::List(list) => Value::Array(list.clone()),
            _ => Value::Array(Vec::new()),
        }
    }

    fn from_emitted(&self, value: &Value) -> Option<FunctorState> {
        value.as_array().map(|items| FunctorState::List(items.clone()))
    }
}
