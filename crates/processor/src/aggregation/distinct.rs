use super::state::FunctorState;
use super::trait_::{Functor, Sample};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// State for distinct-count aggregation
///
/// Values are kept in their compact JSON text, so `1` and `"1"` are distinct.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DistinctCountState {
    values: BTreeSet<String>,
    #[serde(default)]
    carried: u64,
}

impl DistinctCountState {
    pub fn count(&self) -> u64 {
        self.values.len() as u64 + self.carried
    }
}

/// Distinct-count functor - number of distinct sample values per group
#[derive(Debug, Clone, Copy, Default)]
pub struct DistinctCount;

impl DistinctCount {
    fn unpack(state: Option<FunctorState>) -> DistinctCountState {
        match state {
            Some(FunctorState::DistinctCount(s)) => s,
            _ => DistinctCountState::default(),
        }
    }
}

impl Functor for DistinctCount {
    fn name(&self) -> &str {
        "distinct-count"
    }

    fn apply(&self, sample: &Sample<'_>, state: Option<FunctorState>) -> (FunctorState, Value) {
        let mut state = Self::unpack(state);
        if let Some(value) = sample.value() {
            state.values.insert(value.to_string());
        }
        let emitted = Value::from(state.count());
        (FunctorState::DistinctCount(state), emitted)
    }

    fn merge(&self, acc: FunctorState, other: &FunctorState) -> FunctorState {
        let mut acc = Self::unpack(Some(acc));
        if let FunctorState::DistinctCount(other) = other {
            acc.values.extend(other.values.iter().cloned());
            // Opaque counts cannot be deduplicated, they only add up
            acc.carried += other.carried;
        }
        FunctorState::DistinctCount(acc)
    }

    fn emit(&self, state: &FunctorState) -> Value {
        match state {
            FunctorState::DistinctCount(s) => Value::from(s.count()),
            _ => Value::from(0u64),
        }
    }

    fn from_emitted(&self, value: &Value) -> Option<FunctorState> {
        value.as_u64().map(|carried| {
            FunctorState::DistinctCount(DistinctCountState {
                values: BTreeSet::new(),
                carried,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use streamstats_types::EventId;

    fn fold(values: &[Value]) -> (FunctorState, Vec<Value>) {
        let sig = EventId::from("e");
        let mut state = None;
        let mut emitted = Vec::new();
        for value in values {
            let (s, v) = DistinctCount.apply(&Sample::new(Some(value), &sig), state);
            state = Some(s);
            emitted.push(v);
        }
        (state.unwrap(), emitted)
    }

    #[test]
    fn test_distinct_count_sequence() {
        let (_, emitted) = fold(&[json!(3), json!(1), json!(4), json!(1), json!(5)]);
        assert_eq!(emitted, vec![json!(1), json!(2), json!(3), json!(3), json!(4)]);
    }

    #[test]
    fn test_distinct_count_distinguishes_types() {
        let (_, emitted) = fold(&[json!(1), json!("1")]);
        assert_eq!(emitted.last(), Some(&json!(2)));
    }

    #[test]
    fn test_distinct_count_ignores_missing() {
        let sig = EventId::from("e");
        let (state, _) = fold(&[json!("a")]);
        let (_, emitted) = DistinctCount.apply(&Sample::new(None, &sig), Some(state));
        assert_eq!(emitted, json!(1));
    }

    #[test]
    fn test_distinct_count_merge_is_union() {
        let (left, _) = fold(&[json!(1), json!(2)]);
        let (right, _) = fold(&[json!(2), json!(3)]);
        assert_eq!(DistinctCount.emit(&DistinctCount.merge(left, &right)), json!(3));
    }
}
