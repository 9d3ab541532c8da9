use super::state::FunctorState;
use super::trait_::{Functor, Sample};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use streamstats_types::EventId;

/// State for count aggregation
///
/// Occurrences are keyed by event signature, so a re-delivered event bumps
/// its own occurrence counter but not the count. `carried` holds counts
/// rebuilt from upstream records that shipped no state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CountState {
    seen: BTreeMap<EventId, u64>,
    #[serde(default)]
    carried: u64,
}

impl CountState {
    /// Number of distinct events counted
    pub fn count(&self) -> u64 {
        self.seen.len() as u64 + self.carried
    }

    /// How many times the event with this signature was delivered
    pub fn occurrences(&self, signature: &EventId) -> u64 {
        self.seen.get(signature).copied().unwrap_or(0)
    }
}

/// Count functor - counts distinct events per group
///
/// Events are told apart by their identity signature. With the default
/// signature extractor, events without an explicit id that carry identical
/// data share one signature and count once.
///
/// # Examples
///
/// ```
/// use streamstats_processor::aggregation::{Count, Functor, Sample};
/// use streamstats_types::EventId;
///
/// let count = Count;
/// let first = EventId::from("evt-1");
/// let second = EventId::from("evt-2");
///
/// let (state, _) = count.apply(&Sample::unsourced(&first), None);
/// let (state, _) = count.apply(&Sample::unsourced(&first), Some(state));
/// let (_, emitted) = count.apply(&Sample::unsourced(&second), Some(state));
///
/// assert_eq!(emitted, 2);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Count;

impl Count {
    fn unpack(state: Option<FunctorState>) -> CountState {
        match state {
            Some(FunctorState::Count(s)) => s,
            _ => CountState::default(),
        }
    }
}

impl Functor for Count {
    fn name(&self) -> &str {
        "count"
    }

    fn requires_source(&self) -> bool {
        false
    }

    fn apply(&self, sample: &Sample<'_>, state: Option<FunctorState>) -> (FunctorState, Value) {
        let mut state = Self::unpack(state);
        // count(field) only counts events where the field resolves
        if !sample.is_sourced() || sample.value().is_some() {
            *state.seen.entry(sample.signature().clone()).or_insert(0) += 1;
        }
        let emitted = Value::from(state.count());
        (FunctorState::Count(state), emitted)
    }

    fn merge(&self, acc: FunctorState, other: &FunctorState) -> FunctorState {
        let mut acc = Self::unpack(Some(acc));
        if let FunctorState::Count(other) = other {
            for (signature, occurrences) in &other.seen {
                *acc.seen.entry(signature.clone()).or_insert(0) += occurrences;
            }
            acc.carried += other.carried;
        }
        FunctorState::Count(acc)
    }

    fn emit(&self, state: &FunctorState) -> Value {
        match state {
            FunctorState::Count(s) => Value::from(s.count()),
            _ => Value::from(0u64),
        }
    }

    fn from_emitted(&self, value: &Value) -> Option<FunctorState> {
        value.as_u64().map(|carried| {
            FunctorState::Count(CountState {
                seen: BTreeMap::new(),
                carried,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fold(ids: &[&str]) -> (FunctorState, Value) {
        let mut state = None;
        let mut emitted = Value::Null;
        for id in ids {
            let sig = EventId::from(*id);
            let (s, v) = Count.apply(&Sample::unsourced(&sig), state);
            state = Some(s);
            emitted = v;
        }
        (state.unwrap(), emitted)
    }

    #[test]
    fn test_count_basic() {
        let (_, emitted) = fold(&["a", "b", "c"]);
        assert_eq!(emitted, json!(3));
    }

    #[test]
    fn test_count_replay_is_idempotent() {
        let (state, emitted) = fold(&["a", "a", "a", "b"]);
        assert_eq!(emitted, json!(2));
        let FunctorState::Count(s) = state else {
            panic!("wrong variant");
        };
        assert_eq!(s.occurrences(&EventId::from("a")), 3);
        assert_eq!(s.occurrences(&EventId::from("z")), 0);
    }

    #[test]
    fn test_count_with_source_skips_missing_field() {
        let sig = EventId::from("a");
        let (state, emitted) = Count.apply(&Sample::new(None, &sig), None);
        assert_eq!(emitted, json!(0));

        let value = json!(7);
        let (_, emitted) = Count.apply(&Sample::new(Some(&value), &sig), Some(state));
        assert_eq!(emitted, json!(1));
    }

    #[test]
    fn test_count_merge_deduplicates_across_shards() {
        let (left, _) = fold(&["a", "b"]);
        let (right, _) = fold(&["b", "c"]);
        let merged = Count.merge(left, &right);
        assert_eq!(Count.emit(&merged), json!(3));
    }

    #[test]
    fn test_count_from_emitted_is_carried() {
        let rebuilt = Count.from_emitted(&json!(4)).unwrap();
        let (local, _) = fold(&["x"]);
        assert_eq!(Count.emit(&Count.merge(rebuilt, &local)), json!(5));
        assert!(Count.from_emitted(&json!("four")).is_none());
    }

    #[test]
    fn test_count_tolerates_foreign_state() {
        let sig = EventId::from("a");
        let (_, emitted) = Count.apply(&Sample::unsourced(&sig), Some(FunctorState::Sum(3.0)));
        assert_eq!(emitted, json!(1));
        assert_eq!(Count.emit_empty(), json!(0));
    }

    #[test]
    fn test_count_state_serialization() {
        let (state, _) = fold(&["a", "a"]);
        let json = serde_json::to_string(&state).unwrap();
        let back: FunctorState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
