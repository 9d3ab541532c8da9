use super::state::FunctorState;
use super::trait_::{Functor, Sample, ToF64};

use serde_json::Value;

/// Min functor - tracks the smallest numeric sample per group
///
/// The original sample is kept, so integer inputs are emitted as integers.
/// Non-numeric samples are ignored.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use streamstats_processor::aggregation::{Functor, Min, Sample};
/// use streamstats_types::EventId;
///
/// let sig = EventId::from("e");
/// let (state, _) = Min.apply(&Sample::new(Some(&json!(30)), &sig), None);
/// let (state, _) = Min.apply(&Sample::new(Some(&json!(10)), &sig), Some(state));
/// let (_, emitted) = Min.apply(&Sample::new(Some(&json!("low")), &sig), Some(state));
///
/// assert_eq!(emitted, json!(10));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Min;

/// Max functor - tracks the largest numeric sample per group
#[derive(Debug, Clone, Copy, Default)]
pub struct Max;

/// Keep whichever of `current` and `candidate` wins under `better`
fn pick(current: Option<Value>, candidate: Option<&Value>, better: fn(f64, f64) -> bool) -> Option<Value> {
    let Some(candidate) = candidate else {
        return current;
    };
    let Some(c) = candidate.to_f64() else {
        return current;
    };
    match current.as_ref().and_then(|v| v.to_f64()) {
        Some(existing) if !better(c, existing) => current,
        _ => Some(candidate.clone()),
    }
}

impl Functor for Min {
    fn name(&self) -> &str {
        "min"
    }

    fn apply(&self, sample: &Sample<'_>, state: Option<FunctorState>) -> (FunctorState, Value) {
        let current = match state {
            Some(FunctorState::Min(current)) => current,
            _ => None,
        };
        let next = pick(current, sample.value(), |a, b| a < b);
        let emitted = next.clone().unwrap_or(Value::Null);
        (FunctorState::Min(next), emitted)
    }

    fn merge(&self, acc: FunctorState, other: &FunctorState) -> FunctorState {
        let current = match acc {
            FunctorState::Min(current) => current,
            _ => None,
        };
        let other = match other {
            FunctorState::Min(other) => other.as_ref(),
            _ => None,
        };
        FunctorState::Min(pick(current, other, |a, b| a < b))
    }

    fn emit(&self, state: &FunctorState) -> Value {
        match state {
            FunctorState::Min(Some(value)) => value.clone(),
            _ => Value::Null,
        }
    }

    fn from_emitted(&self, value: &Value) -> Option<FunctorState> {
        value.to_f64().map(|_| FunctorState::Min(Some(value.clone())))
    }
}

impl Functor for Max {
    fn name(&self) -> &str {
        "max"
    }

    fn apply(&self, sample: &Sample<'_>, state: Option<FunctorState>) -> (FunctorState, Value) {
        let current = match state {
            Some(FunctorState::Max(current)) => current,
            _ => None,
        };
        let next = pick(current, sample.value(), |a, b| a > b);
        let emitted = next.clone().unwrap_or(Value::Null);
        (FunctorState::Max(next), emitted)
    }

    fn merge(&self, acc: FunctorState, other: &FunctorState) -> FunctorState {
        let current = match acc {
            FunctorState::Max(current) => current,
            _ => None,
        };
        let other = match other {
            FunctorState::Max(other) => other.as_ref(),
            _ => None,
        };
        FunctorState::Max(pick(current, other, |a, b| a > b))
    }

    fn emit(&self, state: &FunctorState) -> Value {
        match state {
            FunctorState::Max(Some(value)) => value.clone(),
            _ => Value::Null,
        }
    }

    fn from_emitted(&self, value: &Value) -> Option<FunctorState> {
        value.to_f64().map(|_| FunctorState::Max(Some(value.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use streamstats_types::EventId;

    fn emitted<F: Functor>(functor: &F, samples: &[Value]) -> Vec<Value> {
        let sig = EventId::from("e");
        let mut state = None;
        samples
            .iter()
            .map(|sample| {
                let (s, v) = functor.apply(&Sample::new(Some(sample), &sig), state.take());
                state = Some(s);
                v
            })
            .collect()
    }

    #[test]
    fn test_max_running_sequence() {
        let out = emitted(&Max, &[json!(3), json!(1), json!(4), json!(1), json!(5)]);
        assert_eq!(out, vec![json!(3), json!(3), json!(4), json!(4), json!(5)]);
    }

    #[test]
    fn test_min_running_sequence() {
        let out = emitted(&Min, &[json!(3), json!(1), json!(4), json!(0.5)]);
        assert_eq!(out, vec![json!(3), json!(1), json!(1), json!(0.5)]);
    }

    #[test]
    fn test_non_numeric_samples_are_ignored() {
        let out = emitted(&Max, &[json!("9"), json!(2), json!(true), json!(null)]);
        assert_eq!(out, vec![json!(null), json!(2), json!(2), json!(2)]);
    }

    #[test]
    fn test_merge_extremes() {
        let merged = Max.merge(FunctorState::Max(Some(json!(4))), &FunctorState::Max(Some(json!(7))));
        assert_eq!(Max.emit(&merged), json!(7));

        let merged = Min.merge(FunctorState::Min(Some(json!(4))), &FunctorState::Min(None));
        assert_eq!(Min.emit(&merged), json!(4));

        let merged = Min.merge(FunctorState::Min(None), &FunctorState::Min(Some(json!(-2))));
        assert_eq!(Min.emit(&merged), json!(-2));
    }

    #[test]
    fn test_from_emitted() {
        assert_eq!(Max.from_emitted(&json!(3)), Some(FunctorState::Max(Some(json!(3)))));
        assert_eq!(Min.from_emitted(&json!(null)), None);
    }
}
