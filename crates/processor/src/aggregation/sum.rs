use super::state::FunctorState;
use super::trait_::{number, Functor, Sample, ToF64};

use serde_json::Value;

/// Sum functor - running float sum per group
///
/// Samples are cast to float: JSON numbers and numeric strings are accepted,
/// anything else leaves the accumulator unchanged.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use streamstats_processor::aggregation::{Functor, Sample, Sum};
/// use streamstats_types::EventId;
///
/// let sig = EventId::from("e");
/// let (state, _) = Sum.apply(&Sample::new(Some(&json!(10)), &sig), None);
/// let (_, emitted) = Sum.apply(&Sample::new(Some(&json!("not-a-number")), &sig), Some(state));
///
/// assert_eq!(emitted.as_f64(), Some(10.0));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl Functor for Sum {
    fn name(&self) -> &str {
        "sum"
    }

    fn apply(&self, sample: &Sample<'_>, state: Option<FunctorState>) -> (FunctorState, Value) {
        let mut total = match state {
            Some(FunctorState::Sum(total)) => total,
            _ => 0.0,
        };
        if let Some(x) = sample.value().and_then(|v| v.cast_f64()) {
            total += x;
        }
        (FunctorState::Sum(total), number(total))
    }

    fn merge(&self, acc: FunctorState, other: &FunctorState) -> FunctorState {
        let total = match acc {
            FunctorState::Sum(total) => total,
            _ => 0.0,
        };
        match other {
            FunctorState::Sum(other) => FunctorState::Sum(total + other),
            _ => FunctorState::Sum(total),
        }
    }

    fn emit(&self, state: &FunctorState) -> Value {
        match state {
            FunctorState::Sum(total) => number(*total),
            _ => number(0.0),
        }
    }

    fn from_emitted(&self, value: &Value) -> Option<FunctorState> {
        value.to_f64().map(FunctorState::Sum)
    }
}
