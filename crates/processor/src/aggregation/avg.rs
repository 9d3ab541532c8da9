use super::state::FunctorState;
use super::trait_::{number, Functor, Sample, ToF64};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// State for average aggregation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct AverageState {
    mean: f64,
    count: u64,
}

impl AverageState {
    /// Current mean, `None` before the first numeric sample
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Average functor - running mean per group
///
/// Uses the incremental mean update `mean += (x - mean) / (n + 1)`, so no
/// running sum is kept. Non-numeric samples leave the state unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Average;

impl Average {
    fn unpack(state: Option<FunctorState>) -> AverageState {
        match state {
            Some(FunctorState::Average(s)) => s,
            _ => AverageState::default(),
        }
    }
}

impl Functor for Average {
    fn name(&self) -> &str {
        "average"
    }

    fn apply(&self, sample: &Sample<'_>, state: Option<FunctorState>) -> (FunctorState, Value) {
        let mut state = Self::unpack(state);
        if let Some(x) = sample.value().and_then(|v| v.to_f64()) {
            state.count += 1;
            state.mean += (x - state.mean) / state.count as f64;
        }
        let emitted = self.emit(&FunctorState::Average(state));
        (FunctorState::Average(state), emitted)
    }

    fn merge(&self, acc: FunctorState, other: &FunctorState) -> FunctorState {
        let acc = Self::unpack(Some(acc));
        let FunctorState::Average(other) = other else {
            return FunctorState::Average(acc);
        };
        let count = acc.count + other.count;
        if count == 0 {
            return FunctorState::Average(AverageState::default());
        }
        // Count-weighted combination of the two means
        let mean = (acc.mean * acc.count as f64 + other.mean * other.count as f64) / count as f64;
        FunctorState::Average(AverageState { mean, count })
    }

    fn emit(&self, state: &FunctorState) -> Value {
        match state {
            FunctorState::Average(s) => s.mean().map(number).unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }

    /// A bare mean has lost its weight; it is rebuilt as a single sample.
    fn from_emitted(&self, value: &Value) -> Option<FunctorState> {
        value
            .to_f64()
            .map(|mean| FunctorState::Average(AverageState { mean, count: 1 }))
    }
}
