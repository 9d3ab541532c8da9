use super::avg::AverageState;
use super::count::CountState;
use super::distinct::DistinctCountState;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-(group, destination) state owned by the group table
///
/// One variant per built-in functor family. `Custom` carries the state of
/// functors registered by embedders. States are serializable so that partial
/// results, and the states inside them, can cross process boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "state", rename_all = "snake_case")]
pub enum FunctorState {
    Count(CountState),
    DistinctCount(DistinctCountState),
    Values(Vec<Value>),
    List(Vec<Value>),
    Min(Option<Value>),
    Max(Option<Value>),
    First(Option<Value>),
    Last(Option<Value>),
    Sum(f64),
    Average(AverageState),
    Custom(Value),
}

impl FunctorState {
    /// Variant name, for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            FunctorState::Count(_) => "count",
            FunctorState::DistinctCount(_) => "distinct_count",
            FunctorState::Values(_) => "values",
            FunctorState::List(_) => "list",
            FunctorState::Min(_) => "min",
            FunctorState::Max(_) => "max",
            FunctorState::First(_) => "first",
            FunctorState::Last(_) => "last",
            FunctorState::Sum(_) => "sum",
            FunctorState::Average(_) => "average",
            FunctorState::Custom(_) => "custom",
        }
    }
}
