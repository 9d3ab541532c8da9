//! Stats functions for grouped streaming aggregation
//!
//! Every stats function is a [`Functor`]: a pure incremental transition
//! `(previous state, sample) -> (new state, emitted value)`. Functors keep no
//! state of their own; the group table owns one [`FunctorState`] per
//! (group, destination) slot. All functors support:
//!
//! - **Incremental updates**: one sample at a time, emitting the current value
//! - **Graceful degradation**: wrong-typed or missing samples are skipped
//! - **State merging**: combine states computed by independent shards
//! - **State serialization**: states travel inside partial results
//!
//! # Available Functions
//!
//! - [`Count`] (`count`): distinct events, keyed by identity signature
//! - [`DistinctCount`] (`distinct-count`, `dc`): distinct sample values
//! - [`Values`] (`values`): ordered unique sample values
//! - [`List`] (`list`): every sample value
//! - [`Min`] / [`Max`] (`min`, `max`): numeric extremes
//! - [`First`] / [`Last`] (`first`, `last`): first and latest sample
//! - [`Sum`] (`sum`): float sum
//! - [`Average`] (`average`, `avg`, `mean`): running mean
//! - [`Aggregates`] (`aggregates`): group table snapshot
//!
//! # Examples
//!
//! ## Building a plan
//!
//! ```rust
//! use streamstats_processor::aggregation::StatsPlan;
//!
//! let plan = StatsPlan::parse(&["sum(amount) as total", "count()"], &["user"]).unwrap();
//! assert_eq!(plan.functions()[1].destination_name(), "count()");
//! ```
//!
//! ## Distributed Processing
//!
//! ```rust
//! use serde_json::json;
//! use streamstats_processor::aggregation::{Functor, Sample, Sum};
//! use streamstats_types::EventId;
//!
//! let sig = EventId::from("e");
//!
//! // Each shard folds its own samples
//! let (a, _) = Sum.apply(&Sample::new(Some(&json!(2)), &sig), None);
//! let (a, _) = Sum.apply(&Sample::new(Some(&json!(3)), &sig), Some(a));
//! let (b, _) = Sum.apply(&Sample::new(Some(&json!(4)), &sig), None);
//!
//! // Merge the shard states
//! let merged = Sum.merge(a, &b);
//! assert_eq!(Sum.emit(&merged), json!(9.0));
//! ```

// Re-name to avoid collision with trait
mod trait_;

mod aggregates;
mod avg;
mod count;
mod distinct;
mod firstlast;
mod minmax;
mod plan;
mod registry;
mod state;
mod sum;
mod values;

// Re-export the trait
pub use trait_::{Functor, MergeOrder, Sample, ToF64};

// Re-export all functors
pub use aggregates::Aggregates;
pub use avg::{Average, AverageState};
pub use count::{Count, CountState};
pub use distinct::{DistinctCount, DistinctCountState};
pub use firstlast::{First, Last};
pub use minmax::{Max, Min};
pub use sum::Sum;
pub use values::{List, Values};

pub use plan::{BoundFunction, DuplicateDestinationPolicy, FunctionSpec, StatsPlan};
pub use registry::FunctorRegistry;
pub use state::FunctorState;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use streamstats_types::EventId;

    fn fold(functor: &dyn Functor, samples: &[Value]) -> FunctorState {
        let mut state = None;
        for (i, sample) in samples.iter().enumerate() {
            let sig = EventId::from(format!("e{i}"));
            let (s, _) = functor.apply(&Sample::new(Some(sample), &sig), state);
            state = Some(s);
        }
        state.unwrap()
    }

    #[test]
    fn test_multiple_functors_together() {
        let data = [json!(10), json!(20), json!(30), json!(40), json!(50)];
        let registry = FunctorRegistry::with_builtins();

        let emit = |name: &str| {
            let functor = registry.get(name).unwrap();
            functor.emit(&fold(functor.as_ref(), &data))
        };

        assert_eq!(emit("count"), json!(5));
        assert_eq!(emit("sum"), json!(150.0));
        assert_eq!(emit("avg"), json!(30.0));
        assert_eq!(emit("min"), json!(10));
        assert_eq!(emit("max"), json!(50));
        assert_eq!(emit("first"), json!(10));
        assert_eq!(emit("last"), json!(50));
        assert_eq!(emit("dc"), json!(5));
    }

    #[test]
    fn test_state_serialization_roundtrip() {
        let state = fold(&Average, &[json!(10), json!(20), json!(30)]);

        let serialized = serde_json::to_string(&state).unwrap();
        let deserialized: FunctorState = serde_json::from_str(&serialized).unwrap();

        let merged = Average.merge(FunctorState::Average(AverageState::default()), &deserialized);
        assert_eq!(Average.emit(&merged), json!(20.0));
    }

    #[test]
    fn test_distributed_processing_scenario() {
        // Simulate processing data across 3 workers
        let worker1 = fold(&Average, &[json!(1), json!(2), json!(3)]);
        let worker2 = fold(&Average, &[json!(4), json!(5), json!(6)]);
        let worker3 = fold(&Average, &[json!(7), json!(8), json!(9)]);

        let combined = [worker2, worker3]
            .iter()
            .fold(worker1, |acc, other| Average.merge(acc, other));

        assert_eq!(Average.emit(&combined), json!(5.0));
        let FunctorState::Average(state) = combined else {
            panic!("wrong variant");
        };
        assert_eq!(state.count(), 9);
    }
}
