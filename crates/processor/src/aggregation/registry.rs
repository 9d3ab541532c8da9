//! Function name to functor lookup

use super::aggregates::Aggregates;
use super::avg::Average;
use super::count::Count;
use super::distinct::DistinctCount;
use super::firstlast::{First, Last};
use super::minmax::{Max, Min};
use super::sum::Sum;
use super::trait_::Functor;
use super::values::{List, Values};

use crate::error::{AggregationError, AggregationResult};

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Registration-time table of functors by name
///
/// Names are matched case-insensitively. Custom functors are added with
/// [`FunctorRegistry::register`]; registering an existing name replaces it.
#[derive(Debug, Clone, Default)]
pub struct FunctorRegistry {
    functors: HashMap<String, Arc<dyn Functor>>,
}

impl FunctorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in function and its aliases
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Count);
        registry.register(Values);
        registry.register(List);
        registry.register(Min);
        registry.register(Max);
        registry.register(First);
        registry.register(Last);
        registry.register(Sum);
        registry.register(Aggregates);

        let distinct: Arc<dyn Functor> = Arc::new(DistinctCount);
        registry.register_arc(distinct.clone());
        registry.alias("dc", distinct.clone());
        registry.alias("distinct_count", distinct);

        let average: Arc<dyn Functor> = Arc::new(Average);
        registry.register_arc(average.clone());
        registry.alias("avg", average.clone());
        registry.alias("mean", average);

        registry
    }

    /// Register a functor under its own name
    pub fn register<F: Functor + 'static>(&mut self, functor: F) -> &mut Self {
        self.register_arc(Arc::new(functor))
    }

    /// Register a shared functor under its own name
    pub fn register_arc(&mut self, functor: Arc<dyn Functor>) -> &mut Self {
        let name = functor.name().to_ascii_lowercase();
        self.alias(&name, functor)
    }

    /// Register a functor under an additional name
    pub fn alias(&mut self, name: &str, functor: Arc<dyn Functor>) -> &mut Self {
        let name = name.to_ascii_lowercase();
        if self.functors.insert(name.clone(), functor).is_some() {
            debug!(function = %name, "Replaced registered function");
        }
        self
    }

    /// Look up a functor by name
    pub fn get(&self, name: &str) -> AggregationResult<Arc<dyn Functor>> {
        self.functors
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| AggregationError::UnknownFunction {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functors.contains_key(&name.to_ascii_lowercase())
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_and_aliases() {
        let registry = FunctorRegistry::with_builtins();
        for name in [
            "count",
            "distinct-count",
            "dc",
            "distinct_count",
            "values",
            "list",
            "min",
            "max",
            "first",
            "last",
            "sum",
            "average",
            "avg",
            "mean",
            "aggregates",
        ] {
            assert!(registry.contains(name), "missing {name}");
        }
        assert_eq!(registry.get("DC").unwrap().name(), "distinct-count");
        assert_eq!(registry.get("mean").unwrap().name(), "average");
    }

    #[test]
    fn test_unknown_function() {
        let registry = FunctorRegistry::with_builtins();
        let err = registry.get("median").unwrap_err();
        assert_eq!(
            err,
            AggregationError::UnknownFunction {
                name: "median".to_string()
            }
        );
    }

    #[test]
    fn test_register_custom() {
        let mut registry = FunctorRegistry::new();
        assert!(registry.get("sum").is_err());
        registry.register(Sum);
        assert_eq!(registry.names(), vec!["sum"]);
    }
}
