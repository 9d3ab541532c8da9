//! Function specs and the resolved aggregation plan
//!
//! A [`FunctionSpec`] is the declarative form of one stats function, e.g.
//! `sum(amount) as total`. A [`StatsPlan`] binds a list of specs and the
//! grouping fields to registered functors once, at construction time, so
//! unknown functions and conflicting destinations fail before the first
//! event is seen.

use super::registry::FunctorRegistry;
use super::trait_::Functor;

use crate::error::{AggregationError, AggregationResult};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use streamstats_types::FieldPath;
use tracing::warn;

/// Declarative stats function: `name(source) [as destination]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSpec {
    /// Registered function name
    pub function: String,

    /// Field the samples are read from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Field the emitted value is written to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
}

impl FunctionSpec {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            source: None,
            destination: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    /// Destination field name, defaulting to `name(source)`
    pub fn destination_name(&self) -> String {
        match &self.destination {
            Some(destination) => destination.clone(),
            None => format!(
                "{}({})",
                self.function,
                self.source.as_deref().unwrap_or_default()
            ),
        }
    }
}

impl fmt::Display for FunctionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}({})",
            self.function,
            self.source.as_deref().unwrap_or_default()
        )?;
        if let Some(destination) = &self.destination {
            write!(f, " as {destination}")?;
        }
        Ok(())
    }
}

impl FromStr for FunctionSpec {
    type Err = AggregationError;

    fn from_str(text: &str) -> AggregationResult<Self> {
        let invalid = |reason: &str| AggregationError::InvalidFunctionSpec {
            spec: text.to_string(),
            reason: reason.to_string(),
        };

        let text = text.trim();
        let (function, source, rest) = match text.find('(') {
            Some(open) => {
                let close = text[open..]
                    .find(')')
                    .map(|offset| open + offset)
                    .ok_or_else(|| invalid("missing ')'"))?;
                let source = text[open + 1..close].trim();
                (
                    text[..open].trim(),
                    (!source.is_empty()).then(|| source.to_string()),
                    text[close + 1..].trim(),
                )
            }
            None => match text.split_once(char::is_whitespace) {
                Some((function, rest)) => (function, None, rest.trim()),
                None => (text, None, ""),
            },
        };

        if function.is_empty() {
            return Err(invalid("missing function name"));
        }
        if !function
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(invalid("function name must be alphanumeric"));
        }

        let destination = if rest.is_empty() {
            None
        } else {
            let mut words = rest.splitn(2, char::is_whitespace);
            match (words.next(), words.next().map(str::trim)) {
                (Some(keyword), Some(dest)) if keyword.eq_ignore_ascii_case("as") && !dest.is_empty() => {
                    Some(dest.to_string())
                }
                _ => return Err(invalid("expected 'as <field>' after the function")),
            }
        };

        Ok(Self {
            function: function.to_string(),
            source,
            destination,
        })
    }
}

/// What to do when two specs write the same destination field
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateDestinationPolicy {
    /// Fail plan construction
    #[default]
    Reject,
    /// Keep the last declaration and drop earlier ones
    LastWins,
}

/// A function spec resolved against the registry
#[derive(Debug, Clone)]
pub struct BoundFunction {
    pub spec: FunctionSpec,
    pub source: Option<FieldPath>,
    pub destination: FieldPath,
    pub functor: Arc<dyn Functor>,
}

impl BoundFunction {
    fn bind(spec: FunctionSpec, registry: &FunctorRegistry) -> AggregationResult<Self> {
        let functor = registry.get(&spec.function)?;

        if spec.source.is_none() && functor.requires_source() {
            return Err(AggregationError::MissingSource {
                function: spec.function.clone(),
            });
        }

        let source = spec.source.as_deref().map(FieldPath::parse).transpose()?;
        // Generated names like `sum(a.b)` are a single key, never a path
        let destination = match &spec.destination {
            Some(destination) => FieldPath::parse(destination)?,
            None => FieldPath::literal(spec.destination_name()),
        };

        Ok(Self {
            spec,
            source,
            destination,
            functor,
        })
    }

    /// Destination field name as declared
    pub fn destination_name(&self) -> &str {
        self.destination.as_str()
    }
}

/// Resolved functions plus grouping fields for one aggregator
#[derive(Debug, Clone)]
pub struct StatsPlan {
    functions: Vec<BoundFunction>,
    group_by: Vec<FieldPath>,
}

impl StatsPlan {
    /// Bind specs and grouping fields against a registry
    pub fn new<S>(
        specs: Vec<FunctionSpec>,
        group_by: &[S],
        registry: &FunctorRegistry,
        duplicates: DuplicateDestinationPolicy,
    ) -> AggregationResult<Self>
    where
        S: AsRef<str>,
    {
        let mut functions: Vec<BoundFunction> = Vec::with_capacity(specs.len());
        for spec in specs {
            let bound = BoundFunction::bind(spec, registry)?;
            if let Some(pos) = functions
                .iter()
                .position(|f| f.destination_name() == bound.destination_name())
            {
                match duplicates {
                    DuplicateDestinationPolicy::Reject => {
                        return Err(AggregationError::DuplicateDestination {
                            field: bound.destination_name().to_string(),
                        });
                    }
                    DuplicateDestinationPolicy::LastWins => {
                        let dropped = functions.remove(pos);
                        warn!(
                            field = %bound.destination_name(),
                            dropped = %dropped.spec,
                            kept = %bound.spec,
                            "Duplicate destination field, keeping last declaration"
                        );
                    }
                }
            }
            functions.push(bound);
        }

        let group_by = group_by
            .iter()
            .map(|field| FieldPath::parse(field.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            functions,
            group_by,
        })
    }

    /// Parse DSL fragments against the built-in functions, rejecting
    /// duplicate destinations
    pub fn parse<S>(functions: &[S], group_by: &[S]) -> AggregationResult<Self>
    where
        S: AsRef<str>,
    {
        let specs = functions
            .iter()
            .map(|text| text.as_ref().parse::<FunctionSpec>())
            .collect::<AggregationResult<Vec<_>>>()?;
        Self::new(
            specs,
            group_by,
            &FunctorRegistry::with_builtins(),
            DuplicateDestinationPolicy::Reject,
        )
    }

    /// Plan for a merge reducer sitting after aggregators running `self`
    ///
    /// Every function reads from its own destination field, so it folds the
    /// values upstream aggregators already emitted. Grouping is unchanged.
    pub fn for_merge(&self) -> Self {
        let functions = self
            .functions
            .iter()
            .map(|bound| {
                let mut merged = bound.clone();
                if !bound.functor.is_introspective() {
                    merged.source = Some(bound.destination.clone());
                    merged.spec.source = Some(bound.destination_name().to_string());
                    merged.spec.destination = Some(bound.destination_name().to_string());
                }
                merged
            })
            .collect();

        Self {
            functions,
            group_by: self.group_by.clone(),
        }
    }

    pub fn functions(&self) -> &[BoundFunction] {
        &self.functions
    }

    pub fn group_by(&self) -> &[FieldPath] {
        &self.group_by
    }
}
