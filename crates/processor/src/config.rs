//! Configuration types for the aggregation engine
//!
//! A [`StatsConfig`] describes one stats stage: the functions, the grouping
//! fields, how conflicts and memory are handled, how the sharded pipeline is
//! laid out and how logs are written. It can be built in code or loaded from
//! YAML with environment overrides.

use crate::aggregation::{DuplicateDestinationPolicy, FunctionSpec, FunctorRegistry, StatsPlan};
use crate::error::{ProcessorError, Result};
use crate::table::EvictionPolicy;

use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Prefix of environment variables overriding file configuration
pub const ENV_PREFIX: &str = "STREAMSTATS_";

/// Main stats stage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Function specs, e.g. `sum(amount) as total`
    #[serde(default)]
    pub functions: Vec<String>,

    /// Grouping fields, in order
    #[serde(default)]
    pub by: Vec<String>,

    /// Handling of specs sharing a destination field
    #[serde(default)]
    pub duplicate_destinations: DuplicateDestinationPolicy,

    /// Group table memory bounds
    #[serde(default)]
    pub eviction: EvictionConfig,

    /// Sharded pipeline layout
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Enable metrics collection
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            functions: Vec::new(),
            by: Vec::new(),
            duplicate_destinations: DuplicateDestinationPolicy::default(),
            eviction: EvictionConfig::default(),
            pipeline: PipelineConfig::default(),
            logging: LoggingConfig::default(),
            metrics_enabled: true,
        }
    }
}

impl StatsConfig {
    /// Load configuration from an optional YAML file and the environment
    ///
    /// Environment variables use the `STREAMSTATS_` prefix and `__` as the
    /// nesting separator, e.g. `STREAMSTATS_PIPELINE__SHARDS=8`.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for function in &self.functions {
            function.parse::<FunctionSpec>()?;
        }

        self.eviction.validate()?;
        self.pipeline.validate()?;
        self.logging.validate()?;

        Ok(())
    }

    /// Resolve the configured functions against a registry
    pub fn plan(&self, registry: &FunctorRegistry) -> Result<StatsPlan> {
        if self.functions.is_empty() {
            return Err(ProcessorError::Configuration {
                source: "at least one stats function is required".into(),
            });
        }

        let specs = self
            .functions
            .iter()
            .map(|f| f.parse::<FunctionSpec>())
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(StatsPlan::new(
            specs,
            self.by.as_slice(),
            registry,
            self.duplicate_destinations,
        )?)
    }
}

/// Group table memory bounds
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvictionConfig {
    /// Maximum number of live groups per table
    #[serde(default)]
    pub max_groups: Option<usize>,

    /// Drop groups not updated for this long (milliseconds)
    #[serde(default)]
    pub idle_ttl_ms: Option<u64>,
}

impl EvictionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_groups == Some(0) {
            return Err(ProcessorError::Configuration {
                source: "eviction.max_groups must be greater than 0".into(),
            });
        }

        if self.idle_ttl_ms == Some(0) {
            return Err(ProcessorError::Configuration {
                source: "eviction.idle_ttl_ms must be greater than 0".into(),
            });
        }

        Ok(())
    }

    pub fn policy(&self) -> EvictionPolicy {
        EvictionPolicy {
            max_groups: self.max_groups,
            idle_ttl: self.idle_ttl_ms.map(Duration::from_millis),
        }
    }
}

/// Sharded pipeline layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of parallel aggregators
    #[serde(default = "default_shards")]
    pub shards: usize,

    /// Bound of every channel between stages
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Coalesce merged results per group before emitting them
    #[serde(default)]
    pub buffer_capacity: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            shards: default_shards(),
            channel_capacity: default_channel_capacity(),
            buffer_capacity: None,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.shards == 0 {
            return Err(ProcessorError::Configuration {
                source: "pipeline.shards must be greater than 0".into(),
            });
        }

        if self.channel_capacity == 0 {
            return Err(ProcessorError::Configuration {
                source: "pipeline.channel_capacity must be greater than 0".into(),
            });
        }

        if self.buffer_capacity == Some(0) {
            return Err(ProcessorError::Configuration {
                source: "pipeline.buffer_capacity must be greater than 0".into(),
            });
        }

        Ok(())
    }

    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    pub fn with_buffer(mut self, capacity: usize) -> Self {
        self.buffer_capacity = Some(capacity);
        self
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per line
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `streamstats_processor=debug`
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.level.trim().is_empty() {
            return Err(ProcessorError::Configuration {
                source: "logging.level must not be empty".into(),
            });
        }
        Ok(())
    }
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_shards() -> usize {
    4
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_log_level() -> String {
    "info".to_string()
}
