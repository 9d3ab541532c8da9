//! Tracing subscriber setup

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{ProcessorError, Result};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Build the filter for a logging configuration
///
/// `RUST_LOG` wins over the configured level when it is set.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(&config.level).map_err(|e| ProcessorError::Configuration {
        source: Box::new(e),
    })
}

/// Install the global tracing subscriber
///
/// Fails when a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    config.validate()?;
    let filter = env_filter(config)?;

    let installed = match config.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .flatten_event(true),
            )
            .try_init(),
    };

    installed.map_err(|e| ProcessorError::Configuration {
        source: Box::new(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_from_level() {
        let config = LoggingConfig {
            level: "streamstats_processor=debug,warn".to_string(),
            format: LogFormat::Json,
        };
        assert!(env_filter(&config).is_ok());
    }

    #[test]
    fn test_init_twice_fails() {
        let config = LoggingConfig::default();
        assert!(init_tracing(&config).is_ok());
        assert!(matches!(
            init_tracing(&config),
            Err(ProcessorError::Configuration { .. })
        ));
    }
}
