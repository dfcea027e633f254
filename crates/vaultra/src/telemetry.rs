use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

use crate::config::TelemetryConfig;

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("log filter '{directive}' is not a valid EnvFilter directive")]
    Filter {
        directive: String,
        #[source]
        source: ParseError,
    },
    #[error("could not install the global subscriber: {0}")]
    Install(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| filter_for(&config.log_level))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.log_targets)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Install)
}

fn filter_for(directive: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(directive).map_err(|source| TelemetryError::Filter {
        directive: directive.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_directive_filters() {
        assert!(filter_for("info,vaultra::jobs=debug").is_ok());
    }

    #[test]
    fn rejects_malformed_filters() {
        match filter_for("vaultra=verbose") {
            Err(TelemetryError::Filter { directive, .. }) => {
                assert_eq!(directive, "vaultra=verbose")
            }
            other => panic!("expected filter error, got {other:?}"),
        }
    }
}
