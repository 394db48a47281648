//! Tracing subscriber setup for the demo binaries and tests.
//!
//! Log output goes to stderr so that stdout carries only the one-line reports.

use crate::{Error, Result};
use std::env;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt as tracing_fmt, EnvFilter, Registry};

/// Formatter used for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Multi-line, human oriented.
    Pretty,
    /// One line per event.
    #[default]
    Compact,
}

impl LogFormat {
    fn from_env_value(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some(LogFormat::Pretty),
            "compact" => Some(LogFormat::Compact),
            _ => None,
        }
    }
}

/// How the global subscriber should behave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Filter directives (e.g. `parwork=debug,info`). When absent, `RUST_LOG` is consulted and
    /// then [`default_directive`](Self::default_directive).
    pub directives: Option<String>,
    pub default_directive: String,
    pub ansi: bool,
    /// Show event targets (module paths).
    pub include_targets: bool,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::for_local()
    }
}

impl LogConfig {
    pub fn for_local() -> Self {
        Self {
            directives: None,
            default_directive: "info".to_string(),
            ansi: true,
            include_targets: false,
            format: LogFormat::Compact,
        }
    }

    /// Reads `PARWORK_LOG`, `PARWORK_LOG_FORMAT` (`pretty` or `compact`) and
    /// `PARWORK_LOG_ANSI` (`true`/`false`/`1`/`0`). Unrecognised values keep the default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::for_local();

        if let Some(directives) = lookup("PARWORK_LOG") {
            if !directives.trim().is_empty() {
                config.directives = Some(directives);
            }
        }

        if let Some(format) = lookup("PARWORK_LOG_FORMAT") {
            if let Some(parsed) = LogFormat::from_env_value(&format) {
                config.format = parsed;
            }
        }

        if let Some(ansi) = lookup("PARWORK_LOG_ANSI") {
            match ansi.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => config.ansi = true,
                "0" | "false" | "no" => config.ansi = false,
                _ => {}
            }
        }

        config
    }

    fn resolve_filter(&self) -> Result<EnvFilter> {
        match &self.directives {
            Some(directives) => EnvFilter::try_new(directives).map_err(|err| {
                Error::InvalidConfiguration(format!("invalid log directive `{directives}`: {err}"))
            }),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&self.default_directive))),
        }
    }
}

/// Installs the global subscriber.
///
/// Returns `Ok(false)` if a subscriber was already installed, so calling this from several
/// tests or binaries is harmless.
///
/// # Errors
///
/// Returns [`Error::InvalidConfiguration`] if the directives do not parse.
pub fn init(config: &LogConfig) -> Result<bool> {
    let filter = config.resolve_filter()?;

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Compact => Box::new(
            tracing_fmt::layer()
                .compact()
                .with_target(config.include_targets)
                .with_ansi(config.ansi)
                .with_writer(std::io::stderr),
        ),
        LogFormat::Pretty => Box::new(
            tracing_fmt::layer()
                .pretty()
                .with_target(config.include_targets)
                .with_ansi(config.ansi)
                .with_writer(std::io::stderr),
        ),
    };

    Ok(Registry::default()
        .with(layer)
        .with(filter)
        .try_init()
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LogConfig::from_lookup(lookup(&[]));
        assert_eq!(config, LogConfig::for_local());
        assert_eq!(config.default_directive, "info");
    }

    #[test]
    fn test_env_overrides() {
        let config = LogConfig::from_lookup(lookup(&[
            ("PARWORK_LOG", "parwork=trace"),
            ("PARWORK_LOG_FORMAT", "PRETTY"),
            ("PARWORK_LOG_ANSI", "0"),
        ]));
        assert_eq!(config.directives.as_deref(), Some("parwork=trace"));
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(!config.ansi);
    }

    #[test]
    fn test_bad_directive_rejected() {
        let config = LogConfig {
            directives: Some("parwork=notalevel".to_string()),
            ..LogConfig::for_local()
        };
        assert!(matches!(init(&config), Err(Error::InvalidConfiguration(_))));
    }
}
