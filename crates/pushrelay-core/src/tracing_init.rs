//! Shared tracing/logging initialization.
//!
//! `RUST_LOG` wins when set. Otherwise the configured log level is applied
//! to the relay's own crates and everything else stays at `warn`, which
//! keeps tungstenite's frame-level chatter out of the output.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::error::{Error, Result};

/// Crates whose log level follows the configured `log_level`.
const RELAY_TARGETS: &[&str] = &["pushrelay", "pushrelay_client", "pushrelay_core"];

/// Build the default filter directive for a relay log level.
///
/// `"debug"` becomes `"warn,pushrelay=debug,pushrelay_client=debug,pushrelay_core=debug"`.
pub fn default_directive(log_level: &str) -> String {
    let mut directive = String::from("warn");
    for target in RELAY_TARGETS {
        directive.push(',');
        directive.push_str(target);
        directive.push('=');
        directive.push_str(log_level);
    }
    directive
}

/// Initialise the global tracing subscriber.
///
/// * `log_level` -- level for the relay crates when `RUST_LOG` is not set.
/// * `log_json` -- when `true`, emit structured JSON log lines instead of the
///   human-readable format.
pub fn init_tracing(log_level: &str, log_json: bool) -> Result<()> {
    let env_filter = match std::env::var("RUST_LOG") {
        Ok(spec) => EnvFilter::try_new(spec),
        Err(_) => EnvFilter::try_new(default_directive(log_level)),
    }
    .map_err(|e| Error::Config(format!("Invalid log filter: {e}")))?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = if log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    installed.map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_scopes_level_to_relay_crates() {
        assert_eq!(
            default_directive("debug"),
            "warn,pushrelay=debug,pushrelay_client=debug,pushrelay_core=debug"
        );
    }

    #[test]
    fn directive_parses_as_env_filter() {
        assert!(EnvFilter::try_new(default_directive("trace")).is_ok());
    }
}
