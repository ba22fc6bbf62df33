//! Tracing subscriber setup for the CLI.
//!
//! Output is human-readable by default; set `VOUCHERD_LOG_FORMAT=json` for
//! structured logs. The verbosity flag wins over `RUST_LOG` when present.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

const ENV_LOG_FORMAT: &str = "VOUCHERD_LOG_FORMAT";

fn build_filter(level: Option<tracing::Level>) -> EnvFilter {
    level.map_or_else(
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error")),
        |level| EnvFilter::new(level.as_str().to_lowercase()),
    )
}

fn json_output() -> bool {
    std::env::var(ENV_LOG_FORMAT).is_ok_and(|value| value.trim().eq_ignore_ascii_case("json"))
}

/// Initialize the global tracing subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init(level: Option<tracing::Level>) -> Result<()> {
    let filter = build_filter(level);

    if json_output() {
        Registry::default()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    } else {
        Registry::default()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::build_filter;

    #[test]
    fn filter_defaults_to_error() {
        if std::env::var_os("RUST_LOG").is_some() {
            // Ambient filter takes precedence; nothing to assert here.
            return;
        }
        let filter = build_filter(None);
        assert_eq!(filter.to_string(), "error");
    }

    #[test]
    fn filter_uses_explicit_level() {
        let filter = build_filter(Some(tracing::Level::DEBUG));
        assert_eq!(filter.to_string(), "debug");
    }
}
