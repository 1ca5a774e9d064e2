//! Subscriber setup for the scenario driver
//!
//! ```text
//! events ─► EnvFilter ─┬─► rolling file (text or JSON)
//!                      └─► stderr (text mode only)
//! ```
//!
//! stdout is reserved for receipt lines, so nothing here ever writes to it.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;

/// Target of the engine's per-quote `debug!` lines
const PRICING_TARGET: &str = "discount_transfer::discount";

fn rotation(name: &str) -> Rotation {
    match name {
        "minutely" => Rotation::MINUTELY,
        "hourly" => Rotation::HOURLY,
        "daily" => Rotation::DAILY,
        _ => Rotation::NEVER,
    }
}

/// Directive string for `EnvFilter`; pricing detail is capped at info unless enabled.
fn filter_directives(config: &AppConfig) -> String {
    if config.trace_pricing {
        config.log_level.clone()
    } else {
        format!("{},{}=info", config.log_level, PRICING_TARGET)
    }
}

/// Install the global subscriber. Keep the guard alive until exit.
///
/// `RUST_LOG` overrides the configured level.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let appender = RollingFileAppender::new(
        rotation(&config.rotation),
        &config.log_dir,
        &config.log_file,
    );
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.use_json {
        // Structured fields (trace_id, tx, account) stay queryable
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(false)
                    .with_writer(writer)
                    .with_ansi(false),
            )
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(writer).with_ansi(false))
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .init();
    }

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(level: &str, trace_pricing: bool) -> AppConfig {
        let yaml = format!(
            "log_level: {}\nlog_dir: ./logs\nlog_file: t.log\nuse_json: false\nrotation: never\ntrace_pricing: {}\n",
            level, trace_pricing
        );
        AppConfig::from_yaml(&yaml).unwrap()
    }

    #[test]
    fn test_pricing_detail_capped_unless_enabled() {
        assert_eq!(
            filter_directives(&config("debug", false)),
            "debug,discount_transfer::discount=info"
        );
        assert_eq!(filter_directives(&config("debug", true)), "debug");
    }

    #[test]
    fn test_rotation_names() {
        assert_eq!(rotation("hourly"), Rotation::HOURLY);
        assert_eq!(rotation("daily"), Rotation::DAILY);
        assert_eq!(rotation("weekly"), Rotation::NEVER);
    }
}
