//! Tracing setup
//!
//! What the service emits, by level:
//!
//! - `info`: startup, gateway bind, user created/logged in/verified, task enqueued
//! - `debug`: transfer engine steps (transfer row, entries, balance updates), processed tasks
//! - `warn`: rejected transfers (guard or store), task retries
//! - `error`: failed rollbacks, masked 5xx causes, exhausted task retries
//!
//! Transfer and task events carry account ids, amounts and usernames as
//! structured fields, so JSON output can be queried by them.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{self, RollingFileAppender};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::AppConfig;

/// Crates whose own logging is too chatty at the service's level.
const QUIET_TARGETS: &[&str] = &["sqlx=warn", "hyper=warn", "tower=warn"];

fn file_appender(config: &AppConfig) -> RollingFileAppender {
    match config.rotation.as_str() {
        "hourly" => rolling::hourly(&config.log_dir, &config.log_file),
        "daily" => rolling::daily(&config.log_dir, &config.log_file),
        _ => rolling::never(&config.log_dir, &config.log_file),
    }
}

/// Default filter when `RUST_LOG` is unset.
fn filter_directives(config: &AppConfig) -> String {
    std::iter::once(config.log_level.as_str())
        .chain(QUIET_TARGETS.iter().copied())
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber: rolling file (text or JSON), plus stdout in text mode.
///
/// Keep the returned guard alive for the life of the process or buffered
/// lines are lost.
pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender(config));

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directives(config)));
    let registry = tracing_subscriber::registry().with(filter);

    if config.use_json {
        let file_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(false)
            .with_writer(non_blocking)
            .with_ansi(false);
        registry.with(file_layer).init();
    } else {
        let file_layer = fmt::layer()
            .with_target(false)
            .with_writer(non_blocking)
            .with_ansi(false);
        let stdout_layer = fmt::layer().with_target(false).with_ansi(true);
        registry.with(file_layer).with(stdout_layer).init();
    }

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_directives() {
        let mut config = AppConfig::from_yaml(
            r#"
log_level: debug
log_dir: ./logs
log_file: meta_bank.log
use_json: false
rotation: never
gateway: { host: 127.0.0.1, port: 8080 }
token: { symmetric_key: "0123456789abcdefghijklmnopqrstuv", access_token_duration_secs: 900 }
"#,
        )
        .unwrap();
        assert_eq!(
            filter_directives(&config),
            "debug,sqlx=warn,hyper=warn,tower=warn"
        );

        config.log_level = "meta_bank::ledger=debug,info".to_string();
        let directives = filter_directives(&config);
        assert!(directives.starts_with("meta_bank::ledger=debug,info,"));
        assert!(EnvFilter::try_new(directives).is_ok());
    }
}
