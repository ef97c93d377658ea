//! Logging setup for the binaries.

use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

pub const LOG_FORMAT_ENV: &str = "PYTCATALOG_LOG_FORMAT";

static TRACING_INIT: OnceLock<()> = OnceLock::new();

/// Install the stderr subscriber once per process.
///
/// `RUST_LOG` overrides `default_filter`. Output is compact text unless
/// `PYTCATALOG_LOG_FORMAT=json`.
pub fn init_tracing(default_filter: &str) {
    TRACING_INIT.get_or_init(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter));
        let json = std::env::var(LOG_FORMAT_ENV)
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let result = if json {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .try_init()
        };

        if let Err(err) = result {
            eprintln!("tracing init skipped: {err}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::init_tracing;

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing("warn");
        init_tracing("debug");
    }
}
