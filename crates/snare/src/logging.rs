//! Subscriber setup for binaries and test suites using snare.
//!
//! The library itself only emits `tracing` events; nothing is printed unless a
//! subscriber is installed, either here or by the host application.

use crate::result::{SnareError, SnareResult};
use serde::{Deserialize, Serialize};
use std::sync::Once;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a filter directive; takes precedence over `RUST_LOG`
pub const LOG_ENV: &str = "SNARE_LOG";

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Build the filter: `SNARE_LOG`, then `RUST_LOG`, then `default_level`
pub fn filter(default_level: &str) -> SnareResult<EnvFilter> {
    if let Ok(directive) = std::env::var(LOG_ENV) {
        return EnvFilter::try_new(&directive).map_err(|e| SnareError::Config {
            message: format!("invalid {LOG_ENV} directive {directive:?}: {e}"),
        });
    }
    EnvFilter::try_from_default_env().or_else(|_| {
        EnvFilter::try_new(default_level).map_err(|e| SnareError::Config {
            message: format!("invalid log level {default_level:?}: {e}"),
        })
    })
}

/// Install a global subscriber. Fails if one is already installed.
pub fn try_init(default_level: &str, format: LogFormat) -> SnareResult<()> {
    let filter = filter(default_level)?;
    let installed = match format {
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .try_init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
    };
    installed.map_err(|e| SnareError::Config {
        message: format!("cannot install subscriber: {e}"),
    })
}

/// Install a global subscriber unless one is already present
pub fn init(default_level: &str, format: LogFormat) {
    let _ = try_init(default_level, format);
}

/// Route events through the test harness's captured output. Safe to call from
/// every test.
pub fn init_for_tests() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = filter("debug").unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
