//! Tracing setup helpers.
//!
//! The engine emits `tracing` events throughout (degraded locators,
//! skipped actions, retry exhaustion). Hosts that want to see them can
//! install a subscriber here; library code never installs one on its
//! own.

use tracing_subscriber::{fmt, EnvFilter};

/// Subscriber configuration.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Default filter when `RUST_LOG` is unset, e.g. `"webtrail=debug"`
    pub default_filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_filter: "webtrail=info".to_string(),
            json: false,
        }
    }
}

/// Install a global subscriber. Safe to call more than once; later
/// calls are no-ops, which keeps parallel tests happy.
pub fn init(config: &TracingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_filter.clone()));
    if config.json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Install the default subscriber.
pub fn init_default() {
    init(&TracingConfig::default());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_default();
        init_default();
        init(&TracingConfig {
            default_filter: "webtrail=trace".to_string(),
            json: true,
        });
    }
}
