use tracing_subscriber::{fmt, EnvFilter};

/// Configuration for setting up the subscriber
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub log_level: String,
    pub json: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
        }
    }
}

impl LoggerConfig {
    pub fn from_app_config(config: &crate::config::AppConfig) -> Self {
        Self {
            log_level: config.log_level.clone(),
            json: config.log_json,
        }
    }
}

/// Installs the global tracing subscriber. `RUST_LOG` overrides the
/// configured level. Safe to call once per process; later calls are ignored.
pub fn init_tracing(config: &LoggerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    if config.json {
        let _ = fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}
