//! Structured logging setup: `tracing` + `tracing-subscriber`, JSON or
//! human-readable output selectable via [`crate::config::LogFormat`].

use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogFormat;

pub fn init(log_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => {
            subscriber.json().init();
        }
        LogFormat::Human => {
            subscriber.init();
        }
    }
}
