//! Tracing subscriber setup
//!
//! The subscriber goes in before configuration is read so that config loading
//! can log. Its filter starts from `RUST_LOG` (or `LOG_LEVEL`, or `info`) and is
//! swapped for the configured level once the config file has been loaded.

use tracing::warn;
use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

/// Handle for replacing the active filter
pub type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// Filter directive: an explicit `RUST_LOG` wins, otherwise `level` plus request tracing
pub fn filter_directive(rust_log: Option<&str>, level: &str) -> String {
    match rust_log.map(str::trim).filter(|d| !d.is_empty()) {
        Some(directive) => directive.to_string(),
        None => format!("{},tower_http=info", level.trim().to_lowercase()),
    }
}

/// Install the global subscriber with a bootstrap filter taken from the environment
pub fn init_tracing() -> FilterHandle {
    let rust_log = std::env::var("RUST_LOG").ok();
    let level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let (filter, handle) =
        reload::Layer::new(parse_filter(&filter_directive(rust_log.as_deref(), &level)));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    handle
}

/// Switch to the configured level unless `RUST_LOG` is set
pub fn apply_configured_level(handle: &FilterHandle, level: &str) {
    let rust_log = std::env::var("RUST_LOG").ok();
    if rust_log.as_deref().is_some_and(|d| !d.trim().is_empty()) {
        return;
    }
    reload_filter(handle, &filter_directive(None, level));
}

/// Replace the active filter; false when the subscriber is gone
pub fn reload_filter(handle: &FilterHandle, directive: &str) -> bool {
    match handle.reload(parse_filter(directive)) {
        Ok(()) => true,
        Err(e) => {
            warn!(directive, error = %e, "Failed to apply log filter");
            false
        }
    }
}

fn parse_filter(directive: &str) -> EnvFilter {
    EnvFilter::try_new(directive).unwrap_or_else(|e| {
        eprintln!("Invalid log filter '{}' ({}), using info", directive, e);
        EnvFilter::new("info")
    })
}
