//! Log output for the secretforge binaries.
//!
//! The configured level applies to the secretforge crates only; everything
//! else logs at `warn`. An explicit `RUST_LOG` replaces the whole filter and
//! is never overridden by configuration.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

const CRATES: &[&str] = &[
    "secretforge",
    "secretforge_controller",
    "secretforge_engine",
    "secretforge_store_memory",
];

static FILTER: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Filter directives that set `level` for the secretforge crates.
pub fn directives(level: &str) -> String {
    let level = level.trim().to_ascii_lowercase();
    if level == "off" {
        return level;
    }
    let mut out = String::from("warn");
    for name in CRATES {
        out.push_str(&format!(",{name}={level}"));
    }
    out
}

fn rust_log_set() -> bool {
    std::env::var_os("RUST_LOG").is_some()
}

/// Installs the stderr subscriber. Repeated calls are ignored.
pub fn init_tracing(level: &str) {
    let filter = if rust_log_set() {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(level)))
    } else {
        EnvFilter::new(directives(level))
    };
    let (layer, handle) = reload::Layer::new(filter);
    if FILTER.set(handle).is_err() {
        return;
    }
    let _ = tracing_subscriber::registry()
        .with(layer)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .try_init();
}

/// Switches to the level from `config` once it is loaded. Returns `false`
/// when `RUST_LOG` is in charge or tracing was never initialized.
pub fn apply_logging(config: &LoggingConfig) -> bool {
    if rust_log_set() {
        return false;
    }
    let Some(handle) = FILTER.get() else {
        return false;
    };
    handle
        .modify(|filter| *filter = EnvFilter::new(directives(&config.level)))
        .is_ok()
}
