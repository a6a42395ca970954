//! Log output for the CLI.
//!
//! Logs go to stderr so `--json` output on stdout stays machine-readable.
//! The filter starts at [`BOOTSTRAP_LEVEL`] and is swapped for the
//! configured level once the config file has been read. `RUST_LOG`, when
//! set, overrides both.

use std::sync::OnceLock;

use larder_auth::audit::AUDIT_TARGET;
use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

/// Level used while the configuration is still being loaded.
pub const BOOTSTRAP_LEVEL: &str = "warn";

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

/// Filter for a configured level; security audit events are always kept.
pub fn level_filter(level: &str) -> Result<EnvFilter, String> {
    EnvFilter::try_new(format!("{level},{AUDIT_TARGET}=info"))
        .map_err(|e| format!("invalid logging.level '{level}': {e}"))
}

fn rust_log() -> Option<EnvFilter> {
    std::env::var_os("RUST_LOG")?;
    EnvFilter::try_from_default_env().ok()
}

pub fn init_tracing() {
    let filter = rust_log().unwrap_or_else(|| EnvFilter::new(BOOTSTRAP_LEVEL));
    let (filter, handle) = reload::Layer::new(filter);
    let _ = FILTER_HANDLE.set(handle);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init();
}

/// Switches to the configured level. No-op when `RUST_LOG` is set.
pub fn apply_logging_level(level: &str) -> Result<(), String> {
    if rust_log().is_some() {
        return Ok(());
    }
    let filter = level_filter(level)?;
    if let Some(handle) = FILTER_HANDLE.get() {
        handle
            .reload(filter)
            .map_err(|e| format!("failed to apply log level: {e}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter_keeps_audit_target() {
        let filter = level_filter("error").unwrap().to_string();
        assert!(filter.contains("larder::audit=info"));
    }
}
