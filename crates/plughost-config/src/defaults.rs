use std::env;

use camino::Utf8PathBuf;

use crate::logging::LogFormat;

/// Default log filter expression used by the daemon.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Health probes attempted after a plugin is launched.
pub const DEFAULT_HEALTH_ATTEMPTS: u32 = 10;

/// Pause between two health probes.
pub const DEFAULT_HEALTH_INTERVAL_MS: u64 = 2_000;

/// Upper bound on a single plugin RPC call.
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 30;

/// Upper bound on a manifest or binary download.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Default logging format for the daemon.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Computes the default storage root.
///
/// Prefers the platform data directory (`$XDG_DATA_HOME/plughost` on Linux)
/// and falls back to the temporary directory when no data directory exists.
#[must_use]
pub fn default_base_path() -> Utf8PathBuf {
    let mut base = dirs::data_dir()
        .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
        .unwrap_or_else(fallback_base_directory);
    base.push("plughost");
    base
}

fn fallback_base_directory() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}
