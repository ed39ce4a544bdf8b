//! Default paths for blockerd
//!
//! Paths are user-writable by default (no root required):
//! - Config: `$XDG_CONFIG_HOME/blockerd/config.toml` or `~/.config/blockerd/config.toml`
//! - Data: `$XDG_DATA_HOME/blockerd` or `~/.local/share/blockerd`

use std::path::PathBuf;

/// Environment variable for overriding the data directory
pub const BLOCKER_DATA_DIR_ENV: &str = "BLOCKER_DATA_DIR";

/// Config filename within the config directory
const CONFIG_FILENAME: &str = "config.toml";

/// Application subdirectory name
const APP_DIR: &str = "blockerd";

/// Get the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/etc"))
        .join(APP_DIR)
        .join(CONFIG_FILENAME)
}

/// Get the default data directory.
///
/// Order of precedence:
/// 1. `$BLOCKER_DATA_DIR` environment variable (if set)
/// 2. `$XDG_DATA_HOME/blockerd` / `~/.local/share/blockerd`
/// 3. `/var/lib/blockerd` (fallback)
pub fn default_data_dir() -> PathBuf {
    if let Ok(path) = std::env::var(BLOCKER_DATA_DIR_ENV) {
        return PathBuf::from(path);
    }

    data_dir_without_env()
}

/// Get the data directory without checking the BLOCKER_DATA_DIR env var.
/// Used for default values in configs where the env var is checked separately.
pub fn data_dir_without_env() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/var/lib").join(APP_DIR))
}

/// Directory holding the kiosk browser profiles inside a data directory.
pub fn profile_root(data_dir: &std::path::Path) -> PathBuf {
    data_dir.join("profiles")
}
