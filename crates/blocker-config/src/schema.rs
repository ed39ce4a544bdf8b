//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Global daemon settings
    #[serde(default)]
    pub daemon: RawDaemonConfig,

    /// Calendar backend settings
    pub calendar: RawCalendarConfig,

    /// Scheduler timing knobs
    #[serde(default)]
    pub scheduler: RawSchedulerConfig,

    /// Kiosk display settings
    #[serde(default)]
    pub display: RawDisplayConfig,
}

/// Daemon-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDaemonConfig {
    /// Data directory (browser profiles live under it)
    pub data_dir: Option<PathBuf>,
}

/// Calendar backend settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawCalendarConfig {
    /// Calendar identifier (e.g. "venue@group.calendar.google.com")
    pub calendar_id: String,

    /// API key for a public calendar
    pub api_key: Option<String>,

    /// Name of an environment variable holding a bearer access token
    pub access_token_env: Option<String>,

    /// API base URL override
    pub base_url: Option<String>,
}

/// Scheduler timing knobs, all in seconds
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSchedulerConfig {
    /// Regular poll cadence
    pub poll_interval_seconds: Option<u64>,

    /// Remaining booking time below which the next poll is aligned to its end
    pub ending_soon_seconds: Option<u64>,

    /// Lead time before a booking during which the blocker is hidden
    pub imminent_seconds: Option<u64>,

    /// Largest gap between two bookings that counts as back-to-back
    pub back_to_back_gap_seconds: Option<u64>,

    /// How long the back-to-back message stays up
    pub back_to_back_hold_seconds: Option<u64>,

    /// Added to boundary-aligned sleeps so the next poll lands after the boundary
    pub boundary_margin_seconds: Option<u64>,

    /// Query window before now
    pub lookbehind_seconds: Option<u64>,

    /// Query window after now
    pub lookahead_seconds: Option<u64>,

    /// Wait between failed calendar queries
    pub retry_backoff_seconds: Option<u64>,

    /// Calendar query attempts per cycle before giving up on the cycle
    pub fetch_attempts: Option<u32>,

    /// Upper bound for any single collaborator call
    pub call_timeout_seconds: Option<u64>,

    /// Message shown at startup: "boot" (default) or "session_ended"
    pub boot_message: Option<String>,
}

/// Kiosk display settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawDisplayConfig {
    /// Browser executable
    pub browser: Option<String>,

    /// Arguments appended after the built-in kiosk flags
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// HTML page rendering the blocker messages
    pub page: Option<PathBuf>,

    /// Launch one browser per screen (two screens)
    #[serde(default)]
    pub dual_screen: bool,

    /// Directory holding per-instance browser profiles
    pub profile_root: Option<PathBuf>,

    /// Window title substring used for focus enforcement
    pub window_title: Option<String>,

    /// Focus command; "{title}" is replaced by `window_title`
    pub focus_command: Option<Vec<String>>,

    /// Delay between launching the browser and enforcing focus, in milliseconds
    pub settle_delay_ms: Option<u64>,

    /// Grace period before a browser that ignores SIGTERM is killed
    pub stop_timeout_seconds: Option<u64>,
}
