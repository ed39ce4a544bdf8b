//! Validated policy structures

use crate::schema::{
    RawCalendarConfig, RawConfig, RawDaemonConfig, RawDisplayConfig, RawSchedulerConfig,
};
use crate::validation::parse_boot_message;
use blocker_api::MessageVariant;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default poll cadence
pub const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 20;
/// Default remaining time below which polls align with the booking end
pub const DEFAULT_ENDING_SOON_SECONDS: u64 = 30;
/// Default lead time during which an upcoming booking hides the blocker
pub const DEFAULT_IMMINENT_SECONDS: u64 = 300;
/// Default largest gap treated as back-to-back
pub const DEFAULT_BACK_TO_BACK_GAP_SECONDS: u64 = 30;
/// Default back-to-back message duration
pub const DEFAULT_BACK_TO_BACK_HOLD_SECONDS: u64 = 10;
/// Default margin added to boundary-aligned sleeps
pub const DEFAULT_BOUNDARY_MARGIN_SECONDS: u64 = 1;
/// Default query window before now
pub const DEFAULT_LOOKBEHIND_SECONDS: u64 = 300;
/// Default query window after now
pub const DEFAULT_LOOKAHEAD_SECONDS: u64 = 600;
/// Default wait between failed calendar queries
pub const DEFAULT_RETRY_BACKOFF_SECONDS: u64 = 30;
/// Default calendar attempts per cycle
pub const DEFAULT_FETCH_ATTEMPTS: u32 = 3;
/// Default upper bound for a single collaborator call
pub const DEFAULT_CALL_TIMEOUT_SECONDS: u64 = 15;
/// Default wait for a browser to exit after SIGTERM
pub const DEFAULT_STOP_TIMEOUT_SECONDS: u64 = 5;
/// Default pause after launching the browser
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1000;
/// Narrowest accepted query window on either side of now
pub const MIN_QUERY_WINDOW_SECONDS: u64 = 60;

/// Google Calendar API v3 endpoint
pub const DEFAULT_CALENDAR_BASE_URL: &str = "https://www.googleapis.com/calendar/v3";

/// Validated policy ready for use by the scheduler
#[derive(Debug, Clone)]
pub struct Policy {
    pub daemon: DaemonConfig,
    pub calendar: CalendarPolicy,
    pub scheduler: SchedulerPolicy,
    pub display: DisplayPolicy,
}

impl Policy {
    /// Convert from raw config (after validation)
    pub fn from_raw(raw: RawConfig) -> Self {
        let daemon = DaemonConfig::from_raw(raw.daemon);
        let display = DisplayPolicy::from_raw(raw.display, &daemon.data_dir);

        Self {
            calendar: CalendarPolicy::from_raw(raw.calendar),
            scheduler: SchedulerPolicy::from_raw(raw.scheduler),
            display,
            daemon,
        }
    }

    /// Override the data directory, moving the default profile root with it
    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        if self.display.profile_root == blocker_util::profile_root(&self.daemon.data_dir) {
            self.display.profile_root = blocker_util::profile_root(&data_dir);
        }
        self.daemon.data_dir = data_dir;
        self
    }
}

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub data_dir: PathBuf,
}

impl DaemonConfig {
    fn from_raw(raw: RawDaemonConfig) -> Self {
        Self {
            data_dir: raw.data_dir.unwrap_or_else(blocker_util::default_data_dir),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            data_dir: blocker_util::default_data_dir(),
        }
    }
}

/// How the calendar backend is authenticated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarCredentials {
    /// API key passed as the `key` query parameter (public calendars)
    ApiKey(String),
    /// Bearer token read from the named environment variable on every query
    AccessTokenEnv(String),
}

/// Calendar backend policy
#[derive(Debug, Clone)]
pub struct CalendarPolicy {
    pub calendar_id: String,
    pub credentials: CalendarCredentials,
    pub base_url: String,
}

impl CalendarPolicy {
    fn from_raw(raw: RawCalendarConfig) -> Self {
        let credentials = match (raw.api_key, raw.access_token_env) {
            (Some(key), _) => CalendarCredentials::ApiKey(key),
            (None, Some(var)) => CalendarCredentials::AccessTokenEnv(var),
            // Rejected by validation
            (None, None) => CalendarCredentials::ApiKey(String::new()),
        };

        Self {
            calendar_id: raw.calendar_id.trim().to_string(),
            credentials,
            base_url: raw
                .base_url
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_CALENDAR_BASE_URL.to_string()),
        }
    }
}

/// Scheduler timing policy.
///
/// The back-to-back gap/hold pair and the ending-soon/imminent thresholds
/// varied between deployments; the defaults here are a 30s gap, a 10s hold,
/// a 30s ending-soon threshold and a 5 minute imminent threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerPolicy {
    pub poll_interval: Duration,
    pub ending_soon: Duration,
    pub imminent: Duration,
    pub back_to_back_gap: Duration,
    pub back_to_back_hold: Duration,
    pub boundary_margin: Duration,
    pub lookbehind: Duration,
    pub lookahead: Duration,
    pub retry_backoff: Duration,
    pub fetch_attempts: u32,
    pub call_timeout: Duration,
    /// Message shown by the first decision after startup
    pub boot_variant: MessageVariant,
}

impl SchedulerPolicy {
    fn from_raw(raw: RawSchedulerConfig) -> Self {
        let secs = |value: Option<u64>, default: u64| Duration::from_secs(value.unwrap_or(default));

        let boot_variant = match raw.boot_message.as_deref().and_then(parse_boot_message) {
            Some(false) => MessageVariant::SessionEnded,
            _ => MessageVariant::Boot,
        };

        Self {
            poll_interval: secs(raw.poll_interval_seconds, DEFAULT_POLL_INTERVAL_SECONDS),
            ending_soon: secs(raw.ending_soon_seconds, DEFAULT_ENDING_SOON_SECONDS),
            imminent: secs(raw.imminent_seconds, DEFAULT_IMMINENT_SECONDS),
            back_to_back_gap: secs(raw.back_to_back_gap_seconds, DEFAULT_BACK_TO_BACK_GAP_SECONDS),
            back_to_back_hold: secs(
                raw.back_to_back_hold_seconds,
                DEFAULT_BACK_TO_BACK_HOLD_SECONDS,
            ),
            boundary_margin: secs(raw.boundary_margin_seconds, DEFAULT_BOUNDARY_MARGIN_SECONDS),
            lookbehind: secs(raw.lookbehind_seconds, DEFAULT_LOOKBEHIND_SECONDS),
            lookahead: secs(raw.lookahead_seconds, DEFAULT_LOOKAHEAD_SECONDS),
            retry_backoff: secs(raw.retry_backoff_seconds, DEFAULT_RETRY_BACKOFF_SECONDS),
            fetch_attempts: raw.fetch_attempts.unwrap_or(DEFAULT_FETCH_ATTEMPTS),
            call_timeout: secs(raw.call_timeout_seconds, DEFAULT_CALL_TIMEOUT_SECONDS),
            boot_variant,
        }
    }
}

impl Default for SchedulerPolicy {
    fn default() -> Self {
        Self::from_raw(RawSchedulerConfig::default())
    }
}

/// Built-in kiosk flags passed to the browser before `extra_args`
pub const KIOSK_FLAGS: &[&str] = &[
    "--kiosk",
    "--incognito",
    "--disable-infobars",
    "--noerrdialogs",
    "--disable-component-update",
    "--check-for-update-interval=31536000",
    "--no-default-browser-check",
    "--no-first-run",
    "--disable-session-crashed-bubble",
    "--disable-pinch",
    "--disable-features=TranslateUI",
];

/// Window positions used in dual-screen mode, one per browser instance
pub const DUAL_SCREEN_POSITIONS: [&str; 2] = ["9999,0", "0,0"];

/// Kiosk display policy
#[derive(Debug, Clone)]
pub struct DisplayPolicy {
    pub browser: String,
    pub extra_args: Vec<String>,
    pub page: PathBuf,
    pub dual_screen: bool,
    pub profile_root: PathBuf,
    pub window_title: String,
    pub focus_command: Option<Vec<String>>,
    pub settle_delay: Duration,
    pub stop_timeout: Duration,
}

impl DisplayPolicy {
    fn from_raw(raw: RawDisplayConfig, data_dir: &Path) -> Self {
        Self {
            browser: raw.browser.unwrap_or_else(|| "chromium".into()),
            extra_args: raw.extra_args,
            page: raw
                .page
                .unwrap_or_else(|| PathBuf::from("/usr/share/blockerd/display.html")),
            dual_screen: raw.dual_screen,
            profile_root: raw
                .profile_root
                .unwrap_or_else(|| blocker_util::profile_root(data_dir)),
            window_title: raw.window_title.unwrap_or_else(|| "Chromium".into()),
            focus_command: raw.focus_command,
            settle_delay: Duration::from_millis(
                raw.settle_delay_ms.unwrap_or(DEFAULT_SETTLE_DELAY_MS),
            ),
            stop_timeout: Duration::from_secs(
                raw.stop_timeout_seconds
                    .unwrap_or(DEFAULT_STOP_TIMEOUT_SECONDS),
            ),
        }
    }

    /// Number of browser instances to run
    pub fn instance_count(&self) -> usize {
        if self.dual_screen { 2 } else { 1 }
    }

    /// Profile directory for each browser instance
    pub fn profile_dirs(&self) -> Vec<PathBuf> {
        (1..=self.instance_count())
            .map(|n| self.profile_root.join(format!("profile{}", n)))
            .collect()
    }
}
