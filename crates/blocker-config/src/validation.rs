//! Configuration validation

use crate::policy::{
    DEFAULT_CALL_TIMEOUT_SECONDS, DEFAULT_IMMINENT_SECONDS, DEFAULT_LOOKAHEAD_SECONDS,
    DEFAULT_SETTLE_DELAY_MS, DEFAULT_STOP_TIMEOUT_SECONDS, MIN_QUERY_WINDOW_SECONDS,
};
use crate::schema::{RawCalendarConfig, RawConfig, RawDisplayConfig, RawSchedulerConfig};
use thiserror::Error;

/// Validation error
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("calendar: {0}")]
    CalendarError(String),

    #[error("scheduler.{field}: {message}")]
    SchedulerError { field: &'static str, message: String },

    #[error("scheduler.{field} = {seconds}s is narrower than the {minimum}s minimum query window")]
    WindowTooNarrow {
        field: &'static str,
        seconds: u64,
        minimum: u64,
    },

    #[error(
        "scheduler.imminent_seconds ({imminent}s) must be below lookahead_seconds ({lookahead}s) \
         so upcoming bookings are fetched before they become imminent"
    )]
    ImminentOutsideWindow { imminent: u64, lookahead: u64 },

    #[error("display: {0}")]
    DisplayError(String),

    #[error(
        "display: replacing the blocker can take {worst_case_ms}ms (stop_timeout_seconds per \
         browser plus settle_delay_ms), which does not fit in call_timeout_seconds ({call_timeout}s)"
    )]
    DisplaySlowerThanTimeout { worst_case_ms: u64, call_timeout: u64 },
}

/// Validate a raw configuration
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_calendar(&config.calendar));
    errors.extend(validate_scheduler(&config.scheduler));
    errors.extend(validate_display(&config.display));
    errors.extend(validate_display_timing(config));

    errors
}

fn validate_calendar(calendar: &RawCalendarConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if calendar.calendar_id.trim().is_empty() {
        errors.push(ValidationError::CalendarError(
            "calendar_id cannot be empty".into(),
        ));
    }

    match (&calendar.api_key, &calendar.access_token_env) {
        (None, None) => errors.push(ValidationError::CalendarError(
            "one of api_key or access_token_env is required".into(),
        )),
        (Some(_), Some(_)) => errors.push(ValidationError::CalendarError(
            "api_key and access_token_env are mutually exclusive".into(),
        )),
        (Some(key), None) if key.trim().is_empty() => errors.push(
            ValidationError::CalendarError("api_key cannot be empty".into()),
        ),
        (None, Some(var)) if var.trim().is_empty() => errors.push(
            ValidationError::CalendarError("access_token_env cannot be empty".into()),
        ),
        _ => {}
    }

    if let Some(url) = &calendar.base_url
        && !(url.starts_with("https://") || url.starts_with("http://"))
    {
        errors.push(ValidationError::CalendarError(format!(
            "base_url '{}' must be an http(s) URL",
            url
        )));
    }

    errors
}

fn validate_scheduler(scheduler: &RawSchedulerConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    // A zero gap is allowed: only bookings that touch count as back-to-back.
    // Every other duration must be positive.
    let positive = [
        ("poll_interval_seconds", scheduler.poll_interval_seconds),
        ("ending_soon_seconds", scheduler.ending_soon_seconds),
        ("imminent_seconds", scheduler.imminent_seconds),
        ("back_to_back_hold_seconds", scheduler.back_to_back_hold_seconds),
        ("boundary_margin_seconds", scheduler.boundary_margin_seconds),
        ("retry_backoff_seconds", scheduler.retry_backoff_seconds),
        ("call_timeout_seconds", scheduler.call_timeout_seconds),
    ];
    for (field, value) in positive {
        if value == Some(0) {
            errors.push(ValidationError::SchedulerError {
                field,
                message: "must be greater than zero".into(),
            });
        }
    }

    if scheduler.fetch_attempts == Some(0) {
        errors.push(ValidationError::SchedulerError {
            field: "fetch_attempts",
            message: "at least one attempt is required".into(),
        });
    }

    for (field, value) in [
        ("lookbehind_seconds", scheduler.lookbehind_seconds),
        ("lookahead_seconds", scheduler.lookahead_seconds),
    ] {
        if let Some(seconds) = value
            && seconds < MIN_QUERY_WINDOW_SECONDS
        {
            errors.push(ValidationError::WindowTooNarrow {
                field,
                seconds,
                minimum: MIN_QUERY_WINDOW_SECONDS,
            });
        }
    }

    let imminent = scheduler.imminent_seconds.unwrap_or(DEFAULT_IMMINENT_SECONDS);
    let lookahead = scheduler
        .lookahead_seconds
        .unwrap_or(DEFAULT_LOOKAHEAD_SECONDS);
    if imminent >= lookahead {
        errors.push(ValidationError::ImminentOutsideWindow {
            imminent,
            lookahead,
        });
    }

    if let Some(boot) = &scheduler.boot_message
        && parse_boot_message(boot).is_none()
    {
        errors.push(ValidationError::SchedulerError {
            field: "boot_message",
            message: format!("unknown message '{}', expected 'boot' or 'session_ended'", boot),
        });
    }

    errors
}

fn validate_display(display: &RawDisplayConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(browser) = &display.browser
        && browser.trim().is_empty()
    {
        errors.push(ValidationError::DisplayError("browser cannot be empty".into()));
    }

    if let Some(title) = &display.window_title
        && title.trim().is_empty()
    {
        errors.push(ValidationError::DisplayError(
            "window_title cannot be empty".into(),
        ));
    }

    if let Some(command) = &display.focus_command
        && command.first().is_none_or(|program| program.trim().is_empty())
    {
        errors.push(ValidationError::DisplayError(
            "focus_command needs a program name".into(),
        ));
    }

    if display.stop_timeout_seconds == Some(0) {
        errors.push(ValidationError::DisplayError(
            "stop_timeout_seconds must be greater than zero".into(),
        ));
    }

    errors
}

/// A show that replaces running browsers must finish within one call timeout
fn validate_display_timing(config: &RawConfig) -> Vec<ValidationError> {
    let display = &config.display;
    let instances: u64 = if display.dual_screen { 2 } else { 1 };
    let stop_timeout = display
        .stop_timeout_seconds
        .unwrap_or(DEFAULT_STOP_TIMEOUT_SECONDS);
    let settle = display.settle_delay_ms.unwrap_or(DEFAULT_SETTLE_DELAY_MS);
    let call_timeout = config
        .scheduler
        .call_timeout_seconds
        .unwrap_or(DEFAULT_CALL_TIMEOUT_SECONDS);

    let worst_case_ms = stop_timeout
        .saturating_mul(instances)
        .saturating_mul(1000)
        .saturating_add(settle);
    if worst_case_ms >= call_timeout.saturating_mul(1000) {
        vec![ValidationError::DisplaySlowerThanTimeout {
            worst_case_ms,
            call_timeout,
        }]
    } else {
        Vec::new()
    }
}

/// Parse the `boot_message` setting: `Some(true)` for the boot message,
/// `Some(false)` for the session-ended message.
pub fn parse_boot_message(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "boot" => Some(true),
        "session_ended" | "session-ended" | "times_up" => Some(false),
        _ => None,
    }
}
