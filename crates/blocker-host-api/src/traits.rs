//! Collaborator traits

use async_trait::async_trait;
use blocker_api::{Booking, MessageVariant};
use chrono::{DateTime, Local};
use std::time::Duration;
use thiserror::Error;

/// Errors from calendar queries
#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Calendar API returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Calendar query timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed calendar response: {0}")]
    Decode(String),
}

pub type CalendarResult<T> = Result<T, CalendarError>;

/// Errors from display operations
#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("Failed to start display: {0}")]
    SpawnFailed(String),

    #[error("Failed to stop display: {0}")]
    StopFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DisplayResult<T> = Result<T, DisplayError>;

/// Errors from focus enforcement
#[derive(Debug, Error)]
pub enum FocusError {
    #[error("Focus command failed: {0}")]
    CommandFailed(String),

    #[error("No window matching '{0}'")]
    WindowNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type FocusResult<T> = Result<T, FocusError>;

/// Calendar query collaborator
#[async_trait]
pub trait CalendarSource: Send + Sync {
    /// Identifier of the queried calendar (for logs)
    fn calendar_id(&self) -> &str;

    /// Fetch bookings overlapping `[time_min, time_max]`, sorted by start.
    ///
    /// Malformed entries are skipped by the implementation; only
    /// transport/auth failures are returned as errors.
    async fn fetch(
        &self,
        time_min: DateTime<Local>,
        time_max: DateTime<Local>,
    ) -> CalendarResult<Vec<Booking>>;
}

/// Kiosk display collaborator.
///
/// Both operations are idempotent: showing the variant that is already shown,
/// or hiding while hidden, has no observable effect.
#[async_trait]
pub trait DisplayController: Send + Sync {
    /// Show the blocker with the given message, replacing any other variant
    async fn show(&self, variant: MessageVariant) -> DisplayResult<()>;

    /// Remove the blocker
    async fn hide(&self) -> DisplayResult<()>;

    /// Variant currently on screen, if any
    fn showing(&self) -> Option<MessageVariant>;
}

/// Window focus collaborator (best effort, never fatal)
#[async_trait]
pub trait FocusEnforcer: Send + Sync {
    async fn bring_to_front(&self, identifier: &str) -> FocusResult<()>;
}

/// Focus enforcer for hosts without a focus mechanism
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFocus;

#[async_trait]
impl FocusEnforcer for NoFocus {
    async fn bring_to_front(&self, _identifier: &str) -> FocusResult<()> {
        Ok(())
    }
}
