//! Calendar bookings

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Opaque calendar entry identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookingId(String);

impl BookingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BookingId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for BookingId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A time-boxed calendar booking.
///
/// Always satisfies `start < end`; all-day entries are normalized to local
/// midnight-to-midnight before a `Booking` is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub title: Option<String>,
    pub start: DateTime<Local>,
    pub end: DateTime<Local>,
}

impl Booking {
    /// Build a booking, rejecting empty or inverted intervals.
    pub fn new(
        id: impl Into<BookingId>,
        title: Option<String>,
        start: DateTime<Local>,
        end: DateTime<Local>,
    ) -> Option<Self> {
        if start >= end {
            return None;
        }

        Some(Self {
            id: id.into(),
            title,
            start,
            end,
        })
    }

    /// Whether the booking is in progress at `now` (`start <= now < end`)
    pub fn is_active_at(&self, now: DateTime<Local>) -> bool {
        self.start <= now && now < self.end
    }

    pub fn duration(&self) -> Duration {
        blocker_util::duration_until(self.start, self.end)
    }

    /// Title for logs; untitled bookings fall back to their id
    pub fn label(&self) -> &str {
        self.title.as_deref().unwrap_or(self.id.as_str())
    }
}

impl fmt::Display for Booking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} - {}]",
            self.label(),
            blocker_util::format_datetime_full(&self.start),
            blocker_util::format_datetime_full(&self.end)
        )
    }
}
