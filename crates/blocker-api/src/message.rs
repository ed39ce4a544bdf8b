//! Blocker message variants

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which message the blocker screen displays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageVariant {
    /// Shown once when the service starts without an active booking
    Boot,
    /// A booking has ended and nothing follows closely
    SessionEnded,
    /// A booking has ended and the next one starts right after
    BackToBack,
}

impl MessageVariant {
    pub const ALL: [MessageVariant; 3] = [Self::Boot, Self::SessionEnded, Self::BackToBack];

    /// Value of the `msg` query parameter understood by the message page
    pub fn query_value(&self) -> &'static str {
        match self {
            Self::Boot => "boot",
            Self::SessionEnded => "timesUp",
            Self::BackToBack => "backtoback",
        }
    }
}

impl fmt::Display for MessageVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Boot => "boot",
            Self::SessionEnded => "session-ended",
            Self::BackToBack => "back-to-back",
        };
        write!(f, "{}", name)
    }
}
