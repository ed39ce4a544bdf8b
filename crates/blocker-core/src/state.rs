//! Scheduler state

use blocker_api::MessageVariant;
use chrono::{DateTime, Local};

/// What the scheduler last put on screen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DisplayState {
    #[default]
    Hidden,
    ShowingBoot,
    ShowingSessionEnded,
    ShowingBackToBack,
}

impl DisplayState {
    pub fn is_visible(&self) -> bool {
        !matches!(self, Self::Hidden)
    }

    /// Message variant on screen, if any
    pub fn variant(&self) -> Option<MessageVariant> {
        match self {
            Self::Hidden => None,
            Self::ShowingBoot => Some(MessageVariant::Boot),
            Self::ShowingSessionEnded => Some(MessageVariant::SessionEnded),
            Self::ShowingBackToBack => Some(MessageVariant::BackToBack),
        }
    }

    pub fn showing(variant: MessageVariant) -> Self {
        match variant {
            MessageVariant::Boot => Self::ShowingBoot,
            MessageVariant::SessionEnded => Self::ShowingSessionEnded,
            MessageVariant::BackToBack => Self::ShowingBackToBack,
        }
    }
}

/// State carried from one decision to the next.
///
/// Only the decision engine produces new values; the scheduler stores
/// whatever the last successful decision returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerState {
    /// True until the first decision cycle completes
    pub boot_pending: bool,

    /// True once a booking was seen in progress, until it ends
    pub event_announced: bool,

    /// End of the announced booking; tells a booking that took over at the
    /// boundary apart from the one already announced
    pub announced_end: Option<DateTime<Local>>,

    pub display_state: DisplayState,
}

impl SchedulerState {
    pub fn new() -> Self {
        Self {
            boot_pending: true,
            event_announced: false,
            announced_end: None,
            display_state: DisplayState::Hidden,
        }
    }
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state() {
        let state = SchedulerState::new();
        assert!(state.boot_pending);
        assert!(!state.event_announced);
        assert_eq!(state.announced_end, None);
        assert_eq!(state.display_state, DisplayState::Hidden);
        assert!(!state.display_state.is_visible());
    }

    #[test]
    fn variant_mapping() {
        for variant in MessageVariant::ALL {
            let state = DisplayState::showing(variant);
            assert!(state.is_visible());
            assert_eq!(state.variant(), Some(variant));
        }
        assert_eq!(DisplayState::Hidden.variant(), None);
    }
}
