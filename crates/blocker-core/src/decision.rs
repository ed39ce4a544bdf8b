//! Display decision engine

use blocker_config::SchedulerPolicy;
use blocker_util::duration_until;
use chrono::{DateTime, Local};
use std::time::Duration;

use crate::{ClassifiedEvents, DisplayState, SchedulerState};

/// What the scheduler should do with the display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayAction {
    NoOp,
    Hide,
    ShowBoot,
    ShowSessionEnded,
    /// Show the back-to-back message for `hold`
    ShowBackToBack { hold: Duration },
}

/// Which rule of the decision table fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionReason {
    BookingInProgress,
    Boot,
    BackToBack,
    BookingImminent,
    Idle,
}

/// Output of one decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub action: DisplayAction,
    /// How long to wait before the next decision
    pub delay: Duration,
    /// State to carry into the next decision
    pub state: SchedulerState,
    pub reason: DecisionReason,
}

/// Pure decision engine: classified bookings, the evaluation instant and the
/// previous state in, a display action, the next delay and new state out.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    policy: SchedulerPolicy,
}

impl DecisionEngine {
    pub fn new(policy: SchedulerPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SchedulerPolicy {
        &self.policy
    }

    pub fn decide(
        &self,
        events: &ClassifiedEvents<'_>,
        now: DateTime<Local>,
        state: SchedulerState,
    ) -> Decision {
        let p = &self.policy;

        if let Some(current) = events.current {
            // A booking that took over at the end of the announced one still
            // gets the back-to-back message for what is left of the hold
            let since_start = duration_until(current.start, now);
            let handover = state.event_announced
                && state.announced_end.is_some_and(|end| {
                    end <= current.start
                        && duration_until(end, current.start) <= p.back_to_back_gap
                })
                && since_start < p.back_to_back_hold;
            if handover {
                let hold = p.back_to_back_hold - since_start;
                return Decision {
                    action: DisplayAction::ShowBackToBack { hold },
                    delay: hold,
                    state: SchedulerState {
                        boot_pending: false,
                        event_announced: false,
                        announced_end: None,
                        display_state: DisplayState::ShowingBackToBack,
                    },
                    reason: DecisionReason::BackToBack,
                };
            }

            let remaining = duration_until(now, current.end);
            let to_boundary = remaining + p.boundary_margin;
            let delay = if remaining <= p.ending_soon {
                to_boundary
            } else {
                p.poll_interval.min(to_boundary)
            };

            return Decision {
                action: DisplayAction::Hide,
                delay,
                state: SchedulerState {
                    boot_pending: false,
                    event_announced: true,
                    announced_end: Some(current.end),
                    display_state: DisplayState::Hidden,
                },
                reason: DecisionReason::BookingInProgress,
            };
        }

        if state.boot_pending {
            return Decision {
                action: DisplayAction::ShowBoot,
                delay: p.poll_interval,
                state: SchedulerState {
                    boot_pending: false,
                    event_announced: false,
                    announced_end: None,
                    display_state: DisplayState::showing(p.boot_variant),
                },
                reason: DecisionReason::Boot,
            };
        }

        if state.event_announced
            && let (Some(last), Some(next)) = (events.last, events.next)
            && duration_until(last.end, next.start) <= p.back_to_back_gap
        {
            return Decision {
                action: DisplayAction::ShowBackToBack {
                    hold: p.back_to_back_hold,
                },
                delay: p.back_to_back_hold,
                state: SchedulerState {
                    boot_pending: false,
                    event_announced: false,
                    announced_end: None,
                    display_state: DisplayState::ShowingBackToBack,
                },
                reason: DecisionReason::BackToBack,
            };
        }

        let lead = events.next.map(|next| duration_until(now, next.start));

        if let Some(lead) = lead
            && lead <= p.imminent
        {
            return Decision {
                action: DisplayAction::Hide,
                delay: lead + p.boundary_margin,
                state: SchedulerState {
                    boot_pending: false,
                    event_announced: false,
                    announced_end: None,
                    display_state: DisplayState::Hidden,
                },
                reason: DecisionReason::BookingImminent,
            };
        }

        // Wake up in time to hide the blocker when the next booking becomes imminent
        let delay = match lead {
            Some(lead) => p
                .poll_interval
                .min(lead.saturating_sub(p.imminent) + p.boundary_margin),
            None => p.poll_interval,
        };

        Decision {
            action: DisplayAction::ShowSessionEnded,
            delay,
            state: SchedulerState {
                boot_pending: false,
                event_announced: false,
                announced_end: None,
                display_state: DisplayState::ShowingSessionEnded,
            },
            reason: DecisionReason::Idle,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify;
    use blocker_api::{Booking, MessageVariant};
    use chrono::TimeZone;

    fn t0() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 14, 18, 0, 0).unwrap()
    }

    fn secs(s: i64) -> chrono::Duration {
        chrono::Duration::seconds(s)
    }

    /// Booking relative to `t0`, in seconds
    fn booking(id: &str, start: i64, end: i64) -> Booking {
        Booking::new(id, None, t0() + secs(start), t0() + secs(end)).unwrap()
    }

    fn engine() -> DecisionEngine {
        DecisionEngine::new(SchedulerPolicy::default())
    }

    fn running() -> SchedulerState {
        SchedulerState {
            boot_pending: false,
            event_announced: false,
            announced_end: None,
            display_state: DisplayState::ShowingSessionEnded,
        }
    }

    #[test]
    fn boot_then_session_ended() {
        let engine = engine();
        let bookings = vec![booking("later", 360, 1260)];
        let now = t0();

        let first = engine.decide(&classify(&bookings, now), now, SchedulerState::new());
        assert_eq!(first.action, DisplayAction::ShowBoot);
        assert_eq!(first.delay, Duration::from_secs(20));
        assert!(!first.state.boot_pending);
        assert_eq!(first.state.display_state, DisplayState::ShowingBoot);

        let now = now + secs(20);
        let second = engine.decide(&classify(&bookings, now), now, first.state);
        assert_eq!(second.action, DisplayAction::ShowSessionEnded);
    }

    #[test]
    fn boot_variant_follows_policy() {
        let engine = DecisionEngine::new(SchedulerPolicy {
            boot_variant: MessageVariant::SessionEnded,
            ..SchedulerPolicy::default()
        });

        let decision = engine.decide(&classify(&[], t0()), t0(), SchedulerState::new());
        assert_eq!(decision.action, DisplayAction::ShowBoot);
        assert_eq!(decision.state.display_state, DisplayState::ShowingSessionEnded);
    }

    #[test]
    fn current_booking_hides_even_at_boot() {
        let bookings = vec![booking("now", -60, 600)];

        let decision = engine().decide(&classify(&bookings, t0()), t0(), SchedulerState::new());
        assert_eq!(decision.action, DisplayAction::Hide);
        assert_eq!(decision.reason, DecisionReason::BookingInProgress);
        assert_eq!(decision.delay, Duration::from_secs(20));
        assert!(decision.state.event_announced);
        assert!(!decision.state.boot_pending);
    }

    #[test]
    fn ending_soon_aligns_with_booking_end() {
        let bookings = vec![booking("now", -600, 25)];

        let decision = engine().decide(&classify(&bookings, t0()), t0(), running());
        assert_eq!(decision.action, DisplayAction::Hide);
        assert_eq!(decision.delay, Duration::from_secs(26));
    }

    #[test]
    fn delay_never_overshoots_booking_end() {
        let engine = DecisionEngine::new(SchedulerPolicy {
            poll_interval: Duration::from_secs(120),
            ..SchedulerPolicy::default()
        });
        let bookings = vec![booking("now", -600, 45)];

        let decision = engine.decide(&classify(&bookings, t0()), t0(), running());
        assert_eq!(decision.delay, Duration::from_secs(46));
    }

    #[test]
    fn back_to_back_then_falls_through() {
        let engine = engine();
        // Previous booking ended a second ago, next starts 10s after it ended
        let bookings = vec![booking("first", -900, -1), booking("second", 9, 909)];
        let announced = SchedulerState {
            event_announced: true,
            display_state: DisplayState::Hidden,
            ..running()
        };

        let decision = engine.decide(&classify(&bookings, t0()), t0(), announced);
        assert_eq!(
            decision.action,
            DisplayAction::ShowBackToBack {
                hold: Duration::from_secs(10)
            }
        );
        assert_eq!(decision.delay, Duration::from_secs(10));
        assert!(!decision.state.event_announced);

        // Re-evaluated before the hold runs out: next booking is imminent
        let again = engine.decide(&classify(&bookings, t0()), t0(), decision.state);
        assert_eq!(again.action, DisplayAction::Hide);
        assert_eq!(again.reason, DecisionReason::BookingImminent);

        // After the hold the second booking is in progress
        let later = t0() + secs(10);
        let after = engine.decide(&classify(&bookings, later), later, decision.state);
        assert_eq!(after.action, DisplayAction::Hide);
        assert_eq!(after.reason, DecisionReason::BookingInProgress);
    }

    #[test]
    fn wide_gap_is_not_back_to_back() {
        let bookings = vec![booking("first", -900, -1), booking("second", 59, 959)];
        let announced = SchedulerState {
            event_announced: true,
            ..running()
        };

        let decision = engine().decide(&classify(&bookings, t0()), t0(), announced);
        assert_eq!(decision.action, DisplayAction::Hide);
        assert_eq!(decision.reason, DecisionReason::BookingImminent);
    }

    #[test]
    fn touching_bookings_show_back_to_back_at_the_boundary() {
        let engine = engine();
        let bookings = vec![booking("first", -600, 0), booking("second", 0, 900)];

        let before = t0() - secs(30);
        let during = engine.decide(&classify(&bookings, before), before, running());
        assert_eq!(during.reason, DecisionReason::BookingInProgress);
        assert_eq!(during.state.announced_end, Some(t0()));
        assert_eq!(during.delay, Duration::from_secs(31));

        // First poll after the boundary finds the second booking already running
        let after = t0() + secs(1);
        let handover = engine.decide(&classify(&bookings, after), after, during.state);
        assert_eq!(
            handover.action,
            DisplayAction::ShowBackToBack {
                hold: Duration::from_secs(9)
            }
        );
        assert_eq!(handover.delay, Duration::from_secs(9));
        assert_eq!(handover.state.display_state, DisplayState::ShowingBackToBack);
        assert!(!handover.state.event_announced);

        let resumed = t0() + secs(10);
        let hidden = engine.decide(&classify(&bookings, resumed), resumed, handover.state);
        assert_eq!(hidden.action, DisplayAction::Hide);
        assert_eq!(hidden.reason, DecisionReason::BookingInProgress);
        assert_eq!(hidden.state.announced_end, Some(t0() + secs(900)));
    }

    #[test]
    fn late_boundary_poll_skips_the_back_to_back_message() {
        let bookings = vec![booking("first", -600, 0), booking("second", 0, 900)];
        let announced = SchedulerState {
            event_announced: true,
            announced_end: Some(t0()),
            display_state: DisplayState::Hidden,
            ..running()
        };

        // Hold already over by the time the cycle runs
        let late = t0() + secs(12);
        let decision = engine().decide(&classify(&bookings, late), late, announced);
        assert_eq!(decision.action, DisplayAction::Hide);
        assert_eq!(decision.reason, DecisionReason::BookingInProgress);

        // Same booking still in progress is not a handover
        let mid = t0() - secs(100);
        let decision = engine().decide(&classify(&bookings, mid), mid, announced);
        assert_eq!(decision.reason, DecisionReason::BookingInProgress);
    }

    #[test]
    fn zero_gap_only_hands_over_touching_bookings() {
        let engine = DecisionEngine::new(SchedulerPolicy {
            back_to_back_gap: Duration::ZERO,
            ..SchedulerPolicy::default()
        });
        let announced = SchedulerState {
            event_announced: true,
            announced_end: Some(t0()),
            display_state: DisplayState::Hidden,
            ..running()
        };
        let now = t0() + secs(2);

        let touching = vec![booking("first", -600, 0), booking("second", 0, 900)];
        let decision = engine.decide(&classify(&touching, now), now, announced);
        assert_eq!(decision.reason, DecisionReason::BackToBack);

        let gapped = vec![booking("first", -600, 0), booking("second", 1, 900)];
        let decision = engine.decide(&classify(&gapped, now), now, announced);
        assert_eq!(decision.reason, DecisionReason::BookingInProgress);
    }

    #[test]
    fn imminent_booking_hides_until_it_starts() {
        let bookings = vec![booking("soon", 180, 1080)];

        let decision = engine().decide(&classify(&bookings, t0()), t0(), running());
        assert_eq!(decision.action, DisplayAction::Hide);
        assert_eq!(decision.delay, Duration::from_secs(181));
        assert!(t0() + secs(181) >= bookings[0].start);
        assert_eq!(decision.state.display_state, DisplayState::Hidden);
    }

    #[test]
    fn idle_wakes_up_when_next_becomes_imminent() {
        // Next booking becomes imminent in 10s
        let bookings = vec![booking("later", 310, 1210)];

        let decision = engine().decide(&classify(&bookings, t0()), t0(), running());
        assert_eq!(decision.action, DisplayAction::ShowSessionEnded);
        assert_eq!(decision.delay, Duration::from_secs(11));
    }

    #[test]
    fn empty_calendar_shows_session_ended() {
        let decision = engine().decide(&classify(&[], t0()), t0(), running());
        assert_eq!(decision.action, DisplayAction::ShowSessionEnded);
        assert_eq!(decision.delay, Duration::from_secs(20));
        assert_eq!(decision.reason, DecisionReason::Idle);
    }

    #[test]
    fn booking_end_resets_announcement() {
        let bookings = vec![booking("done", -600, 0)];
        let announced = SchedulerState {
            event_announced: true,
            display_state: DisplayState::Hidden,
            ..running()
        };

        let decision = engine().decide(&classify(&bookings, t0()), t0(), announced);
        assert_eq!(decision.action, DisplayAction::ShowSessionEnded);
        assert!(!decision.state.event_announced);
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let engine = engine();
        let bookings = vec![booking("a", -900, -1), booking("b", 9, 909), booking("c", 2000, 2600)];
        let states = [
            SchedulerState::new(),
            running(),
            SchedulerState {
                event_announced: true,
                ..running()
            },
        ];

        for offset in [-30, 0, 5, 15, 400] {
            let now = t0() + secs(offset);
            let events = classify(&bookings, now);
            for state in states {
                assert_eq!(
                    engine.decide(&events, now, state),
                    engine.decide(&events, now, state)
                );
            }
        }
    }
}
