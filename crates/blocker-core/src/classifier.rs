//! Booking classification relative to an instant

use blocker_api::Booking;
use chrono::{DateTime, Local};

/// Bookings sorted around an evaluation instant
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedEvents<'a> {
    /// Booking in progress (`start <= now < end`)
    pub current: Option<&'a Booking>,

    /// Booking that concluded most recently (`end <= now`)
    pub last: Option<&'a Booking>,

    /// Booking that starts soonest (`start > now`)
    pub next: Option<&'a Booking>,

    /// Further bookings in progress besides `current`; non-empty only when
    /// the calendar is inconsistent
    pub overlapping: Vec<&'a Booking>,
}

impl<'a> ClassifiedEvents<'a> {
    pub fn is_consistent(&self) -> bool {
        self.overlapping.is_empty()
    }

    /// Owned copy that outlives the fetched booking list
    pub fn to_owned_bookings(&self) -> ClassifiedBookings {
        ClassifiedBookings {
            current: self.current.cloned(),
            last: self.last.cloned(),
            next: self.next.cloned(),
            overlapping: self.overlapping.iter().map(|b| (*b).clone()).collect(),
        }
    }
}

/// Owned form of [`ClassifiedEvents`], carried in an evaluation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedBookings {
    pub current: Option<Booking>,
    pub last: Option<Booking>,
    pub next: Option<Booking>,
    pub overlapping: Vec<Booking>,
}

/// Classify `bookings` relative to `now` in a single pass.
///
/// The first in-progress booking (in input order) wins; ties on `next.start`
/// or `last.end` also keep the first one seen.
pub fn classify(bookings: &[Booking], now: DateTime<Local>) -> ClassifiedEvents<'_> {
    let mut events = ClassifiedEvents::default();

    for booking in bookings {
        if booking.is_active_at(now) {
            if events.current.is_none() {
                events.current = Some(booking);
            } else {
                events.overlapping.push(booking);
            }
        } else if booking.start > now {
            if events.next.is_none_or(|next| booking.start < next.start) {
                events.next = Some(booking);
            }
        } else if events.last.is_none_or(|last| booking.end > last.end) {
            events.last = Some(booking);
        }
    }

    events
}
