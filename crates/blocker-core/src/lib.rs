//! Booking classification and display scheduling for blockerd
//!
//! This crate is the heart of blockerd, containing:
//! - Event classification (current / last / next booking relative to now)
//! - The display decision engine (show, hide, which message, how long to wait)
//! - Scheduler state (Hidden -> ShowingBoot -> Hidden -> ShowingBackToBack -> ...)
//! - The scheduler loop driving the calendar, display and focus collaborators

mod classifier;
mod clock;
mod decision;
mod scheduler;
mod state;

pub use classifier::*;
pub use clock::*;
pub use decision::*;
pub use scheduler::*;
pub use state::*;
