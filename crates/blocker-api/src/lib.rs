//! Shared types for blockerd
//!
//! This crate defines the values that cross collaborator boundaries:
//! - Bookings fetched from the calendar
//! - Blocker message variants shown by the display

mod booking;
mod message;

pub use booking::*;
pub use message::*;
