//! Linux collaborators for blockerd
//!
//! Provides:
//! - Google Calendar v3 client (API key or bearer token)
//! - Kiosk browser display with process group isolation
//! - Graceful (SIGTERM) and forceful (SIGKILL) browser termination
//! - Window focus enforcement through an external command

mod calendar;
mod display;
mod focus;
mod process;

pub use calendar::*;
pub use display::*;
pub use focus::*;
pub use process::*;
