//! Collaborator trait interfaces for blockerd
//!
//! This crate defines the narrow interfaces between the scheduler and the
//! outside world (calendar backend, kiosk display, window focus). It contains
//! no platform code itself.

mod mock;
mod traits;

pub use mock::*;
pub use traits::*;
