//! Shared utilities for blockerd
//!
//! This crate provides:
//! - Time utilities (mock-aware wall clock, duration helpers)
//! - Error types
//! - Default paths for config and data directories

mod error;
mod paths;
mod time;

pub use error::*;
pub use paths::*;
pub use time::*;
