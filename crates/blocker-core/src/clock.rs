//! Time sources for the scheduler

use chrono::{DateTime, Local};
use tokio::time::Instant;

/// Wall-clock source injected into the scheduler
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// Local system time (honors `BLOCKER_MOCK_TIME` in debug builds)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        blocker_util::now()
    }
}

/// Wall clock that advances with the tokio timer.
///
/// Starts at a fixed instant and follows `tokio::time::Instant`, so under a
/// paused runtime every sleep advances it by exactly the slept duration.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: DateTime<Local>,
    anchor: Instant,
}

impl TokioClock {
    pub fn starting_at(origin: DateTime<Local>) -> Self {
        Self {
            origin,
            anchor: Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Local> {
        let elapsed = Instant::now().saturating_duration_since(self.anchor);
        self.origin + blocker_util::to_chrono_duration(elapsed)
    }
}
