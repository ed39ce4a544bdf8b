//! Mock collaborators for testing

use async_trait::async_trait;
use blocker_api::{Booking, MessageVariant};
use chrono::{DateTime, Local};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use crate::{
    CalendarError, CalendarResult, CalendarSource, DisplayController, DisplayError,
    DisplayResult, FocusEnforcer, FocusError, FocusResult,
};

/// Mock calendar serving an in-memory list of bookings
pub struct MockCalendar {
    calendar_id: String,
    bookings: Arc<Mutex<Vec<Booking>>>,
    fetch_count: AtomicU32,

    /// Number of upcoming fetches that fail with a transport error
    pub failures_remaining: Arc<Mutex<u32>>,

    /// Make fetches never complete (simulates a stalled connection)
    pub stall: Arc<Mutex<bool>>,

    /// Panic on the next fetch (simulates an internal bug)
    pub panic_next: Arc<Mutex<bool>>,
}

impl MockCalendar {
    pub fn new() -> Self {
        Self {
            calendar_id: "mock-calendar".into(),
            bookings: Arc::new(Mutex::new(Vec::new())),
            fetch_count: AtomicU32::new(0),
            failures_remaining: Arc::new(Mutex::new(0)),
            stall: Arc::new(Mutex::new(false)),
            panic_next: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_bookings(self, bookings: Vec<Booking>) -> Self {
        self.set_bookings(bookings);
        self
    }

    /// Replace the calendar contents
    pub fn set_bookings(&self, bookings: Vec<Booking>) {
        *self.bookings.lock().unwrap() = bookings;
    }

    /// Make the next `count` fetches fail
    pub fn fail_next(&self, count: u32) {
        *self.failures_remaining.lock().unwrap() = count;
    }

    /// Number of fetch calls received so far (including failed ones)
    pub fn fetch_count(&self) -> u32 {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

impl Default for MockCalendar {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CalendarSource for MockCalendar {
    fn calendar_id(&self) -> &str {
        &self.calendar_id
    }

    async fn fetch(
        &self,
        time_min: DateTime<Local>,
        time_max: DateTime<Local>,
    ) -> CalendarResult<Vec<Booking>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);

        let should_panic = std::mem::take(&mut *self.panic_next.lock().unwrap());
        if should_panic {
            panic!("Mock calendar panic");
        }

        let stalled = *self.stall.lock().unwrap();
        if stalled {
            std::future::pending::<()>().await;
        }

        {
            let mut failures = self.failures_remaining.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(CalendarError::Transport("Mock transport failure".into()));
            }
        }

        let mut bookings: Vec<Booking> = self
            .bookings
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.end > time_min && b.start < time_max)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.start);

        Ok(bookings)
    }
}

/// A command received by [`MockDisplay`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayCommand {
    Show(MessageVariant),
    Hide,
}

/// Mock display recording every command it receives
pub struct MockDisplay {
    showing: Mutex<Option<MessageVariant>>,
    commands: Mutex<Vec<DisplayCommand>>,
    transitions: Mutex<Vec<DisplayCommand>>,

    /// Configure show/hide to fail
    pub fail: Arc<Mutex<bool>>,
}

impl MockDisplay {
    pub fn new() -> Self {
        Self {
            showing: Mutex::new(None),
            commands: Mutex::new(Vec::new()),
            transitions: Mutex::new(Vec::new()),
            fail: Arc::new(Mutex::new(false)),
        }
    }

    /// Every command issued, including idempotent repeats
    pub fn commands(&self) -> Vec<DisplayCommand> {
        self.commands.lock().unwrap().clone()
    }

    /// Only the commands that changed what is on screen
    pub fn transitions(&self) -> Vec<DisplayCommand> {
        self.transitions.lock().unwrap().clone()
    }

    fn record(&self, command: DisplayCommand) -> DisplayResult<()> {
        self.commands.lock().unwrap().push(command);

        if *self.fail.lock().unwrap() {
            return Err(DisplayError::SpawnFailed("Mock display failure".into()));
        }

        let target = match command {
            DisplayCommand::Show(variant) => Some(variant),
            DisplayCommand::Hide => None,
        };

        let mut showing = self.showing.lock().unwrap();
        if *showing != target {
            *showing = target;
            self.transitions.lock().unwrap().push(command);
        }

        Ok(())
    }
}

impl Default for MockDisplay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DisplayController for MockDisplay {
    async fn show(&self, variant: MessageVariant) -> DisplayResult<()> {
        self.record(DisplayCommand::Show(variant))
    }

    async fn hide(&self) -> DisplayResult<()> {
        self.record(DisplayCommand::Hide)
    }

    fn showing(&self) -> Option<MessageVariant> {
        *self.showing.lock().unwrap()
    }
}

/// Mock focus enforcer counting requests
#[derive(Default)]
pub struct MockFocus {
    requests: Mutex<Vec<String>>,

    /// Configure focus requests to fail
    pub fail: Arc<Mutex<bool>>,
}

impl MockFocus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl FocusEnforcer for MockFocus {
    async fn bring_to_front(&self, identifier: &str) -> FocusResult<()> {
        self.requests.lock().unwrap().push(identifier.to_string());

        if *self.fail.lock().unwrap() {
            return Err(FocusError::WindowNotFound(identifier.to_string()));
        }

        Ok(())
    }
}
