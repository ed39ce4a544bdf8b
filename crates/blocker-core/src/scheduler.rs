//! Scheduler loop
//!
//! Owns the poll cadence and the only mutable [`SchedulerState`]. Each cycle
//! runs on its own task so a panic in a collaborator is reported as an error
//! instead of taking the daemon down.

use blocker_api::{Booking, MessageVariant};
use blocker_config::SchedulerPolicy;
use blocker_host_api::{CalendarSource, DisplayController, FocusEnforcer};
use blocker_util::{BlockerError, format_clock_time, format_duration, to_chrono_duration};
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::{
    ClassifiedBookings, Clock, Decision, DecisionEngine, DecisionReason, DisplayAction,
    SchedulerState, classify,
};

/// External collaborators driven by the scheduler
#[derive(Clone)]
pub struct Collaborators {
    pub calendar: Arc<dyn CalendarSource>,
    pub display: Arc<dyn DisplayController>,
    pub focus: Arc<dyn FocusEnforcer>,
    /// Window identifier handed to the focus enforcer
    pub focus_target: String,
}

/// Result of a side-effect free evaluation
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub now: DateTime<Local>,
    pub bookings: Vec<Booking>,
    /// Classification the decision was made from
    pub events: ClassifiedBookings,
    pub decision: Decision,
}

struct Context {
    engine: DecisionEngine,
    collaborators: Collaborators,
    clock: Arc<dyn Clock>,
}

impl Context {
    fn policy(&self) -> &SchedulerPolicy {
        self.engine.policy()
    }
}

/// The scheduler loop
pub struct Scheduler {
    ctx: Arc<Context>,
    state: SchedulerState,
    cycles: u64,
}

impl Scheduler {
    pub fn new(policy: SchedulerPolicy, collaborators: Collaborators, clock: Arc<dyn Clock>) -> Self {
        info!(
            calendar = collaborators.calendar.calendar_id(),
            poll_interval = ?policy.poll_interval,
            imminent = ?policy.imminent,
            back_to_back_gap = ?policy.back_to_back_gap,
            "Scheduler initialized"
        );

        Self {
            ctx: Arc::new(Context {
                engine: DecisionEngine::new(policy),
                collaborators,
                clock,
            }),
            state: SchedulerState::new(),
            cycles: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn policy(&self) -> &SchedulerPolicy {
        self.ctx.policy()
    }

    /// Number of completed cycles, successful or not
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Fetch, classify and decide without touching the display or the state
    pub async fn evaluate(&self) -> blocker_util::Result<Evaluation> {
        evaluate(&self.ctx, self.state).await
    }

    /// Run one decision cycle and return how long to wait before the next
    pub async fn step(&mut self) -> Duration {
        let joined = self.spawn_cycle().await;
        self.finish_cycle(joined)
    }

    /// Run until `shutdown` turns true (or its sender goes away), then hide
    /// the blocker.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("Scheduler running");

        loop {
            let mut cycle = self.spawn_cycle();
            let joined = tokio::select! {
                joined = &mut cycle => joined,
                _ = shutdown_requested(&mut shutdown) => {
                    cycle.abort();
                    // Let the aborted cycle unwind before hiding
                    let _ = cycle.await;
                    break;
                }
            };

            let delay = self.finish_cycle(joined);
            debug!(
                delay = ?delay,
                wake_at = %format_clock_time(&(self.ctx.clock.now() + to_chrono_duration(delay))),
                "Next decision scheduled"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown_requested(&mut shutdown) => break,
            }
        }

        info!(cycles = self.cycles, "Scheduler stopping");
        self.hide_on_exit().await;
    }

    fn spawn_cycle(&self) -> JoinHandle<blocker_util::Result<Decision>> {
        let ctx = Arc::clone(&self.ctx);
        let state = self.state;
        tokio::spawn(async move { run_cycle(&ctx, state).await })
    }

    fn finish_cycle(
        &mut self,
        joined: Result<blocker_util::Result<Decision>, JoinError>,
    ) -> Duration {
        self.cycles += 1;

        let result = joined.unwrap_or_else(|e| {
            Err(BlockerError::internal(format!("decision cycle aborted: {}", e)))
        });

        match result {
            Ok(decision) => {
                self.state = decision.state;
                decision.delay
            }
            Err(e) if e.is_transport() => {
                let retry_in = self.policy().retry_backoff;
                warn!(error = %e, retry_in = ?retry_in, "Calendar unavailable, keeping current display");
                retry_in
            }
            Err(e) => {
                error!(error = %e, "Decision cycle failed, continuing");
                self.policy().poll_interval
            }
        }
    }

    async fn hide_on_exit(&self) {
        let display = &self.ctx.collaborators.display;
        if display.showing().is_none() {
            return;
        }

        match tokio::time::timeout(self.policy().call_timeout, display.hide()).await {
            Ok(Ok(())) => info!("Blocker hidden for shutdown"),
            Ok(Err(e)) => warn!(error = %e, "Failed to hide blocker on shutdown"),
            Err(_) => warn!("Timed out hiding blocker on shutdown"),
        }
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    // A dropped sender counts as a shutdown request
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn fetch_bookings(ctx: &Context) -> blocker_util::Result<Vec<Booking>> {
    let policy = ctx.policy();
    let calendar = &ctx.collaborators.calendar;
    let attempts = policy.fetch_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 1..=attempts {
        let now = ctx.clock.now();
        let time_min = now - to_chrono_duration(policy.lookbehind);
        let time_max = now + to_chrono_duration(policy.lookahead);

        match tokio::time::timeout(policy.call_timeout, calendar.fetch(time_min, time_max)).await {
            Ok(Ok(bookings)) => {
                debug!(count = bookings.len(), attempt, "Bookings fetched");
                return Ok(bookings);
            }
            Ok(Err(e)) => last_error = e.to_string(),
            Err(_) => last_error = format!("no response within {:?}", policy.call_timeout),
        }

        warn!(
            calendar = calendar.calendar_id(),
            attempt,
            attempts,
            error = %last_error,
            "Calendar query failed"
        );

        if attempt < attempts {
            tokio::time::sleep(policy.retry_backoff).await;
        }
    }

    Err(BlockerError::calendar_unavailable(attempts, last_error))
}

async fn evaluate(ctx: &Context, state: SchedulerState) -> blocker_util::Result<Evaluation> {
    let bookings = fetch_bookings(ctx).await?;
    let now = ctx.clock.now();

    let events = classify(&bookings, now);
    if !events.is_consistent()
        && let Some(current) = events.current
    {
        let others: Vec<&str> = events.overlapping.iter().map(|b| b.label()).collect();
        warn!(
            current = current.label(),
            overlapping = ?others,
            "Inconsistent calendar: overlapping bookings, keeping the first"
        );
    }

    let decision = ctx.engine.decide(&events, now, state);
    let events = events.to_owned_bookings();
    Ok(Evaluation {
        now,
        bookings,
        events,
        decision,
    })
}

async fn run_cycle(ctx: &Context, state: SchedulerState) -> blocker_util::Result<Decision> {
    let evaluation = evaluate(ctx, state).await?;
    let decision = evaluation.decision;

    log_transition(&evaluation, state);
    apply_action(ctx, decision.action).await;

    if decision.state.display_state.is_visible() {
        enforce_focus(ctx).await;
    }

    Ok(decision)
}

fn log_transition(evaluation: &Evaluation, previous: SchedulerState) {
    let decision = &evaluation.decision;
    let events = &evaluation.events;

    match decision.reason {
        DecisionReason::BookingInProgress => {
            if let Some(current) = &events.current
                && (!previous.event_announced || previous.announced_end != Some(current.end))
            {
                info!(
                    booking = current.label(),
                    ends_at = %format_clock_time(&current.end),
                    length = %format_duration(current.duration()),
                    "Booking in progress"
                );
            }
        }
        DecisionReason::BackToBack => {
            // Touching bookings hand over with the next one already running
            let starting = events.current.as_ref().or(events.next.as_ref());
            if let (Some(last), Some(next)) = (&events.last, starting) {
                info!(
                    ended = last.label(),
                    starting = next.label(),
                    starts_at = %format_clock_time(&next.start),
                    "Back-to-back bookings"
                );
            }
        }
        DecisionReason::BookingImminent if previous.display_state.is_visible() => {
            if let Some(next) = &events.next {
                info!(
                    booking = next.label(),
                    starts_at = %format_clock_time(&next.start),
                    "Booking imminent"
                );
            }
        }
        _ => {}
    }

    if decision.state.display_state != previous.display_state {
        match decision.state.display_state.variant() {
            Some(variant) => info!(variant = %variant, reason = ?decision.reason, "Blocker shown"),
            None => info!(reason = ?decision.reason, "Blocker hidden"),
        }
    }
}

async fn apply_action(ctx: &Context, action: DisplayAction) {
    let display = &ctx.collaborators.display;
    let timeout = ctx.policy().call_timeout;

    let variant = match action {
        DisplayAction::NoOp => return,
        DisplayAction::Hide => None,
        DisplayAction::ShowBoot => Some(ctx.policy().boot_variant),
        DisplayAction::ShowSessionEnded => Some(MessageVariant::SessionEnded),
        DisplayAction::ShowBackToBack { .. } => Some(MessageVariant::BackToBack),
    };

    let result = match variant {
        Some(variant) => tokio::time::timeout(timeout, display.show(variant)).await,
        None => tokio::time::timeout(timeout, display.hide()).await,
    };

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(action = ?action, error = %e, "Display command failed"),
        Err(_) => warn!(action = ?action, timeout = ?timeout, "Display command timed out"),
    }
}

async fn enforce_focus(ctx: &Context) {
    let target = &ctx.collaborators.focus_target;
    let timeout = ctx.policy().call_timeout;

    match tokio::time::timeout(timeout, ctx.collaborators.focus.bring_to_front(target)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(window = %target, error = %e, "Focus enforcement failed"),
        Err(_) => debug!(window = %target, "Focus enforcement timed out"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DisplayState, TokioClock};
    use blocker_host_api::{DisplayCommand, MockCalendar, MockDisplay, MockFocus};
    use chrono::TimeZone;

    struct Harness {
        calendar: Arc<MockCalendar>,
        display: Arc<MockDisplay>,
        focus: Arc<MockFocus>,
        scheduler: Scheduler,
    }

    fn t0() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 6, 14, 18, 0, 0).unwrap()
    }

    /// Booking relative to `t0`, in seconds
    fn booking(id: &str, start: i64, end: i64) -> Booking {
        let start = t0() + chrono::Duration::seconds(start);
        let end = t0() + chrono::Duration::seconds(end);
        Booking::new(id, Some(format!("Bay {}", id)), start, end).unwrap()
    }

    fn harness(bookings: Vec<Booking>) -> Harness {
        let calendar = Arc::new(MockCalendar::new().with_bookings(bookings));
        let display = Arc::new(MockDisplay::new());
        let focus = Arc::new(MockFocus::new());

        let scheduler = Scheduler::new(
            SchedulerPolicy::default(),
            Collaborators {
                calendar: calendar.clone(),
                display: display.clone(),
                focus: focus.clone(),
                focus_target: "Chromium".into(),
            },
            Arc::new(TokioClock::starting_at(t0())),
        );

        Harness {
            calendar,
            display,
            focus,
            scheduler,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn boot_message_then_session_ended() {
        let mut h = harness(vec![booking("1", 360, 1260)]);

        let delay = h.scheduler.step().await;
        assert_eq!(delay, Duration::from_secs(20));
        assert_eq!(h.display.showing(), Some(MessageVariant::Boot));
        assert_eq!(h.scheduler.state().display_state, DisplayState::ShowingBoot);

        tokio::time::sleep(delay).await;
        h.scheduler.step().await;
        assert_eq!(h.display.showing(), Some(MessageVariant::SessionEnded));
        assert_eq!(h.scheduler.cycles(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn current_booking_hides_without_focus() {
        let mut h = harness(vec![booking("1", -60, 600)]);

        h.scheduler.step().await;
        assert_eq!(h.display.showing(), None);
        assert_eq!(h.display.commands(), vec![DisplayCommand::Hide]);
        assert!(h.focus.requests().is_empty());
        assert!(h.scheduler.state().event_announced);
    }

    #[tokio::test(start_paused = true)]
    async fn focus_enforced_while_visible() {
        let mut h = harness(vec![]);

        h.scheduler.step().await;
        h.scheduler.step().await;
        assert_eq!(h.focus.requests(), vec!["Chromium", "Chromium"]);
    }

    #[tokio::test(start_paused = true)]
    async fn focus_failure_is_swallowed() {
        let mut h = harness(vec![]);
        *h.focus.fail.lock().unwrap() = true;

        assert_eq!(h.scheduler.step().await, Duration::from_secs(20));
        assert_eq!(h.display.showing(), Some(MessageVariant::Boot));
    }

    #[tokio::test(start_paused = true)]
    async fn calendar_failures_preserve_state_and_display() {
        let mut h = harness(vec![]);
        h.scheduler.step().await;
        let state = h.scheduler.state();
        let commands = h.display.commands().len();

        h.calendar.fail_next(3);
        let delay = h.scheduler.step().await;

        assert_eq!(delay, Duration::from_secs(30));
        assert_eq!(h.calendar.fetch_count(), 4);
        assert_eq!(h.scheduler.state(), state);
        assert_eq!(h.display.commands().len(), commands);
        assert_eq!(h.display.showing(), Some(MessageVariant::Boot));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_recovers_within_cycle() {
        let mut h = harness(vec![]);
        h.calendar.fail_next(2);

        let started = tokio::time::Instant::now();
        let delay = h.scheduler.step().await;

        assert_eq!(delay, Duration::from_secs(20));
        assert_eq!(h.calendar.fetch_count(), 3);
        assert!(started.elapsed() >= Duration::from_secs(60));
        assert_eq!(h.display.showing(), Some(MessageVariant::Boot));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_calendar_times_out() {
        let mut h = harness(vec![]);
        *h.calendar.stall.lock().unwrap() = true;

        let delay = h.scheduler.step().await;
        assert_eq!(delay, Duration::from_secs(30));
        assert_eq!(h.calendar.fetch_count(), 3);
        assert!(h.scheduler.state().boot_pending);
    }

    #[tokio::test(start_paused = true)]
    async fn panic_in_cycle_is_contained() {
        let mut h = harness(vec![]);
        *h.calendar.panic_next.lock().unwrap() = true;

        let delay = h.scheduler.step().await;
        assert_eq!(delay, Duration::from_secs(20));
        assert!(h.scheduler.state().boot_pending);
        assert!(h.display.commands().is_empty());

        h.scheduler.step().await;
        assert_eq!(h.display.showing(), Some(MessageVariant::Boot));
    }

    #[tokio::test(start_paused = true)]
    async fn display_failure_does_not_stop_the_loop() {
        let mut h = harness(vec![]);
        *h.display.fail.lock().unwrap() = true;

        h.scheduler.step().await;
        assert!(!h.scheduler.state().boot_pending);

        *h.display.fail.lock().unwrap() = false;
        h.scheduler.step().await;
        assert_eq!(h.display.showing(), Some(MessageVariant::SessionEnded));
    }

    #[tokio::test(start_paused = true)]
    async fn evaluate_has_no_side_effects() {
        let h = harness(vec![booking_soon()]);

        let evaluation = h.scheduler.evaluate().await.unwrap();
        assert_eq!(evaluation.decision.action, DisplayAction::ShowBoot);
        assert_eq!(evaluation.bookings.len(), 1);
        assert!(h.display.commands().is_empty());
        assert!(h.focus.requests().is_empty());
        assert!(h.scheduler.state().boot_pending);
    }

    fn booking_soon() -> Booking {
        booking("soon", 400, 1300)
    }

    #[tokio::test(start_paused = true)]
    async fn touching_bookings_flash_back_to_back() {
        let mut h = harness(vec![booking("a", -60, 600), booking("b", 600, 1500)]);

        let mut elapsed = Duration::ZERO;
        while elapsed < Duration::from_secs(620) {
            let delay = h.scheduler.step().await;
            tokio::time::sleep(delay).await;
            elapsed += delay;
        }

        assert_eq!(
            h.display.transitions(),
            vec![
                DisplayCommand::Show(MessageVariant::BackToBack),
                DisplayCommand::Hide
            ]
        );
        assert_eq!(h.display.showing(), None);
        assert!(h.scheduler.state().event_announced);
        assert_eq!(
            h.scheduler.state().announced_end,
            Some(t0() + chrono::Duration::seconds(1500))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_bookings_keep_blocker_hidden() {
        let mut h = harness(vec![booking("a", -60, 600), booking("b", -30, 300)]);

        let evaluation = h.scheduler.evaluate().await.unwrap();
        assert_eq!(evaluation.events.current.as_ref().map(|b| b.id.as_str()), Some("a"));
        assert_eq!(evaluation.events.overlapping.len(), 1);

        let delay = h.scheduler.step().await;
        assert_eq!(delay, Duration::from_secs(20));
        assert_eq!(h.display.commands(), vec![DisplayCommand::Hide]);
        assert!(h.display.transitions().is_empty());
        assert_eq!(h.scheduler.state().announced_end, Some(t0() + chrono::Duration::seconds(600)));

        // Shorter overlap ending does not surface the blocker
        tokio::time::sleep(Duration::from_secs(300)).await;
        h.scheduler.step().await;
        assert_eq!(h.display.showing(), None);
        assert_eq!(h.scheduler.state().display_state, DisplayState::Hidden);
    }

    #[tokio::test(start_paused = true)]
    async fn run_hides_blocker_on_shutdown() {
        let h = harness(vec![]);
        let (tx, rx) = watch::channel(false);

        let display = h.display.clone();
        let task = tokio::spawn(h.scheduler.run(rx));

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(display.showing(), Some(MessageVariant::SessionEnded));

        tx.send(true).unwrap();
        task.await.unwrap();
        assert_eq!(display.showing(), None);
    }
}
