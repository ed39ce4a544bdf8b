//! blockerd - The screen blocker background service
//!
//! This is the main entry point for the blockerd service.
//! It wires together all the components:
//! - Configuration loading
//! - Google Calendar client
//! - Kiosk browser display and focus enforcement
//! - Scheduler loop
//! - Signal handling

use anyhow::{Context, Result};
use blocker_api::Booking;
use blocker_config::{CalendarCredentials, Policy, load_config};
use blocker_core::{Collaborators, Scheduler, SystemClock};
use blocker_host_linux::{GoogleCalendar, KioskDisplay, focus_from_policy};
use blocker_util::{default_config_path, format_clock_time, format_datetime_full, format_duration};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Log output format
#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

/// blockerd - Kiosk blocker screen driven by a booking calendar
#[derive(Parser, Debug)]
#[command(name = "blockerd")]
#[command(about = "Kiosk blocker screen driven by a booking calendar", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/blockerd/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set BLOCKER_DATA_DIR env var)
    #[arg(short, long, env = "BLOCKER_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Evaluate the calendar once, print the decision and exit without
    /// touching the display
    #[arg(long)]
    once: bool,
}

/// Main service state
struct Service {
    policy: Policy,
    display: Arc<KioskDisplay>,
    scheduler: Scheduler,
}

impl Service {
    fn new(args: &Args) -> Result<Self> {
        let mut policy = load_config(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        if let Some(data_dir) = &args.data_dir {
            policy = policy.with_data_dir(data_dir.clone());
        }

        info!(
            config_path = %args.config.display(),
            calendar = %policy.calendar.calendar_id,
            "Configuration loaded"
        );

        let calendar = GoogleCalendar::new(policy.calendar.clone(), policy.scheduler.call_timeout)
            .context("Failed to create calendar client")?;

        let display = Arc::new(KioskDisplay::new(policy.display.clone()));
        let focus = focus_from_policy(&policy.display);

        let scheduler = Scheduler::new(
            policy.scheduler.clone(),
            Collaborators {
                calendar: Arc::new(calendar),
                display: display.clone(),
                focus,
                focus_target: policy.display.window_title.clone(),
            },
            Arc::new(SystemClock),
        );

        Ok(Self {
            policy,
            display,
            scheduler,
        })
    }

    /// Create the data directory and browser profiles
    fn prepare_filesystem(&self) -> Result<()> {
        let data_dir = &self.policy.daemon.data_dir;
        std::fs::create_dir_all(data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let profiles = self
            .display
            .prepare_profiles()
            .with_context(|| {
                format!(
                    "Failed to create browser profiles under {:?}",
                    self.policy.display.profile_root
                )
            })?;

        info!(
            data_dir = %data_dir.display(),
            profiles = profiles.len(),
            "Data directory ready"
        );
        Ok(())
    }

    fn log_banner(&self) {
        let s = &self.policy.scheduler;
        let auth = match &self.policy.calendar.credentials {
            CalendarCredentials::ApiKey(_) => "api-key",
            CalendarCredentials::AccessTokenEnv(_) => "bearer",
        };

        info!(
            calendar = %self.policy.calendar.calendar_id,
            auth,
            poll_interval = %format_duration(s.poll_interval),
            imminent = %format_duration(s.imminent),
            back_to_back_gap = %format_duration(s.back_to_back_gap),
            back_to_back_hold = %format_duration(s.back_to_back_hold),
            browser = %self.policy.display.browser,
            dual_screen = self.policy.display.dual_screen,
            mock_time = blocker_util::is_mock_time_active(),
            "Screen blocker ready"
        );
    }

    async fn run(self) -> Result<()> {
        self.prepare_filesystem()?;
        self.log_banner();

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup =
            signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut scheduler = tokio::spawn(self.scheduler.run(shutdown_rx));

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
            _ = sighup.recv() => info!("Received SIGHUP, shutting down gracefully"),
            result = &mut scheduler => {
                result.context("Scheduler task failed")?;
                anyhow::bail!("Scheduler stopped unexpectedly");
            }
        }

        // Receiver gone means the scheduler already stopped
        let _ = shutdown_tx.send(true);
        scheduler.await.context("Scheduler task failed")?;

        info!("Shutdown complete");
        Ok(())
    }

    async fn once(self) -> Result<()> {
        let evaluation = self
            .scheduler
            .evaluate()
            .await
            .context("Calendar evaluation failed")?;

        let events = &evaluation.events;
        let describe = |booking: Option<&Booking>| {
            booking.map_or_else(|| "-".to_string(), |b| b.to_string())
        };

        println!("Now:      {}", format_datetime_full(&evaluation.now));
        println!("Bookings: {}", evaluation.bookings.len());
        println!("Current:  {}", describe(events.current.as_ref()));
        println!("Last:     {}", describe(events.last.as_ref()));
        println!("Next:     {}", describe(events.next.as_ref()));
        for booking in &events.overlapping {
            println!("Overlap:  {}", booking);
        }
        println!();
        println!("Action:   {:?} ({:?})", evaluation.decision.action, evaluation.decision.reason);
        println!(
            "Next poll in {} (at {})",
            format_duration(evaluation.decision.delay),
            format_clock_time(
                &(evaluation.now + blocker_util::to_chrono_duration(evaluation.decision.delay))
            )
        );

        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    match args.log_format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "blockerd starting"
    );

    let service = Service::new(&args)?;
    if args.once {
        service.once().await
    } else {
        service.run().await
    }
}
