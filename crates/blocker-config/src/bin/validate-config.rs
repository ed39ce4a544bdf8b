//! Config validation CLI tool
//!
//! Checks a blockerd configuration file and prints the effective settings.

use blocker_config::{CalendarCredentials, ConfigError, Policy};
use blocker_util::{default_config_path, format_duration};
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a blockerd configuration file.");
            eprintln!();
            eprintln!("Default location: {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match blocker_config::load_config(&config_path) {
        Ok(policy) => {
            println!("✓ Configuration is valid");
            println!();
            print_summary(&policy);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        blocker_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}

fn print_summary(policy: &Policy) {
    let auth = match &policy.calendar.credentials {
        CalendarCredentials::ApiKey(_) => "api key".to_string(),
        CalendarCredentials::AccessTokenEnv(var) => format!("bearer token from ${}", var),
    };
    let s = &policy.scheduler;

    println!("Calendar:");
    println!("  Id: {}", policy.calendar.calendar_id);
    println!("  Endpoint: {}", policy.calendar.base_url);
    println!("  Auth: {}", auth);
    println!();
    println!("Scheduler:");
    println!("  Poll interval: {}", format_duration(s.poll_interval));
    println!("  Ending soon: {}", format_duration(s.ending_soon));
    println!("  Imminent: {}", format_duration(s.imminent));
    println!(
        "  Back-to-back: gap {}, hold {}",
        format_duration(s.back_to_back_gap),
        format_duration(s.back_to_back_hold)
    );
    println!(
        "  Query window: -{} / +{}",
        format_duration(s.lookbehind),
        format_duration(s.lookahead)
    );
    println!(
        "  Calendar retries: {} attempts, {} apart",
        s.fetch_attempts,
        format_duration(s.retry_backoff)
    );
    println!("  Boot message: {}", s.boot_variant);
    println!();
    println!("Display:");
    println!("  Browser: {}", policy.display.browser);
    println!("  Page: {}", policy.display.page.display());
    for dir in policy.display.profile_dirs() {
        println!("  Profile: {}", dir.display());
    }
}
