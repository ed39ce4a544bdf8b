//! Window focus enforcement

use async_trait::async_trait;
use blocker_config::DisplayPolicy;
use blocker_host_api::{FocusEnforcer, FocusError, FocusResult, NoFocus};
use std::process::Stdio;
use std::sync::Arc;
use tracing::debug;

/// Placeholder in the focus command replaced by the window identifier
pub const TITLE_PLACEHOLDER: &str = "{title}";

/// Raises the kiosk window by running an external command such as
/// `wmctrl -a {title}` or `xdotool search --name {title} windowactivate`.
///
/// Exit status 1 is reported as "no matching window", which is what both
/// tools return when the search comes up empty.
#[derive(Debug, Clone)]
pub struct CommandFocus {
    argv: Vec<String>,
}

impl CommandFocus {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    /// Command line for a given window identifier
    pub fn command_for(&self, identifier: &str) -> Vec<String> {
        self.argv
            .iter()
            .map(|arg| arg.replace(TITLE_PLACEHOLDER, identifier))
            .collect()
    }
}

#[async_trait]
impl FocusEnforcer for CommandFocus {
    async fn bring_to_front(&self, identifier: &str) -> FocusResult<()> {
        let argv = self.command_for(identifier);
        let Some((program, args)) = argv.split_first() else {
            return Err(FocusError::CommandFailed("empty focus command".into()));
        };

        let output = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;

        match output.status.code() {
            Some(0) => {
                debug!(window = identifier, "Window brought to front");
                Ok(())
            }
            Some(1) => Err(FocusError::WindowNotFound(identifier.to_string())),
            _ => Err(FocusError::CommandFailed(format!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ))),
        }
    }
}

/// Focus enforcer configured by the display policy
pub fn focus_from_policy(policy: &DisplayPolicy) -> Arc<dyn FocusEnforcer> {
    match &policy.focus_command {
        Some(argv) => Arc::new(CommandFocus::new(argv.clone())),
        None => Arc::new(NoFocus),
    }
}
