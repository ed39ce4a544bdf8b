//! Process management utilities

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;
use tracing::{debug, warn};

use blocker_host_api::{DisplayError, DisplayResult};

/// Environment passed through to spawned processes
const INHERITED_ENV: &[&str] = &[
    "PATH",
    "HOME",
    "DISPLAY",
    "WAYLAND_DISPLAY",
    "XDG_RUNTIME_DIR",
    "XAUTHORITY",
    "DBUS_SESSION_BUS_ADDRESS",
];

/// How often a stopping process is checked for exit
const REAP_POLL: Duration = Duration::from_millis(50);

/// Managed child process with process group
pub struct ManagedProcess {
    pub child: Child,
    pub pid: u32,
    pub pgid: u32,
}

impl ManagedProcess {
    /// Spawn a new process in its own process group
    pub fn spawn(argv: &[String]) -> DisplayResult<Self> {
        let Some((program, args)) = argv.split_first() else {
            return Err(DisplayError::SpawnFailed("Empty argv".into()));
        };

        let mut cmd = Command::new(program);
        cmd.args(args);

        cmd.env_clear();
        for key in INHERITED_ENV {
            if let Ok(value) = std::env::var(key) {
                cmd.env(key, value);
            }
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        // SAFETY: setsid is async-signal-safe and touches no parent state
        unsafe {
            cmd.pre_exec(|| {
                // New session, so the child leads its own process group
                nix::unistd::setsid().map_err(|e| std::io::Error::other(e.to_string()))?;
                Ok(())
            });
        }

        let child = cmd
            .spawn()
            .map_err(|e| DisplayError::SpawnFailed(format!("Failed to spawn {}: {}", program, e)))?;

        let pid = child.id();
        let pgid = pid; // After setsid, pid == pgid

        debug!(pid = pid, pgid = pgid, program = %program, "Process spawned");

        Ok(Self { child, pid, pgid })
    }

    /// Send SIGTERM to the process group
    pub fn terminate(&self) -> DisplayResult<()> {
        self.signal_group(Signal::SIGTERM)
    }

    /// Send SIGKILL to the process group
    pub fn kill(&self) -> DisplayResult<()> {
        self.signal_group(Signal::SIGKILL)
    }

    fn signal_group(&self, sig: Signal) -> DisplayResult<()> {
        let pgid = Pid::from_raw(-(self.pgid as i32)); // Negative for process group

        match signal::kill(pgid, sig) {
            Ok(()) => {
                debug!(pgid = self.pgid, signal = %sig, "Signalled process group");
                Ok(())
            }
            // Process already gone
            Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(e) => Err(DisplayError::StopFailed(format!(
                "Failed to send {}: {}",
                sig, e
            ))),
        }
    }

    /// Check if the process has exited (non-blocking)
    pub fn try_wait(&mut self) -> DisplayResult<Option<ExitStatus>> {
        Ok(self.child.try_wait()?)
    }

    /// Whether the process is still running
    pub fn is_running(&mut self) -> bool {
        matches!(self.try_wait(), Ok(None))
    }

    /// SIGTERM the group, then SIGKILL it if the leader is still around after
    /// `timeout`, and reap the leader.
    ///
    /// Cancelling the returned future leaves the process in place; dropping
    /// it kills the group.
    pub async fn stop(&mut self, timeout: Duration) -> DisplayResult<()> {
        if let Some(status) = self.try_wait()? {
            debug!(pid = self.pid, status = ?status, "Process already exited");
            // Leftover group members (browser helpers) may still be around
            return self.kill();
        }

        self.terminate()?;

        let start = tokio::time::Instant::now();
        loop {
            if let Some(status) = self.try_wait()? {
                debug!(pid = self.pid, status = ?status, "Process exited after SIGTERM");
                return self.kill();
            }

            if start.elapsed() >= timeout {
                break;
            }

            tokio::time::sleep(REAP_POLL).await;
        }

        warn!(pid = self.pid, timeout = ?timeout, "Process ignored SIGTERM, killing");
        self.kill()?;
        loop {
            if let Some(status) = self.try_wait()? {
                debug!(pid = self.pid, status = ?status, "Process killed");
                return Ok(());
            }
            tokio::time::sleep(REAP_POLL).await;
        }
    }
}

impl Drop for ManagedProcess {
    fn drop(&mut self) {
        if !self.is_running() {
            return;
        }

        warn!(pid = self.pid, "Dropping running process, killing its group");
        if self.kill().is_ok() {
            // SIGKILL cannot be ignored, so this returns promptly
            let _ = self.child.wait();
        }
    }
}
