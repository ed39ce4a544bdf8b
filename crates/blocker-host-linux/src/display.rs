//! Kiosk browser display

use async_trait::async_trait;
use blocker_api::MessageVariant;
use blocker_config::{DUAL_SCREEN_POSITIONS, DisplayPolicy, KIOSK_FLAGS};
use blocker_host_api::{DisplayController, DisplayError, DisplayResult};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

use crate::ManagedProcess;

struct Running {
    variant: MessageVariant,
    processes: Vec<ManagedProcess>,
}

/// Shows blocker messages in one kiosk browser per screen.
///
/// Each `show` with a different variant tears the browsers down and relaunches
/// them on the new message; a browser that died on its own is relaunched on
/// the next `show`.
pub struct KioskDisplay {
    policy: DisplayPolicy,
    running: tokio::sync::Mutex<Option<Running>>,
    showing: Mutex<Option<MessageVariant>>,
}

impl KioskDisplay {
    pub fn new(policy: DisplayPolicy) -> Self {
        Self {
            policy,
            running: tokio::sync::Mutex::new(None),
            showing: Mutex::new(None),
        }
    }

    /// Create the per-instance browser profile directories
    pub fn prepare_profiles(&self) -> std::io::Result<Vec<PathBuf>> {
        let dirs = self.policy.profile_dirs();
        for dir in &dirs {
            std::fs::create_dir_all(dir)?;
        }
        Ok(dirs)
    }

    fn set_showing(&self, variant: Option<MessageVariant>) {
        if let Ok(mut showing) = self.showing.lock() {
            *showing = variant;
        }
    }

    /// Stop the browsers one at a time. A process leaves `running` only once
    /// it is stopped, so a cancelled call leaves the rest tracked.
    async fn stop_all(&self, running: &mut Running) -> DisplayResult<()> {
        let mut first_error = None;
        while let Some(process) = running.processes.last_mut() {
            let pid = process.pid;
            if let Err(e) = process.stop(self.policy.stop_timeout).await {
                warn!(pid, error = %e, "Failed to stop browser");
                first_error.get_or_insert(e);
            }
            running.processes.pop();
        }

        first_error.map_or(Ok(()), Err)
    }

    async fn stop_current(&self, running: &mut Option<Running>) -> DisplayResult<()> {
        let result = match running.as_mut() {
            Some(current) => self.stop_all(current).await,
            None => return Ok(()),
        };

        *running = None;
        self.set_showing(None);
        result
    }

    fn launch(&self, variant: MessageVariant) -> DisplayResult<Running> {
        let url = message_url(&self.policy.page, variant);
        let mut processes = Vec::new();

        for (index, profile) in self.policy.profile_dirs().iter().enumerate() {
            let argv = build_argv(&self.policy, &url, index, profile);
            debug!(command = %escape_argv(&argv), "Launching browser");

            // On failure, dropping the instances already launched kills them
            processes.push(ManagedProcess::spawn(&argv)?);
        }

        Ok(Running { variant, processes })
    }
}

#[async_trait]
impl DisplayController for KioskDisplay {
    async fn show(&self, variant: MessageVariant) -> DisplayResult<()> {
        let mut running = self.running.lock().await;

        if let Some(current) = running.as_mut() {
            let alive = current.processes.iter_mut().all(|p| p.is_running());
            if current.variant == variant && alive {
                return Ok(());
            }
            if !alive {
                warn!(variant = %current.variant, "Browser exited unexpectedly, relaunching");
            }
        }

        self.stop_current(&mut running).await?;

        let launched = self.launch(variant)?;
        info!(
            variant = %variant,
            instances = launched.processes.len(),
            "Kiosk browser started"
        );
        *running = Some(launched);
        self.set_showing(Some(variant));

        // Let the window map before anyone tries to focus it
        tokio::time::sleep(self.policy.settle_delay).await;
        Ok(())
    }

    async fn hide(&self) -> DisplayResult<()> {
        let mut running = self.running.lock().await;
        if running.is_none() {
            return Ok(());
        }

        self.stop_current(&mut running).await?;
        info!("Kiosk browser stopped");
        Ok(())
    }

    fn showing(&self) -> Option<MessageVariant> {
        self.showing.lock().ok().and_then(|showing| *showing)
    }
}

/// `file://` URL of the message page for a variant
pub fn message_url(page: &Path, variant: MessageVariant) -> String {
    let page = std::path::absolute(page).unwrap_or_else(|_| page.to_path_buf());
    format!("file://{}?msg={}", page.display(), variant.query_value())
}

/// Browser command line for one instance
pub fn build_argv(policy: &DisplayPolicy, url: &str, index: usize, profile: &Path) -> Vec<String> {
    let mut argv = vec![policy.browser.clone()];
    argv.extend(KIOSK_FLAGS.iter().map(|flag| flag.to_string()));
    argv.extend(policy.extra_args.iter().cloned());

    if policy.dual_screen
        && let Some(position) = DUAL_SCREEN_POSITIONS.get(index)
    {
        argv.push(format!("--window-position={}", position));
    }

    argv.push(format!("--user-data-dir={}", profile.display()));
    argv.push(url.to_string());
    argv
}

fn escape_argv(argv: &[String]) -> String {
    argv.iter()
        .map(|arg| shell_escape::escape(Cow::Borrowed(arg.as_str())))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::time::Duration;

    fn policy(browser: &str, profile_root: &Path) -> DisplayPolicy {
        DisplayPolicy {
            browser: browser.into(),
            extra_args: vec!["--lang=fr".into()],
            page: PathBuf::from("/opt/blockerd/display.html"),
            dual_screen: false,
            profile_root: profile_root.to_path_buf(),
            window_title: "Chromium".into(),
            focus_command: None,
            settle_delay: Duration::ZERO,
            stop_timeout: Duration::from_secs(2),
        }
    }

    /// A "browser" that ignores its arguments and stays up
    fn fake_browser(dir: &Path) -> String {
        write_browser(dir, "fake-browser", "exec sleep 60")
    }

    /// Same, but deaf to SIGTERM
    fn stubborn_browser(dir: &Path) -> String {
        write_browser(dir, "stubborn-browser", "trap '' TERM\nexec sleep 60")
    }

    fn write_browser(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    fn is_alive(pid: u32) -> bool {
        nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
    }

    #[test]
    fn url_carries_message_variant() {
        let page = Path::new("/opt/blockerd/display.html");
        assert_eq!(
            message_url(page, MessageVariant::SessionEnded),
            "file:///opt/blockerd/display.html?msg=timesUp"
        );
        assert_eq!(
            message_url(page, MessageVariant::BackToBack),
            "file:///opt/blockerd/display.html?msg=backtoback"
        );
    }

    #[test]
    fn single_screen_argv() {
        let policy = policy("chromium", Path::new("/data/profiles"));
        let profile = &policy.profile_dirs()[0];
        let argv = build_argv(&policy, "file:///x.html?msg=boot", 0, profile);

        assert_eq!(argv[0], "chromium");
        assert_eq!(argv[1], "--kiosk");
        assert!(argv.contains(&"--lang=fr".to_string()));
        assert!(!argv.iter().any(|a| a.starts_with("--window-position")));
        assert_eq!(argv[argv.len() - 2], "--user-data-dir=/data/profiles/profile1");
        assert_eq!(argv.last().unwrap(), "file:///x.html?msg=boot");
    }

    #[test]
    fn dual_screen_argv_positions_each_instance() {
        let mut policy = policy("chromium", Path::new("/data/profiles"));
        policy.dual_screen = true;
        let profiles = policy.profile_dirs();

        let first = build_argv(&policy, "u", 0, &profiles[0]);
        let second = build_argv(&policy, "u", 1, &profiles[1]);
        assert!(first.contains(&"--window-position=9999,0".to_string()));
        assert!(second.contains(&"--window-position=0,0".to_string()));
        assert!(second.contains(&"--user-data-dir=/data/profiles/profile2".to_string()));
    }

    #[test]
    fn escaped_command_line() {
        let argv = vec!["chromium".to_string(), "file:///a b.html".to_string()];
        assert_eq!(escape_argv(&argv), "chromium 'file:///a b.html'");
    }

    #[tokio::test]
    async fn show_replace_and_hide() {
        let dir = tempfile::tempdir().unwrap();
        let browser = fake_browser(dir.path());
        let display = KioskDisplay::new(policy(&browser, &dir.path().join("profiles")));
        assert_eq!(display.prepare_profiles().unwrap().len(), 1);

        display.show(MessageVariant::Boot).await.unwrap();
        assert_eq!(display.showing(), Some(MessageVariant::Boot));
        let first_pid = display.running.lock().await.as_ref().unwrap().processes[0].pid;

        // Same variant: nothing relaunched
        display.show(MessageVariant::Boot).await.unwrap();
        let pid = display.running.lock().await.as_ref().unwrap().processes[0].pid;
        assert_eq!(pid, first_pid);

        display.show(MessageVariant::SessionEnded).await.unwrap();
        assert_eq!(display.showing(), Some(MessageVariant::SessionEnded));
        let pid = display.running.lock().await.as_ref().unwrap().processes[0].pid;
        assert_ne!(pid, first_pid);

        display.hide().await.unwrap();
        display.hide().await.unwrap();
        assert_eq!(display.showing(), None);
    }

    #[tokio::test]
    async fn interrupted_replace_keeps_browser_tracked() {
        let dir = tempfile::tempdir().unwrap();
        let browser = stubborn_browser(dir.path());
        let mut policy = policy(&browser, &dir.path().join("profiles"));
        policy.stop_timeout = Duration::from_secs(3);
        let display = KioskDisplay::new(policy);

        display.show(MessageVariant::Boot).await.unwrap();
        let pid = display.running.lock().await.as_ref().unwrap().processes[0].pid;
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Call timeout fires while the old browser is still ignoring SIGTERM
        let replaced =
            tokio::time::timeout(Duration::from_millis(500), display.show(MessageVariant::SessionEnded))
                .await;
        assert!(replaced.is_err());
        assert_eq!(display.showing(), Some(MessageVariant::Boot));
        assert!(is_alive(pid));

        display.hide().await.unwrap();
        assert_eq!(display.showing(), None);
        assert!(!is_alive(pid));
    }

    #[tokio::test]
    async fn missing_browser_reports_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let display = KioskDisplay::new(policy("/nonexistent/chromium", dir.path()));

        let result = display.show(MessageVariant::Boot).await;
        assert!(matches!(result, Err(DisplayError::SpawnFailed(_))));
        assert_eq!(display.showing(), None);
    }
}
