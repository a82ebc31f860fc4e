//! Notification host that shells out to the platform notifier.
//!
//! `notify-send` on Linux/BSD desktops, `osascript` on macOS. Only
//! `notify-send` can report clicks, and only when click actions are enabled.

use super::{Notification, NotificationHost, NotificationPermission};
use async_trait::async_trait;
use followup_core::error::FollowupError;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use tokio::process::Command;
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// Action key `notify-send --wait` prints when the notification body is
/// clicked.
const DEFAULT_ACTION: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    NotifySend,
    Osascript,
}

impl Backend {
    fn for_platform() -> Self {
        if cfg!(target_os = "macos") {
            Self::Osascript
        } else {
            Self::NotifySend
        }
    }

    fn program(&self) -> &'static str {
        match self {
            Self::NotifySend => "notify-send",
            Self::Osascript => "osascript",
        }
    }

    fn opener(&self) -> &'static str {
        match self {
            Self::NotifySend => "xdg-open",
            Self::Osascript => "open",
        }
    }
}

/// Shells out to the platform notifier.
///
/// Permission model: neither daemon has a permission prompt of its own, so
/// an `Unset` permission is granted on the first request when the notifier
/// is installed. The answer lives only in this host and is not written back
/// to the config file, so a fresh process grants again. Set
/// `[desktop].permission = "denied"` (or `enabled = false`) to opt out for
/// good.
///
/// Clicks are reported only after [`CommandHost::with_click_actions`]: each
/// notification is then shown with a default action and watched until it
/// closes. Focusing opens `open_url` with the platform opener; without one
/// there is no window to raise.
pub struct CommandHost {
    backend: Backend,
    program: Option<PathBuf>,
    app_name: String,
    permission: Mutex<NotificationPermission>,
    active: Mutex<HashSet<String>>,
    click_actions: bool,
    open_url: Option<String>,
    watchers: tokio::sync::Mutex<JoinSet<Option<String>>>,
}

impl CommandHost {
    /// Locate the platform notifier on `PATH`.
    pub fn detect(app_name: &str, permission: NotificationPermission) -> Self {
        let backend = Backend::for_platform();
        let program = which::which(backend.program()).ok();
        if program.is_none() {
            debug!("{} not found on PATH", backend.program());
        }
        Self {
            backend,
            program,
            app_name: app_name.to_string(),
            permission: Mutex::new(permission),
            active: Mutex::new(HashSet::new()),
            click_actions: false,
            open_url: None,
            watchers: tokio::sync::Mutex::new(JoinSet::new()),
        }
    }

    /// Show notifications with a clickable default action and report clicks
    /// through [`NotificationHost::next_click`]. A click opens `open_url`,
    /// when set.
    pub fn with_click_actions(mut self, open_url: Option<String>) -> Self {
        self.click_actions = self.backend == Backend::NotifySend;
        if !self.click_actions {
            debug!("{} cannot report clicks", self.backend.program());
        }
        self.open_url = open_url;
        self
    }

    /// Notifications shown and not yet dismissed.
    pub fn active(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .active
            .lock()
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    fn args(&self, n: &Notification) -> Vec<String> {
        match self.backend {
            Backend::NotifySend => {
                let mut args = vec!["--app-name".to_string(), self.app_name.clone()];
                if self.click_actions {
                    args.push(format!("--action={DEFAULT_ACTION}=Open"));
                    args.push("--wait".to_string());
                }
                if let Some(ref icon) = n.icon {
                    args.push("--icon".to_string());
                    args.push(icon.clone());
                }
                args.push(n.title.clone());
                args.push(n.body.clone());
                args
            }
            Backend::Osascript => vec![
                "-e".to_string(),
                format!(
                    "display notification \"{}\" with title \"{}\"",
                    applescript_escape(&n.body),
                    applescript_escape(&n.title)
                ),
            ],
        }
    }
}

fn applescript_escape(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Whether `notify-send --wait` output reports the default action.
fn clicked(stdout: &[u8]) -> bool {
    String::from_utf8_lossy(stdout)
        .lines()
        .any(|line| line.trim() == DEFAULT_ACTION)
}

#[async_trait]
impl NotificationHost for CommandHost {
    fn is_supported(&self) -> bool {
        self.program.is_some()
    }

    fn permission(&self) -> NotificationPermission {
        self.permission
            .lock()
            .map(|p| *p)
            .unwrap_or(NotificationPermission::Denied)
    }

    async fn request_permission(&self) -> NotificationPermission {
        let answer = if self.is_supported() {
            NotificationPermission::Granted
        } else {
            NotificationPermission::Denied
        };
        if let Ok(mut p) = self.permission.lock() {
            if *p == NotificationPermission::Unset {
                *p = answer;
            }
            return *p;
        }
        answer
    }

    async fn show(&self, notification: &Notification) -> Result<(), FollowupError> {
        let program = self.program.as_ref().ok_or_else(|| {
            FollowupError::Notification(format!("{} not available", self.backend.program()))
        })?;

        if self.click_actions {
            return self.show_watched(program, notification).await;
        }

        let output = Command::new(program)
            .args(self.args(notification))
            .output()
            .await
            .map_err(|e| {
                FollowupError::Notification(format!("{} failed: {e}", self.backend.program()))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FollowupError::Notification(format!(
                "{} exited with {}: {}",
                self.backend.program(),
                output.status,
                stderr.trim()
            )));
        }

        if let Ok(mut active) = self.active.lock() {
            active.insert(notification.id.clone());
        }
        Ok(())
    }

    async fn focus_window(&self) -> Result<(), FollowupError> {
        let Some(ref url) = self.open_url else {
            // Terminal processes have no window of their own to raise.
            debug!("focus requested for {}, no open_url set", self.app_name);
            return Ok(());
        };

        let opener = self.backend.opener();
        let status = Command::new(opener)
            .arg(url)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| FollowupError::Notification(format!("{opener} failed: {e}")))?;
        if !status.success() {
            return Err(FollowupError::Notification(format!(
                "{opener} exited with {status}"
            )));
        }
        Ok(())
    }

    async fn dismiss(&self, notification_id: &str) -> Result<(), FollowupError> {
        if let Ok(mut active) = self.active.lock() {
            active.remove(notification_id);
        }
        Ok(())
    }

    async fn next_click(&self) -> Option<String> {
        let mut watchers = self.watchers.lock().await;
        while let Some(joined) = watchers.join_next().await {
            match joined {
                Ok(Some(id)) => return Some(id),
                Ok(None) => {}
                Err(e) => warn!("notification watcher failed: {e}"),
            }
        }
        None
    }
}

impl CommandHost {
    /// Spawn the notifier in `--wait` mode and watch it until the
    /// notification is clicked or closed.
    async fn show_watched(
        &self,
        program: &Path,
        notification: &Notification,
    ) -> Result<(), FollowupError> {
        let child = Command::new(program)
            .args(self.args(notification))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                FollowupError::Notification(format!("{} failed: {e}", self.backend.program()))
            })?;

        if let Ok(mut active) = self.active.lock() {
            active.insert(notification.id.clone());
        }

        let id = notification.id.clone();
        self.watchers.lock().await.spawn(async move {
            match child.wait_with_output().await {
                Ok(output) if output.status.success() => clicked(&output.stdout).then_some(id),
                Ok(output) => {
                    warn!(
                        "notify-send for {id} exited with {}: {}",
                        output.status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    );
                    None
                }
                Err(e) => {
                    warn!("notify-send for {id} failed: {e}");
                    None
                }
            }
        });
        Ok(())
    }
}
