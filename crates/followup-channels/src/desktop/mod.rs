//! Local desktop notifications for due reminders.
//!
//! Best-effort and never authoritative: a shown notification does not
//! acknowledge the reminder. A missing capability or a denied permission is a
//! silent no-op, not an error.

mod command;

#[cfg(test)]
mod tests;

pub use command::CommandHost;
pub use followup_core::config::NotificationPermission;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use followup_core::{
    config::DesktopConfig,
    error::{ErrorKind, FollowupError},
    record::{ApplicationRecord, Recipient},
    reminder::due_unsent,
    traits::{DeliveryChannel, DeliveryResult},
};
use tracing::{debug, info, warn};

/// A notification ready to hand to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Stable per record, so a repeat replaces rather than stacks.
    pub id: String,
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
}

/// What the local runtime can do with notifications.
#[async_trait]
pub trait NotificationHost: Send + Sync {
    /// Whether the environment can show notifications at all.
    fn is_supported(&self) -> bool;

    /// Current permission, which may change outside this process.
    fn permission(&self) -> NotificationPermission;

    /// Ask the user for permission. Only called while permission is unset.
    async fn request_permission(&self) -> NotificationPermission;

    async fn show(&self, notification: &Notification) -> Result<(), FollowupError>;

    /// Bring the application window to the front.
    async fn focus_window(&self) -> Result<(), FollowupError>;

    async fn dismiss(&self, notification_id: &str) -> Result<(), FollowupError>;

    /// Wait for the next clicked notification. `None` once no shown
    /// notification can still report a click; hosts without click support
    /// return `None` straight away.
    async fn next_click(&self) -> Option<String> {
        None
    }
}

/// Shows one notification per due reminder through a [`NotificationHost`].
pub struct DesktopNotifier<H> {
    host: H,
    title: String,
    icon: Option<String>,
}

impl<H: NotificationHost> DesktopNotifier<H> {
    pub fn new(host: H, config: &DesktopConfig) -> Self {
        Self {
            host,
            title: config.title.clone(),
            icon: config.icon.clone(),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn notification_for(&self, record: &ApplicationRecord) -> Notification {
        Notification {
            id: record.id.clone(),
            title: self.title.clone(),
            body: format!(
                "Follow up on your application for {} at {}",
                record.position, record.company
            ),
            icon: self.icon.clone(),
        }
    }

    /// Resolve permission, asking at most once per call.
    async fn permitted(&self) -> bool {
        match self.host.permission() {
            NotificationPermission::Granted => true,
            NotificationPermission::Denied => false,
            NotificationPermission::Unset => {
                let answer = self.host.request_permission().await;
                info!("desktop notification permission answered: {answer:?}");
                answer == NotificationPermission::Granted
            }
        }
    }

    /// Notify the local user about every due, unsent record.
    ///
    /// Returns how many notifications were shown. Called when a client loads
    /// its records; never touches `reminder_sent`.
    pub async fn notify_due(&self, records: &[ApplicationRecord], now: DateTime<Utc>) -> usize {
        if !self.host.is_supported() {
            info!("desktop notifications are not supported here, skipping");
            return 0;
        }

        let due = due_unsent(records, now);
        if due.is_empty() {
            return 0;
        }

        if !self.permitted().await {
            debug!("desktop notifications not permitted, {} due skipped", due.len());
            return 0;
        }

        let mut shown = 0;
        for record in due {
            match self.host.show(&self.notification_for(record)).await {
                Ok(()) => shown += 1,
                Err(e) => warn!("desktop notification for {} failed: {e}", record.id),
            }
        }
        shown
    }

    /// A click focuses the application and dismisses the notification.
    pub async fn handle_click(&self, notification_id: &str) -> Result<(), FollowupError> {
        self.host.focus_window().await?;
        self.host.dismiss(notification_id).await
    }

    /// Route every click the host reports to [`Self::handle_click`] until no
    /// shown notification is left to click. Returns how many were handled.
    pub async fn handle_clicks(&self) -> usize {
        let mut handled = 0;
        while let Some(id) = self.host.next_click().await {
            match self.handle_click(&id).await {
                Ok(()) => handled += 1,
                Err(e) => warn!("desktop notification click for {id} failed: {e}"),
            }
        }
        handled
    }
}

#[async_trait]
impl<H: NotificationHost> DeliveryChannel for DesktopNotifier<H> {
    fn name(&self) -> &str {
        "desktop"
    }

    fn is_authoritative(&self) -> bool {
        false
    }

    async fn send(&self, record: &ApplicationRecord, _recipient: &Recipient) -> DeliveryResult {
        if !self.host.is_supported() {
            return DeliveryResult::skipped("desktop notifications unsupported");
        }
        if !self.permitted().await {
            return DeliveryResult::skipped("desktop notifications not permitted");
        }
        match self.host.show(&self.notification_for(record)).await {
            Ok(()) => DeliveryResult::delivered(),
            Err(e) => DeliveryResult::failed(ErrorKind::DeliveryFailed, e.to_string()),
        }
    }
}
