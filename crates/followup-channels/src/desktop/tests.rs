use super::*;
use chrono::{Duration, TimeZone};
use followup_core::record::ApplicationStatus;
use std::sync::Mutex;

/// Records every host interaction for assertion.
struct FakeHost {
    supported: bool,
    permission: Mutex<NotificationPermission>,
    answer: NotificationPermission,
    fail_show: bool,
    fail_focus: bool,
    clicks: Mutex<Vec<String>>,
    calls: Mutex<Vec<String>>,
}

impl FakeHost {
    fn new(permission: NotificationPermission, answer: NotificationPermission) -> Self {
        Self {
            supported: true,
            permission: Mutex::new(permission),
            answer,
            fail_show: false,
            fail_focus: false,
            clicks: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }
}

#[async_trait]
impl NotificationHost for FakeHost {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn permission(&self) -> NotificationPermission {
        *self.permission.lock().unwrap()
    }

    async fn request_permission(&self) -> NotificationPermission {
        self.calls.lock().unwrap().push("request".to_string());
        *self.permission.lock().unwrap() = self.answer;
        self.answer
    }

    async fn show(&self, notification: &Notification) -> Result<(), FollowupError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("show:{}", notification.id));
        if self.fail_show {
            return Err(FollowupError::Notification("daemon gone".to_string()));
        }
        Ok(())
    }

    async fn focus_window(&self) -> Result<(), FollowupError> {
        self.calls.lock().unwrap().push("focus".to_string());
        if self.fail_focus {
            return Err(FollowupError::Notification("no opener".to_string()));
        }
        Ok(())
    }

    async fn dismiss(&self, notification_id: &str) -> Result<(), FollowupError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("dismiss:{notification_id}"));
        Ok(())
    }

    async fn next_click(&self) -> Option<String> {
        let mut clicks = self.clicks.lock().unwrap();
        (!clicks.is_empty()).then(|| clicks.remove(0))
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

fn record(id: &str, reminder: Option<DateTime<Utc>>, sent: bool) -> ApplicationRecord {
    ApplicationRecord {
        id: id.to_string(),
        owner_id: "u".to_string(),
        company: "Acme".to_string(),
        position: "Engineer".to_string(),
        location: None,
        status: ApplicationStatus::Applied,
        applied_date: now(),
        notes: None,
        url: None,
        contact_name: None,
        contact_email: None,
        reminder,
        reminder_sent: sent,
        created_at: now(),
        updated_at: now(),
    }
}

fn records() -> Vec<ApplicationRecord> {
    vec![
        record("due-1", Some(now() - Duration::hours(1)), false),
        record("sent", Some(now() - Duration::hours(1)), true),
        record("future", Some(now() + Duration::hours(1)), false),
        record("none", None, false),
        record("due-2", Some(now()), false),
    ]
}

fn notifier(host: FakeHost) -> DesktopNotifier<FakeHost> {
    DesktopNotifier::new(host, &DesktopConfig::default())
}

#[tokio::test]
async fn test_granted_shows_one_per_due_unsent_record() {
    let n = notifier(FakeHost::new(
        NotificationPermission::Granted,
        NotificationPermission::Granted,
    ));
    assert_eq!(n.notify_due(&records(), now()).await, 2);
    assert_eq!(n.host().calls(), vec!["show:due-1", "show:due-2"]);
}

#[tokio::test]
async fn test_unset_asks_once_then_shows() {
    let n = notifier(FakeHost::new(
        NotificationPermission::Unset,
        NotificationPermission::Granted,
    ));
    assert_eq!(n.notify_due(&records(), now()).await, 2);
    assert_eq!(n.host().count("request"), 1);

    // Already granted: no second prompt.
    n.notify_due(&records(), now()).await;
    assert_eq!(n.host().count("request"), 1);
}

#[tokio::test]
async fn test_denial_silences_future_calls() {
    let n = notifier(FakeHost::new(
        NotificationPermission::Unset,
        NotificationPermission::Denied,
    ));
    assert_eq!(n.notify_due(&records(), now()).await, 0);
    assert_eq!(n.notify_due(&records(), now()).await, 0);
    assert_eq!(n.host().calls(), vec!["request"]);
}

#[tokio::test]
async fn test_unsupported_is_silent_noop() {
    let mut host = FakeHost::new(
        NotificationPermission::Unset,
        NotificationPermission::Granted,
    );
    host.supported = false;
    let n = notifier(host);
    assert_eq!(n.notify_due(&records(), now()).await, 0);
    assert!(n.host().calls().is_empty());
}

#[tokio::test]
async fn test_nothing_due_never_prompts() {
    let n = notifier(FakeHost::new(
        NotificationPermission::Unset,
        NotificationPermission::Granted,
    ));
    let only_future = vec![record("future", Some(now() + Duration::days(1)), false)];
    assert_eq!(n.notify_due(&only_future, now()).await, 0);
    assert!(n.host().calls().is_empty());
}

#[tokio::test]
async fn test_show_failure_does_not_stop_siblings() {
    let mut host = FakeHost::new(
        NotificationPermission::Granted,
        NotificationPermission::Granted,
    );
    host.fail_show = true;
    let n = notifier(host);
    assert_eq!(n.notify_due(&records(), now()).await, 0);
    assert_eq!(n.host().count("show:"), 2);
}

#[tokio::test]
async fn test_click_focuses_then_dismisses() {
    let n = notifier(FakeHost::new(
        NotificationPermission::Granted,
        NotificationPermission::Granted,
    ));
    n.handle_click("due-1").await.unwrap();
    assert_eq!(n.host().calls(), vec!["focus", "dismiss:due-1"]);
}

#[tokio::test]
async fn test_reported_clicks_are_handled_in_order() {
    let host = FakeHost::new(
        NotificationPermission::Granted,
        NotificationPermission::Granted,
    );
    *host.clicks.lock().unwrap() = vec!["due-2".to_string(), "due-1".to_string()];
    let n = notifier(host);

    assert_eq!(n.notify_due(&records(), now()).await, 2);
    assert_eq!(n.handle_clicks().await, 2);
    assert_eq!(
        n.host().calls(),
        vec![
            "show:due-1",
            "show:due-2",
            "focus",
            "dismiss:due-2",
            "focus",
            "dismiss:due-1",
        ]
    );
}

#[tokio::test]
async fn test_failed_focus_keeps_handling_clicks() {
    let mut host = FakeHost::new(
        NotificationPermission::Granted,
        NotificationPermission::Granted,
    );
    host.fail_focus = true;
    *host.clicks.lock().unwrap() = vec!["due-1".to_string(), "due-2".to_string()];
    let n = notifier(host);

    assert_eq!(n.handle_clicks().await, 0);
    assert_eq!(n.host().count("focus"), 2);
    assert_eq!(n.host().count("dismiss:"), 0);
}

#[tokio::test]
async fn test_notification_text() {
    let n = notifier(FakeHost::new(
        NotificationPermission::Granted,
        NotificationPermission::Granted,
    ));
    let note = n.notification_for(&record("A", Some(now()), false));
    assert_eq!(note.id, "A");
    assert_eq!(note.title, "Job Application Reminder");
    assert_eq!(note.body, "Follow up on your application for Engineer at Acme");
}

#[tokio::test]
async fn test_channel_contract_is_not_authoritative() {
    let n = notifier(FakeHost::new(
        NotificationPermission::Denied,
        NotificationPermission::Denied,
    ));
    let recipient = Recipient {
        email: String::new(),
        name: None,
    };
    assert!(!n.is_authoritative());
    assert_eq!(n.name(), "desktop");

    let result = n.send(&record("A", Some(now()), false), &recipient).await;
    assert!(!result.success);
    assert_eq!(result.error_kind, None, "denied permission is not an error");

    let granted = notifier(FakeHost::new(
        NotificationPermission::Granted,
        NotificationPermission::Granted,
    ));
    let result = granted.send(&record("A", Some(now()), false), &recipient).await;
    assert!(result.success);
}
