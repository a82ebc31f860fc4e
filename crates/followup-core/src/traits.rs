use crate::{
    error::{ErrorKind, FollowupError},
    record::{ApplicationRecord, NewApplication, Recipient},
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Record store: the only shared mutable resource.
///
/// Every mutation is scoped to a single record; nothing here spans a
/// multi-record transaction. Ownership checks happen upstream of the store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Records whose reminder is at or before `now` and not yet sent.
    async fn find_due_unsent(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ApplicationRecord>, FollowupError>;

    /// Acknowledge delivery of `reminder` for record `id`.
    ///
    /// Conditional write: applies only while the record is still unsent and
    /// its reminder still equals `reminder`. Returns `false` when the
    /// condition no longer holds (already sent, edited, or deleted).
    async fn mark_sent(&self, id: &str, reminder: DateTime<Utc>) -> Result<bool, FollowupError>;

    async fn get(&self, id: &str) -> Result<Option<ApplicationRecord>, FollowupError>;

    /// All records owned by `owner_id`, newest application first.
    async fn list_for_owner(&self, owner_id: &str)
        -> Result<Vec<ApplicationRecord>, FollowupError>;

    async fn create(
        &self,
        owner_id: &str,
        application: NewApplication,
    ) -> Result<ApplicationRecord, FollowupError>;

    /// Persist an edited record. Resets `reminder_sent` in the same write
    /// whenever the stored reminder differs from `record.reminder`;
    /// otherwise the stored flag is kept. `record.reminder_sent` is ignored,
    /// so only [`RecordStore::mark_sent`] can set it.
    ///
    /// Returns the stored record, or `None` if the id no longer exists.
    async fn update(
        &self,
        record: &ApplicationRecord,
    ) -> Result<Option<ApplicationRecord>, FollowupError>;

    /// Delete a record owned by `owner_id`. Returns `true` if a row was removed.
    async fn delete(&self, id: &str, owner_id: &str) -> Result<bool, FollowupError>;

    /// Journal one delivery attempt. Stores without a journal ignore it.
    async fn record_attempt(&self, _attempt: &DeliveryAttempt) -> Result<(), FollowupError> {
        Ok(())
    }
}

/// Identity provider: resolves where an owner's reminders go.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The owner's email recipient, or `None` when no email is on file.
    async fn resolve_recipient(&self, owner_id: &str)
        -> Result<Option<Recipient>, FollowupError>;
}

/// Outcome of one `send` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Underlying cause, kept for logs only.
    #[serde(skip)]
    pub cause: Option<String>,
}

impl DeliveryResult {
    pub fn delivered() -> Self {
        Self {
            success: true,
            error_kind: None,
            cause: None,
        }
    }

    pub fn failed(kind: ErrorKind, cause: impl Into<String>) -> Self {
        Self {
            success: false,
            error_kind: Some(kind),
            cause: Some(cause.into()),
        }
    }

    /// Nothing was attempted and nothing went wrong (e.g. notifications
    /// unsupported or denied on a best-effort channel).
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            error_kind: None,
            cause: Some(reason.into()),
        }
    }
}

/// Delivery channel: one way of telling a user their reminder is due.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Human-readable channel name.
    fn name(&self) -> &str;

    /// Whether a successful send may acknowledge the reminder in the store.
    fn is_authoritative(&self) -> bool;

    /// Attempt delivery once. Never retries internally.
    async fn send(&self, record: &ApplicationRecord, recipient: &Recipient) -> DeliveryResult;
}

/// Journal entry for one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryAttempt {
    pub application_id: String,
    pub channel: String,
    pub reminder: DateTime<Utc>,
    pub success: bool,
    pub error_kind: Option<ErrorKind>,
    pub cause: Option<String>,
    pub acknowledged: bool,
    pub attempted_at: DateTime<Utc>,
}
