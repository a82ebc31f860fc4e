//! Delivery journal: records every reminder delivery attempt.

use crate::store::{format_ts, parse_ts};
use chrono::{DateTime, Utc};
use followup_core::{error::FollowupError, traits::DeliveryAttempt};
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

/// Status of a journaled attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalStatus {
    Delivered,
    Failed,
    Skipped,
}

impl JournalStatus {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    fn parse(raw: &str) -> Self {
        match raw {
            "delivered" => Self::Delivered,
            "failed" => Self::Failed,
            _ => Self::Skipped,
        }
    }

    fn of(attempt: &DeliveryAttempt) -> Self {
        match (attempt.success, attempt.error_kind) {
            (true, _) => Self::Delivered,
            (false, Some(_)) => Self::Failed,
            (false, None) => Self::Skipped,
        }
    }
}

/// A journal row read back from the store.
#[derive(Debug, Clone)]
pub struct JournalEntry {
    pub application_id: String,
    pub channel: String,
    pub reminder: DateTime<Utc>,
    pub status: JournalStatus,
    pub error_kind: Option<String>,
    pub cause: Option<String>,
    pub acknowledged: bool,
    pub attempted_at: DateTime<Utc>,
}

/// Delivery journal backed by SQLite.
pub struct DeliveryJournal {
    pool: SqlitePool,
}

impl DeliveryJournal {
    /// Create a journal sharing the given pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one attempt.
    pub async fn log(&self, attempt: &DeliveryAttempt) -> Result<(), FollowupError> {
        let id = Uuid::new_v4().to_string();
        let status = JournalStatus::of(attempt);

        sqlx::query(
            "INSERT INTO delivery_log \
             (id, application_id, channel, reminder, status, error_kind, cause, \
              acknowledged, attempted_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&attempt.application_id)
        .bind(&attempt.channel)
        .bind(format_ts(attempt.reminder))
        .bind(status.as_str())
        .bind(attempt.error_kind.map(|k| k.as_str()))
        .bind(&attempt.cause)
        .bind(attempt.acknowledged)
        .bind(format_ts(attempt.attempted_at))
        .execute(&self.pool)
        .await
        .map_err(|e| FollowupError::Store(format!("delivery log write failed: {e}")))?;

        debug!(
            "journal: {} via {} [{}]",
            attempt.application_id,
            attempt.channel,
            status.as_str()
        );

        Ok(())
    }

    /// Attempts for one application, oldest first.
    pub async fn entries_for(
        &self,
        application_id: &str,
    ) -> Result<Vec<JournalEntry>, FollowupError> {
        #[allow(clippy::type_complexity)]
        let rows: Vec<(
            String,
            String,
            String,
            String,
            Option<String>,
            Option<String>,
            bool,
            String,
        )> = sqlx::query_as(
            "SELECT application_id, channel, reminder, status, error_kind, cause, \
                    acknowledged, attempted_at \
             FROM delivery_log WHERE application_id = ? \
             ORDER BY attempted_at ASC, rowid ASC",
        )
        .bind(application_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| FollowupError::Store(format!("delivery log read failed: {e}")))?;

        rows.into_iter()
            .map(
                |(
                    application_id,
                    channel,
                    reminder,
                    status,
                    error_kind,
                    cause,
                    acknowledged,
                    attempted_at,
                )| {
                    Ok(JournalEntry {
                        application_id,
                        channel,
                        reminder: parse_ts(&reminder)?,
                        status: JournalStatus::parse(&status),
                        error_kind,
                        cause,
                        acknowledged,
                        attempted_at: parse_ts(&attempted_at)?,
                    })
                },
            )
            .collect()
    }
}
