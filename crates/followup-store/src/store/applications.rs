//! Application CRUD, due-reminder queries, and conditional acknowledgement.

use super::{format_ts, parse_ts, Store};
use crate::journal::DeliveryJournal;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use followup_core::{
    error::FollowupError,
    record::{ApplicationRecord, ApplicationStatus, NewApplication},
    traits::{DeliveryAttempt, RecordStore},
};
use tracing::debug;
use uuid::Uuid;

const SELECT_COLUMNS: &str = "SELECT id, owner_id, company, position, location, status, \
     applied_date, notes, url, contact_name, contact_email, reminder, reminder_sent, \
     created_at, updated_at FROM applications";

// (id, owner_id, company, position, location, status, applied_date, notes, url,
//  contact_name, contact_email, reminder, reminder_sent, created_at, updated_at)
type ApplicationRow = (
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    Option<String>,
    bool,
    String,
    String,
);

fn from_row(row: ApplicationRow) -> Result<ApplicationRecord, FollowupError> {
    let (
        id,
        owner_id,
        company,
        position,
        location,
        status,
        applied_date,
        notes,
        url,
        contact_name,
        contact_email,
        reminder,
        reminder_sent,
        created_at,
        updated_at,
    ) = row;

    let status = status
        .parse::<ApplicationStatus>()
        .map_err(|e| FollowupError::Store(format!("application {id}: {e}")))?;
    let reminder = reminder.as_deref().map(parse_ts).transpose()?;

    Ok(ApplicationRecord {
        status,
        applied_date: parse_ts(&applied_date)?,
        reminder,
        // The flag means nothing without a reminder.
        reminder_sent: reminder_sent && reminder.is_some(),
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
        id,
        owner_id,
        company,
        position,
        location,
        notes,
        url,
        contact_name,
        contact_email,
    })
}

fn from_rows(rows: Vec<ApplicationRow>) -> Result<Vec<ApplicationRecord>, FollowupError> {
    rows.into_iter().map(from_row).collect()
}

#[async_trait]
impl RecordStore for Store {
    async fn find_due_unsent(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<ApplicationRecord>, FollowupError> {
        let rows: Vec<ApplicationRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} \
             WHERE reminder IS NOT NULL AND reminder_sent = 0 AND reminder <= ? \
             ORDER BY reminder ASC"
        ))
        .bind(format_ts(now))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| FollowupError::Store(format!("find due reminders failed: {e}")))?;

        from_rows(rows)
    }

    async fn mark_sent(&self, id: &str, reminder: DateTime<Utc>) -> Result<bool, FollowupError> {
        let result = sqlx::query(
            "UPDATE applications SET reminder_sent = 1, updated_at = ? \
             WHERE id = ? AND reminder_sent = 0 AND reminder = ?",
        )
        .bind(format_ts(Utc::now()))
        .bind(id)
        .bind(format_ts(reminder))
        .execute(&self.pool)
        .await
        .map_err(|e| FollowupError::Store(format!("mark sent failed: {e}")))?;

        let applied = result.rows_affected() > 0;
        if !applied {
            debug!("mark sent for {id} was a no-op (already sent or reminder changed)");
        }
        Ok(applied)
    }

    async fn get(&self, id: &str) -> Result<Option<ApplicationRecord>, FollowupError> {
        let row: Option<ApplicationRow> =
            sqlx::query_as(&format!("{SELECT_COLUMNS} WHERE id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| FollowupError::Store(format!("get application failed: {e}")))?;

        row.map(from_row).transpose()
    }

    async fn list_for_owner(
        &self,
        owner_id: &str,
    ) -> Result<Vec<ApplicationRecord>, FollowupError> {
        let rows: Vec<ApplicationRow> = sqlx::query_as(&format!(
            "{SELECT_COLUMNS} WHERE owner_id = ? ORDER BY applied_date DESC, created_at DESC"
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| FollowupError::Store(format!("list applications failed: {e}")))?;

        from_rows(rows)
    }

    async fn create(
        &self,
        owner_id: &str,
        application: NewApplication,
    ) -> Result<ApplicationRecord, FollowupError> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let applied_date = application.applied_date.unwrap_or(now);

        sqlx::query(
            "INSERT INTO applications \
             (id, owner_id, company, position, location, status, applied_date, notes, url, \
              contact_name, contact_email, reminder, reminder_sent, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(&id)
        .bind(owner_id)
        .bind(&application.company)
        .bind(&application.position)
        .bind(&application.location)
        .bind(application.status.as_str())
        .bind(format_ts(applied_date))
        .bind(&application.notes)
        .bind(&application.url)
        .bind(&application.contact_name)
        .bind(&application.contact_email)
        .bind(application.reminder.map(format_ts))
        .bind(format_ts(now))
        .bind(format_ts(now))
        .execute(&self.pool)
        .await
        .map_err(|e| FollowupError::Store(format!("create application failed: {e}")))?;

        self.get(&id)
            .await?
            .ok_or_else(|| FollowupError::Store(format!("application {id} vanished after insert")))
    }

    async fn update(
        &self,
        record: &ApplicationRecord,
    ) -> Result<Option<ApplicationRecord>, FollowupError> {
        let reminder = record.reminder.map(format_ts);

        // Right-hand sides see the old row, so `reminder IS ?` compares the
        // stored reminder with the incoming one before it is overwritten.
        // The caller's `reminder_sent` is never written: only `mark_sent`
        // may set it.
        let result = sqlx::query(
            "UPDATE applications SET \
                 company = ?, position = ?, location = ?, status = ?, applied_date = ?, \
                 notes = ?, url = ?, contact_name = ?, contact_email = ?, \
                 reminder_sent = CASE \
                     WHEN ? IS NULL THEN 0 \
                     WHEN reminder IS ? THEN reminder_sent \
                     ELSE 0 END, \
                 reminder = ?, updated_at = ? \
             WHERE id = ? AND owner_id = ?",
        )
        .bind(&record.company)
        .bind(&record.position)
        .bind(&record.location)
        .bind(record.status.as_str())
        .bind(format_ts(record.applied_date))
        .bind(&record.notes)
        .bind(&record.url)
        .bind(&record.contact_name)
        .bind(&record.contact_email)
        .bind(&reminder)
        .bind(&reminder)
        .bind(&reminder)
        .bind(format_ts(Utc::now()))
        .bind(&record.id)
        .bind(&record.owner_id)
        .execute(&self.pool)
        .await
        .map_err(|e| FollowupError::Store(format!("update application failed: {e}")))?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        self.get(&record.id).await
    }

    async fn delete(&self, id: &str, owner_id: &str) -> Result<bool, FollowupError> {
        let result = sqlx::query("DELETE FROM applications WHERE id = ? AND owner_id = ?")
            .bind(id)
            .bind(owner_id)
            .execute(&self.pool)
            .await
            .map_err(|e| FollowupError::Store(format!("delete application failed: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_attempt(&self, attempt: &DeliveryAttempt) -> Result<(), FollowupError> {
        DeliveryJournal::new(self.pool.clone()).log(attempt).await
    }
}
