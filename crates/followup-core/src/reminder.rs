//! Reminder due detection and reminder edits.
//!
//! Everything here is pure: the evaluation instant is always passed in by the
//! caller, never read from the wall clock.

use crate::record::ApplicationRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether a record's reminder is due and not yet acknowledged at `now`.
///
/// A reminder exactly equal to `now` counts as due.
pub fn is_due(record: &ApplicationRecord, now: DateTime<Utc>) -> bool {
    match record.reminder {
        Some(at) => at <= now && !record.reminder_sent,
        None => false,
    }
}

/// Select the due, unsent records, preserving input order.
pub fn due_unsent(records: &[ApplicationRecord], now: DateTime<Utc>) -> Vec<&ApplicationRecord> {
    records.iter().filter(|r| is_due(r, now)).collect()
}

/// Set, change, or clear a record's reminder.
///
/// Always resets `reminder_sent`, including when the reminder is cleared,
/// so the flag never refers to a previous reminder.
pub fn set_reminder(
    mut record: ApplicationRecord,
    reminder: Option<DateTime<Utc>>,
) -> ApplicationRecord {
    record.reminder = reminder;
    record.reminder_sent = false;
    record
}

/// Remove a record's reminder.
pub fn clear_reminder(record: ApplicationRecord) -> ApplicationRecord {
    set_reminder(record, None)
}

/// How a record's reminder looks at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderState {
    /// No reminder armed.
    None,
    /// Reminder set for the future.
    Scheduled,
    /// Reminder reached and not yet delivered.
    Due,
    /// Reminder delivered by the email channel.
    Sent,
}

pub fn reminder_state(record: &ApplicationRecord, now: DateTime<Utc>) -> ReminderState {
    match record.reminder {
        None => ReminderState::None,
        Some(_) if record.reminder_sent => ReminderState::Sent,
        Some(at) if at <= now => ReminderState::Due,
        Some(_) => ReminderState::Scheduled,
    }
}
