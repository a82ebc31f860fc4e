//! Due-reminder sweep: find, deliver, acknowledge.
//!
//! Delivery is at-least-once. Two sweeps racing on the same record may both
//! send; the conditional `mark_sent` lets exactly one of them acknowledge. A
//! send whose acknowledgement fails stays due and is sent again next sweep.

use chrono::{DateTime, Utc};
use followup_core::{
    error::{ErrorKind, FollowupError},
    record::{ApplicationRecord, Recipient},
    reminder::is_due,
    traits::{DeliveryAttempt, DeliveryChannel, DeliveryResult, IdentityProvider, RecordStore},
};
use futures_util::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Result of one record within a sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemResult {
    pub id: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// This sweep's conditional write took effect.
    pub acknowledged: bool,
}

/// Outcome of a full sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub processed: usize,
    pub results: Vec<ItemResult>,
}

impl SweepReport {
    pub fn delivered(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }

    pub fn acknowledged(&self) -> usize {
        self.results.iter().filter(|r| r.acknowledged).count()
    }

    pub fn failed(&self) -> usize {
        self.results.iter().filter(|r| r.error_kind.is_some()).count()
    }
}

/// Orchestrates sweeps against a store, an identity provider, and the
/// authoritative delivery channel.
#[derive(Clone)]
pub struct SweepCoordinator {
    store: Arc<dyn RecordStore>,
    identity: Arc<dyn IdentityProvider>,
    channel: Arc<dyn DeliveryChannel>,
    delivery_timeout: Option<Duration>,
}

impl SweepCoordinator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        identity: Arc<dyn IdentityProvider>,
        channel: Arc<dyn DeliveryChannel>,
    ) -> Self {
        Self {
            store,
            identity,
            channel,
            delivery_timeout: None,
        }
    }

    /// Bound each delivery so one hung send cannot hold the sweep open.
    pub fn with_delivery_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Run one sweep as of `now`.
    ///
    /// Fails only when the store cannot be queried; per-record failures are
    /// reported in the returned [`SweepReport`].
    pub async fn run_sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, FollowupError> {
        let candidates = self.store.find_due_unsent(now).await?;

        let due: Vec<(ApplicationRecord, DateTime<Utc>)> = candidates
            .into_iter()
            .filter_map(|record| {
                let confirmed = record.reminder.filter(|_| is_due(&record, now));
                match confirmed {
                    Some(reminder) => Some((record, reminder)),
                    None => {
                        warn!(
                            "sweep: store returned {} which is not due at {now}, skipping",
                            record.id
                        );
                        None
                    }
                }
            })
            .collect();

        if due.is_empty() {
            return Ok(SweepReport::default());
        }
        info!("sweep: found {} due reminders", due.len());

        let results = join_all(
            due.iter()
                .map(|(record, reminder)| self.process(record, *reminder, now)),
        )
        .await;

        let report = SweepReport {
            processed: due.len(),
            results,
        };
        info!(
            "sweep: {} processed, {} delivered, {} acknowledged, {} failed",
            report.processed,
            report.delivered(),
            report.acknowledged(),
            report.failed()
        );
        Ok(report)
    }

    async fn process(
        &self,
        record: &ApplicationRecord,
        reminder: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> ItemResult {
        let outcome = match self.identity.resolve_recipient(&record.owner_id).await {
            Ok(Some(recipient)) => self.deliver(record, &recipient).await,
            Ok(None) => {
                warn!(
                    "sweep: owner {} of {} has no email, reminder stays due",
                    record.owner_id, record.id
                );
                DeliveryResult::failed(ErrorKind::MissingRecipient, "owner has no email")
            }
            Err(e) => {
                warn!("sweep: recipient lookup for {} failed: {e}", record.id);
                DeliveryResult::failed(ErrorKind::DeliveryFailed, e.to_string())
            }
        };

        let acknowledged = if outcome.success && self.channel.is_authoritative() {
            self.acknowledge(record, reminder).await
        } else {
            false
        };

        let attempt = DeliveryAttempt {
            application_id: record.id.clone(),
            channel: self.channel.name().to_string(),
            reminder,
            success: outcome.success,
            error_kind: outcome.error_kind,
            cause: outcome.cause.clone(),
            acknowledged,
            attempted_at: now,
        };
        if let Err(e) = self.store.record_attempt(&attempt).await {
            error!("sweep: failed to journal attempt for {}: {e}", record.id);
        }

        ItemResult {
            id: record.id.clone(),
            success: outcome.success,
            error_kind: outcome.error_kind,
            acknowledged,
        }
    }

    async fn deliver(&self, record: &ApplicationRecord, recipient: &Recipient) -> DeliveryResult {
        let send = self.channel.send(record, recipient);
        match self.delivery_timeout {
            Some(limit) => tokio::time::timeout(limit, send).await.unwrap_or_else(|_| {
                warn!("sweep: delivery for {} timed out after {limit:?}", record.id);
                DeliveryResult::failed(
                    ErrorKind::DeliveryFailed,
                    format!("delivery timed out after {limit:?}"),
                )
            }),
            None => send.await,
        }
    }

    /// Conditionally mark the reminder sent. Never fails the item.
    async fn acknowledge(&self, record: &ApplicationRecord, reminder: DateTime<Utc>) -> bool {
        match self.store.mark_sent(&record.id, reminder).await {
            Ok(true) => {
                info!("sweep: delivered and acknowledged reminder for {}", record.id);
                true
            }
            Ok(false) => {
                warn!(
                    "sweep: {} was acknowledged elsewhere or its reminder changed; \
                     this delivery may be a duplicate",
                    record.id
                );
                false
            }
            Err(e) => {
                error!(
                    "sweep: delivered {} but acknowledgement failed: {e}; \
                     it will be sent again next sweep",
                    record.id
                );
                false
            }
        }
    }
}
