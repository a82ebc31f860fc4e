//! Periodic trigger: run a sweep every poll interval.

use crate::sweep::SweepCoordinator;
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Background task: sweep for due reminders until aborted.
///
/// Sweeps never overlap within one loop; overlap with other triggers (cron,
/// client loads) is tolerated by the coordinator.
pub async fn scheduler_loop(sweeper: SweepCoordinator, interval: Duration) {
    info!("scheduler: sweeping every {interval:?}");
    loop {
        tokio::time::sleep(interval).await;

        match sweeper.run_sweep(Utc::now()).await {
            Ok(report) if report.processed == 0 => debug!("scheduler: nothing due"),
            Ok(report) => info!(
                "scheduler: {} of {} reminders acknowledged",
                report.acknowledged(),
                report.processed
            ),
            Err(e) => error!("scheduler: sweep failed: {e}"),
        }
    }
}
