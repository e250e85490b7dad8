//! Periodic ETA sweep over long-running download stages.
//!
//! Downloads report percent continuously but can run for hours, so instead
//! of narrating every event the watcher wakes up on an interval, estimates
//! time-to-completion from the stored percent and start time, and posts one
//! progress comment per active download. Records parked at exactly 0% or
//! 100% are stale or complete and get purged.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::errors::StoreError;
use crate::model::Notification;
use crate::sink::{self, Notifier};
use crate::store::{Keys, PERCENT, STARTED, StateStore};
use crate::util;

pub struct DownloadSweep {
    store: Arc<dyn StateStore>,
    /// Stage class to watch; everything else is left alone.
    stage: String,
}

impl DownloadSweep {
    pub fn new(store: Arc<dyn StateStore>, stage: String) -> Self {
        Self { store, stage }
    }

    pub async fn sweep(&self) -> Result<Vec<Notification>, StoreError> {
        self.sweep_at(Utc::now()).await
    }

    /// One pass over every watched stage record, as of `now`.
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> Result<Vec<Notification>, StoreError> {
        let keys = self.store.keys_with_prefix(Keys::JOB_PREFIX).await?;
        let mut notifications = Vec::new();

        for key in keys {
            // Subtask records and foreign keys parse out here.
            let Some((job, stage)) = Keys::parse_stage(&key) else {
                continue;
            };
            if stage != self.stage {
                continue;
            }

            let percent = match self.store.get_field(&key, PERCENT).await? {
                Some(raw) => match raw.parse::<i64>() {
                    Ok(percent) => percent,
                    Err(_) => {
                        warn!(%key, percent = %raw, "unreadable percent field, skipping");
                        continue;
                    }
                },
                None => continue,
            };

            if percent == 0 || percent == 100 {
                info!(%key, percent, "clearing stale download record");
                self.store.delete_key(&key).await?;
                continue;
            }

            let started = self
                .store
                .get_field(&key, STARTED)
                .await?
                .as_deref()
                .and_then(util::parse_timestamp);
            let Some(started_at) = started else {
                warn!(%key, "active download has no start timestamp, skipping");
                continue;
            };

            // Minutes spent per percent, extrapolated over what's left.
            let elapsed = util::minutes_between(started_at, now);
            let eta = ((elapsed / percent as f64) * (100 - percent) as f64).floor() as i64;

            notifications.push(Notification::Comment {
                job: job.to_string(),
                text: format!(
                    "{}: progress **{}%** (eta: {})",
                    stage,
                    percent,
                    util::humanize_minutes(eta)
                ),
            });
        }

        Ok(notifications)
    }
}

/// Run the sweep forever on `every`, delivering its notifications.
///
/// The first tick fires immediately, and missed ticks are skipped so a slow
/// pass never stacks behind itself. Store failures are logged and retried
/// on the next tick; the connection manager reconnects underneath.
pub fn spawn_sweeper(
    sweep: DownloadSweep,
    notifier: Arc<dyn Notifier>,
    notify_tracker: bool,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match sweep.sweep().await {
                Ok(notifications) => {
                    sink::deliver(notifier.as_ref(), &notifications, notify_tracker).await;
                }
                Err(err) => error!(%err, "download sweep failed"),
            }
        }
    })
}
