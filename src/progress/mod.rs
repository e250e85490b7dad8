//! Progress aggregation state machine.
//!
//! One progress event at a time comes in; durable timing state goes into
//! the store and zero or more narrative notifications come out. Events may
//! arrive out of order or more than once: every transition is decided by
//! comparing the event's `(percent, subtask, subtask_count)` tuple against
//! stored state, never by assumed sequence, so redelivery just re-stamps a
//! timestamp and emits the same narrative again.

pub mod sweep;

pub use sweep::DownloadSweep;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::errors::StoreError;
use crate::model::{Notification, ProgressEvent};
use crate::store::{FINISHED, Keys, PERCENT, STARTED, StateStore};
use crate::util;

/// Stages that carry no progress semantics on this channel: `queue` events
/// are noise and `error` is handled by its own channel.
const IGNORED_STAGES: &[&str] = &["queue", "error"];

/// Ordered classification of a progress event.
///
/// The order matters: a stage with no subtasks reports `0 == 0`, so the
/// stage cases must win before the subtask cases are considered. That
/// tie-break is what lets one machine serve both simple stages and stages
/// with subtasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressCase {
    /// First event of a stage: stamp `started`, announce the stage.
    StageStart,
    /// Last event of a stage: stamp `finished`, report the elapsed time.
    StageFinish,
    /// A subtask began: stamp its `started`, silently.
    SubtaskStart,
    /// A subtask completed: stamp its `finished`, report it, and after the
    /// first one project a completion estimate.
    SubtaskFinish,
    /// Intermediate percents and unmatched combinations: only the
    /// unconditional percent write happens.
    NoOp,
}

impl ProgressCase {
    pub fn classify(percent: u8, subtask: u32, subtask_count: u32) -> Self {
        if percent == 0 && subtask == subtask_count {
            Self::StageStart
        } else if percent == 100 && subtask == subtask_count {
            Self::StageFinish
        } else if percent == 0 && subtask_count > 0 {
            Self::SubtaskStart
        } else if percent == 100 && subtask > 0 {
            Self::SubtaskFinish
        } else {
            Self::NoOp
        }
    }
}

/// The progress half of the watcher: applies one event against the store.
pub struct ProgressTracker {
    store: Arc<dyn StateStore>,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, event: &ProgressEvent) -> Result<Vec<Notification>, StoreError> {
        self.handle_at(event, Utc::now()).await
    }

    /// Apply `event` as of `now`. Split out so tests control the clock.
    pub async fn handle_at(
        &self,
        event: &ProgressEvent,
        now: DateTime<Utc>,
    ) -> Result<Vec<Notification>, StoreError> {
        if IGNORED_STAGES.contains(&event.stage.as_str()) {
            debug!(job = %event.job, stage = %event.stage, "ignoring non-progress stage");
            return Ok(Vec::new());
        }

        let subtask = event.data.subtask;
        let subtask_count = event.data.subtask_count;
        let key = Keys::stage(&event.job, &event.stage);
        let mut notifications = Vec::new();

        match ProgressCase::classify(event.percent, subtask, subtask_count) {
            ProgressCase::StageStart => {
                self.store.set_field(&key, STARTED, &now.to_rfc3339()).await?;
                info!(job = %event.job, stage = %event.stage, host = ?event.host, "stage started");

                let text = match &event.host {
                    Some(host) => format!("Started stage **{}** on _{}_", event.stage, host),
                    None => format!("Started stage **{}**", event.stage),
                };
                notifications.push(Notification::Comment {
                    job: event.job.clone(),
                    text,
                });
            }
            ProgressCase::StageFinish => {
                let started = self.store.get_field(&key, STARTED).await?;
                self.store.set_field(&key, FINISHED, &now.to_rfc3339()).await?;

                match started.as_deref().and_then(util::parse_timestamp) {
                    Some(started_at) => {
                        let minutes = util::minutes_between(started_at, now);
                        info!(job = %event.job, stage = %event.stage, minutes, "stage finished");
                        notifications.push(Notification::Comment {
                            job: event.job.clone(),
                            text: format!(
                                "Finished stage '{}' in **{} minutes**.",
                                event.stage,
                                util::format_minutes(minutes)
                            ),
                        });
                    }
                    None => {
                        warn!(job = %event.job, stage = %event.stage, "stage finished with no recorded start");
                    }
                }
            }
            ProgressCase::SubtaskStart => {
                let sub_key = Keys::subtask(&event.job, &event.stage, subtask);
                self.store
                    .set_field(&sub_key, STARTED, &now.to_rfc3339())
                    .await?;
                debug!(job = %event.job, stage = %event.stage, subtask, "sub-task started");
            }
            ProgressCase::SubtaskFinish => {
                let sub_key = Keys::subtask(&event.job, &event.stage, subtask);
                let started = self.store.get_field(&sub_key, STARTED).await?;
                self.store
                    .set_field(&sub_key, FINISHED, &now.to_rfc3339())
                    .await?;

                match started.as_deref().and_then(util::parse_timestamp) {
                    Some(started_at) => {
                        let minutes = util::minutes_between(started_at, now);
                        info!(job = %event.job, stage = %event.stage, subtask, minutes, "sub-task finished");
                        notifications.push(Notification::Comment {
                            job: event.job.clone(),
                            text: format!(
                                "{}: Finished sub-task **{}** out of **{}** in **{} minutes**",
                                event.stage,
                                subtask,
                                subtask_count,
                                util::format_minutes(minutes)
                            ),
                        });

                        // The first subtask's duration is as good an estimate
                        // as we get this early; linear extrapolation is allowed
                        // to be wrong.
                        if subtask == 1 {
                            notifications.push(Notification::Comment {
                                job: event.job.clone(),
                                text: format!(
                                    "{}: Estimating completion in **{} minutes**",
                                    event.stage,
                                    util::format_minutes(minutes * subtask_count as f64)
                                ),
                            });
                        }
                    }
                    None => {
                        warn!(job = %event.job, stage = %event.stage, subtask, "sub-task finished with no recorded start");
                    }
                }
            }
            ProgressCase::NoOp => {}
        }

        // The one unconditional side effect: keep the last-known percent
        // current for the download sweep.
        self.store
            .set_field(&key, PERCENT, &event.percent.to_string())
            .await?;

        Ok(notifications)
    }
}
