//! Status transitions, failure reports, and named pipeline events.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::errors::StoreError;
use crate::jobs::JobStore;
use crate::model::{CreatorKind, ErrorEvent, EventEnvelope, JobStatus, Notification, StatusEvent};

/// Suggested fixes for error codes the pipeline is known to emit.
const KNOWN_ERRORS: &[(&str, &str)] = &[("ERRDLSTALL", "Try finding another source.")];

pub struct StatusHandler {
    jobs: Arc<dyn JobStore>,
    /// Destination tracker list per status, from configuration.
    lists: HashMap<JobStatus, String>,
}

impl StatusHandler {
    pub fn new(jobs: Arc<dyn JobStore>, lists: HashMap<JobStatus, String>) -> Self {
        Self { jobs, lists }
    }

    /// Apply a status transition.
    ///
    /// The status write always happens first; everything after it is
    /// advisory. Tracker-created jobs get their card moved to the list
    /// configured for the new status, and the terminal `deployed` status
    /// fires the best-effort post-deploy hooks.
    pub async fn handle_status(
        &self,
        event: &StatusEvent,
    ) -> Result<Vec<Notification>, StoreError> {
        self.jobs.set_status(&event.job, event.status).await?;
        let label = event.status.label();
        info!(job = %event.job, status = label, host = ?event.host, "job status changed");

        let Some(record) = self.jobs.get_job(&event.job).await? else {
            warn!(job = %event.job, "no job record found, skipping notifications");
            return Ok(Vec::new());
        };

        let mut notifications = Vec::new();

        if record.creator == CreatorKind::Trello {
            match (&record.card, self.lists.get(&event.status)) {
                (Some(card), Some(list)) => {
                    notifications.push(Notification::CardMove {
                        card: card.clone(),
                        list: list.clone(),
                    });
                }
                (Some(_), None) => {
                    warn!(job = %event.job, status = label, "no list configured for status, card not moved");
                }
                (None, _) => {
                    warn!(job = %event.job, "tracker job has no card reference, card not moved");
                }
            }
        } else {
            debug!(job = %event.job, "job not tracker-created, skipping card move");
        }

        if event.status == JobStatus::Deployed {
            notifications.push(Notification::Chat {
                text: format!("Job **{}** deployed and available.", event.job),
            });
            notifications.push(Notification::RefreshLibrary);
        }

        Ok(notifications)
    }

    /// Narrate a reported stage failure, with a suggested fix when the
    /// error code is one we recognize.
    pub fn handle_error(&self, event: &ErrorEvent) -> Vec<Notification> {
        warn!(job = %event.job, stage = %event.stage, code = ?event.data.code, "stage failed");

        let mut notifications = vec![Notification::Comment {
            job: event.job.clone(),
            text: format!("{}: Failed: {}", event.stage, event.data.message),
        }];

        if let Some(code) = &event.data.code
            && let Some((_, fix)) = KNOWN_ERRORS.iter().find(|(known, _)| known == code)
        {
            notifications.push(Notification::Comment {
                job: event.job.clone(),
                text: format!("Suggested fix: {fix}"),
            });
        }

        notifications
    }

    /// Handle a named pipeline event. Unknown names are expected from newer
    /// pipeline versions and stay a soft warning.
    pub fn handle_pipeline_event(&self, envelope: &EventEnvelope) -> Vec<Notification> {
        match envelope.event.as_str() {
            "scaleUpPending" => {
                let jobs: Vec<String> = match serde_json::from_value(envelope.cause.clone()) {
                    Ok(jobs) => jobs,
                    Err(err) => {
                        warn!(%err, "malformed scaleUpPending cause, dropping");
                        return Vec::new();
                    }
                };

                jobs.into_iter()
                    .map(|job| {
                        info!(%job, "notifying of pending scale up");
                        Notification::Comment {
                            job,
                            text: "**Scale up pending**".to_string(),
                        }
                    })
                    .collect()
            }
            other => {
                warn!(event = other, "unknown pipeline event, ignoring");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{JobRecord, MemoryJobStore};
    use crate::model::ErrorDetail;
    use serde_json::json;

    fn handler_with(
        lists: &[(JobStatus, &str)],
    ) -> (Arc<MemoryJobStore>, StatusHandler) {
        let jobs = Arc::new(MemoryJobStore::new());
        let lists = lists
            .iter()
            .map(|(status, list)| (*status, list.to_string()))
            .collect();
        let handler = StatusHandler::new(jobs.clone(), lists);
        (jobs, handler)
    }

    fn trello_job(card: &str) -> JobRecord {
        JobRecord {
            status: Some(JobStatus::Queued),
            creator: CreatorKind::Trello,
            card: Some(card.to_string()),
        }
    }

    fn status_event(job: &str, status: JobStatus) -> StatusEvent {
        StatusEvent {
            job: job.to_string(),
            status,
            host: None,
        }
    }

    #[tokio::test]
    async fn test_deployed_moves_card_and_fires_hooks() {
        let (jobs, handler) = handler_with(&[(JobStatus::Deployed, "list-deployed")]);
        jobs.insert("J1", trello_job("card-1"));

        let notes = handler
            .handle_status(&status_event("J1", JobStatus::Deployed))
            .await
            .unwrap();

        assert_eq!(
            notes,
            vec![
                Notification::CardMove {
                    card: "card-1".into(),
                    list: "list-deployed".into()
                },
                Notification::Chat {
                    text: "Job **J1** deployed and available.".into()
                },
                Notification::RefreshLibrary,
            ]
        );
        let record = jobs.get_job("J1").await.unwrap().unwrap();
        assert_eq!(record.status, Some(JobStatus::Deployed));
    }

    #[tokio::test]
    async fn test_non_terminal_status_only_moves_card() {
        let (jobs, handler) = handler_with(&[(JobStatus::Converting, "list-converting")]);
        jobs.insert("J1", trello_job("card-1"));

        let notes = handler
            .handle_status(&status_event("J1", JobStatus::Converting))
            .await
            .unwrap();

        assert_eq!(
            notes,
            vec![Notification::CardMove {
                card: "card-1".into(),
                list: "list-converting".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_unmapped_status_persists_but_skips_move() {
        let (jobs, handler) = handler_with(&[(JobStatus::Deployed, "list-deployed")]);
        jobs.insert("J1", trello_job("card-1"));

        let notes = handler
            .handle_status(&status_event("J1", JobStatus::Uploading))
            .await
            .unwrap();

        assert!(notes.is_empty());
        let record = jobs.get_job("J1").await.unwrap().unwrap();
        assert_eq!(record.status, Some(JobStatus::Uploading));
    }

    #[tokio::test]
    async fn test_non_tracker_job_skips_card_but_still_hooks() {
        let (jobs, handler) = handler_with(&[(JobStatus::Deployed, "list-deployed")]);
        jobs.insert(
            "J1",
            JobRecord {
                status: Some(JobStatus::Uploading),
                creator: CreatorKind::Other,
                card: None,
            },
        );

        let notes = handler
            .handle_status(&status_event("J1", JobStatus::Deployed))
            .await
            .unwrap();

        assert_eq!(
            notes,
            vec![
                Notification::Chat {
                    text: "Job **J1** deployed and available.".into()
                },
                Notification::RefreshLibrary,
            ]
        );
    }

    #[tokio::test]
    async fn test_status_for_unseen_job_persists_and_skips_tracker() {
        let (jobs, handler) = handler_with(&[(JobStatus::Uploading, "list-uploading")]);

        let notes = handler
            .handle_status(&status_event("ghost", JobStatus::Uploading))
            .await
            .unwrap();

        // set_status created a bare record with no creator, so no card move.
        assert!(notes.is_empty());
        let record = jobs.get_job("ghost").await.unwrap().unwrap();
        assert_eq!(record.status, Some(JobStatus::Uploading));
    }

    #[test]
    fn test_error_report_with_known_code_suggests_fix() {
        let (_, handler) = handler_with(&[]);
        let event = ErrorEvent {
            job: "J1".into(),
            stage: "download".into(),
            data: ErrorDetail {
                message: "source stalled".into(),
                code: Some("ERRDLSTALL".into()),
            },
        };

        let notes = handler.handle_error(&event);
        assert_eq!(
            notes,
            vec![
                Notification::Comment {
                    job: "J1".into(),
                    text: "download: Failed: source stalled".into()
                },
                Notification::Comment {
                    job: "J1".into(),
                    text: "Suggested fix: Try finding another source.".into()
                },
            ]
        );
    }

    #[test]
    fn test_error_report_with_unknown_code_has_no_fix() {
        let (_, handler) = handler_with(&[]);
        let event = ErrorEvent {
            job: "J1".into(),
            stage: "convert".into(),
            data: ErrorDetail {
                message: "codec exploded".into(),
                code: Some("ERRWHAT".into()),
            },
        };

        let notes = handler.handle_error(&event);
        assert_eq!(notes.len(), 1);
    }

    #[test]
    fn test_scale_up_pending_notifies_every_job() {
        let (_, handler) = handler_with(&[]);
        let envelope = EventEnvelope {
            event: "scaleUpPending".into(),
            cause: json!(["J1", "J2"]),
        };

        let notes = handler.handle_pipeline_event(&envelope);
        assert_eq!(
            notes,
            vec![
                Notification::Comment {
                    job: "J1".into(),
                    text: "**Scale up pending**".into()
                },
                Notification::Comment {
                    job: "J2".into(),
                    text: "**Scale up pending**".into()
                },
            ]
        );
    }

    #[test]
    fn test_unknown_pipeline_event_is_ignored() {
        let (_, handler) = handler_with(&[]);
        let envelope = EventEnvelope {
            event: "scaleDownPending".into(),
            cause: json!(["J1"]),
        };
        assert!(handler.handle_pipeline_event(&envelope).is_empty());
    }

    #[test]
    fn test_malformed_scale_up_cause_is_dropped() {
        let (_, handler) = handler_with(&[]);
        let envelope = EventEnvelope {
            event: "scaleUpPending".into(),
            cause: json!({"not": "a list"}),
        };
        assert!(handler.handle_pipeline_event(&envelope).is_empty());
    }
}
