//! Wire-facing event types and the shared job vocabulary.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A progress report for one stage of a job.
///
/// The upstream pipeline nests subtask counters under a `data` envelope;
/// events without it decode to `subtask == subtask_count == 0`, the
/// no-subtask case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub job: String,
    pub stage: String,
    pub percent: u8,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub data: SubtaskInfo,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SubtaskInfo {
    #[serde(rename = "subTask", default)]
    pub subtask: u32,
    #[serde(rename = "subTasks", default)]
    pub subtask_count: u32,
}

/// A terminal/stage-change status report for a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub job: String,
    pub status: JobStatus,
    #[serde(default)]
    pub host: Option<String>,
}

/// A failure report from the `error` channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub job: String,
    pub stage: String,
    pub data: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// A named pipeline event from the `events` channel.
///
/// The `cause` shape depends on the event name and is decoded by the
/// handler that recognizes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event: String,
    #[serde(default)]
    pub cause: serde_json::Value,
}

/// Job statuses reported by the pipeline.
///
/// `Deployed` is terminal and fires the post-deploy hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Downloading,
    Converting,
    Uploading,
    Deployed,
    Errored,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Downloading => "downloading",
            Self::Converting => "converting",
            Self::Uploading => "uploading",
            Self::Deployed => "deployed",
            Self::Errored => "errored",
        }
    }

    /// Human label for narrative text and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Queued => "Queued",
            Self::Downloading => "Downloading",
            Self::Converting => "Converting",
            Self::Uploading => "Uploading",
            Self::Deployed => "Deployed",
            Self::Errored => "Errored",
        }
    }

    pub fn all() -> &'static [JobStatus] {
        &[
            Self::Queued,
            Self::Downloading,
            Self::Converting,
            Self::Uploading,
            Self::Deployed,
            Self::Errored,
        ]
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(Self::Queued),
            "downloading" => Ok(Self::Downloading),
            "converting" => Ok(Self::Converting),
            "uploading" => Ok(Self::Uploading),
            "deployed" => Ok(Self::Deployed),
            "errored" => Ok(Self::Errored),
            _ => Err(format!("Invalid job status: {}", s)),
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The external system that owns a job's human-facing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreatorKind {
    Trello,
    Other,
}

impl CreatorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trello => "trello",
            Self::Other => "other",
        }
    }
}

impl FromStr for CreatorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trello" => Ok(Self::Trello),
            "other" => Ok(Self::Other),
            _ => Err(format!("Invalid creator kind: {}", s)),
        }
    }
}

/// A side effect derived by a handler, delivered through the notification
/// sink after the handler's store writes have completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Narrative comment on the job's tracker card.
    Comment { job: String, text: String },
    /// Move the tracker card to a status list.
    CardMove { card: String, list: String },
    /// Chat-channel announcement.
    Chat { text: String },
    /// Ask the media server to rescan its library.
    RefreshLibrary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_event_decodes_nested_subtask_envelope() {
        let raw = r#"{"job":"abc123","stage":"convert","percent":100,"host":"worker-2","data":{"subTask":3,"subTasks":7}}"#;
        let event: ProgressEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.job, "abc123");
        assert_eq!(event.percent, 100);
        assert_eq!(event.data.subtask, 3);
        assert_eq!(event.data.subtask_count, 7);
    }

    #[test]
    fn progress_event_without_envelope_defaults_to_no_subtasks() {
        let raw = r#"{"job":"abc123","stage":"download","percent":0}"#;
        let event: ProgressEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.data.subtask, 0);
        assert_eq!(event.data.subtask_count, 0);
        assert!(event.host.is_none());
    }

    #[test]
    fn status_event_decodes_status_code() {
        let raw = r#"{"job":"abc123","status":"deployed"}"#;
        let event: StatusEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.status, JobStatus::Deployed);
    }

    #[test]
    fn status_event_rejects_unknown_code() {
        let raw = r#"{"job":"abc123","status":"exploded"}"#;
        assert!(serde_json::from_str::<StatusEvent>(raw).is_err());
    }

    #[test]
    fn job_status_round_trips_through_str() {
        for status in JobStatus::all() {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), *status);
        }
    }

    #[test]
    fn error_event_code_is_optional() {
        let raw = r#"{"job":"abc123","stage":"download","data":{"message":"source stalled"}}"#;
        let event: ErrorEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.data.message, "source stalled");
        assert!(event.data.code.is_none());
    }

    #[test]
    fn event_envelope_cause_defaults_to_null() {
        let raw = r#"{"event":"scaleUpPending"}"#;
        let envelope: EventEnvelope = serde_json::from_str(raw).unwrap();
        assert!(envelope.cause.is_null());
    }
}
