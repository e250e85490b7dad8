//! Topic routing for the inbound event channels.
//!
//! The channel -> handler mapping is a closed enumeration resolved up
//! front, so a misconfigured subscription shows up at startup rather than
//! as silently dropped messages. Messages on channels outside the
//! enumeration still arrive (newer pipelines publish more than we know
//! about) and stay a soft warning.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{error, warn};

use crate::errors::{DecodeError, StoreError};
use crate::model::{ErrorEvent, EventEnvelope, ProgressEvent, StatusEvent};
use crate::progress::ProgressTracker;
use crate::sink::{self, Notifier};
use crate::status::StatusHandler;

/// The channels this watcher consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Progress,
    Error,
    Status,
    Events,
}

impl Topic {
    /// Resolve a channel name, accepting the bare form and the
    /// `telemetry.`-prefixed aliases newer pipelines publish on.
    pub fn from_channel(name: &str) -> Option<Self> {
        let name = name.strip_prefix("telemetry.").unwrap_or(name);
        match name {
            "progress" => Some(Self::Progress),
            "error" => Some(Self::Error),
            "status" => Some(Self::Status),
            "events" => Some(Self::Events),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Progress => "progress",
            Self::Error => "error",
            Self::Status => "status",
            Self::Events => "events",
        }
    }

    /// Every channel name to subscribe to.
    pub fn channels() -> [&'static str; 8] {
        [
            "progress",
            "error",
            "status",
            "events",
            "telemetry.progress",
            "telemetry.error",
            "telemetry.status",
            "telemetry.events",
        ]
    }
}

/// How a dispatched message was resolved. Every variant is an
/// acknowledgment; only store failures escape as errors.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    Handled { notifications: usize },
    UnknownTopic,
    Malformed,
}

pub struct Router {
    progress: ProgressTracker,
    status: StatusHandler,
    notifier: Arc<dyn Notifier>,
    notify_tracker: bool,
}

impl Router {
    pub fn new(
        progress: ProgressTracker,
        status: StatusHandler,
        notifier: Arc<dyn Notifier>,
        notify_tracker: bool,
    ) -> Self {
        Self {
            progress,
            status,
            notifier,
            notify_tracker,
        }
    }

    /// Route one raw message: resolve the topic, decode, hand to the
    /// handler, then deliver whatever it derived. Unknown topics and
    /// malformed payloads are acknowledged outcomes; sink failures are
    /// isolated inside delivery; store failures propagate.
    pub async fn dispatch(&self, channel: &str, payload: &str) -> Result<Outcome, StoreError> {
        let Some(topic) = Topic::from_channel(channel) else {
            warn!(channel, "message on unknown channel, ignoring");
            return Ok(Outcome::UnknownTopic);
        };

        let notifications = match topic {
            Topic::Progress => match decode::<ProgressEvent>(topic, payload) {
                Some(event) => self.progress.handle(&event).await?,
                None => return Ok(Outcome::Malformed),
            },
            Topic::Status => match decode::<StatusEvent>(topic, payload) {
                Some(event) => self.status.handle_status(&event).await?,
                None => return Ok(Outcome::Malformed),
            },
            Topic::Error => match decode::<ErrorEvent>(topic, payload) {
                Some(event) => self.status.handle_error(&event),
                None => return Ok(Outcome::Malformed),
            },
            Topic::Events => match decode::<EventEnvelope>(topic, payload) {
                Some(envelope) => self.status.handle_pipeline_event(&envelope),
                None => return Ok(Outcome::Malformed),
            },
        };

        let count = notifications.len();
        sink::deliver(self.notifier.as_ref(), &notifications, self.notify_tracker).await;
        Ok(Outcome::Handled {
            notifications: count,
        })
    }
}

/// Decode a payload for `topic`, logging and dropping on failure. A
/// payload that didn't parse now won't parse on redelivery either.
fn decode<T: DeserializeOwned>(topic: Topic, payload: &str) -> Option<T> {
    match serde_json::from_str(payload) {
        Ok(event) => Some(event),
        Err(source) => {
            let err = DecodeError {
                topic: topic.as_str(),
                source,
            };
            error!(%err, "dropping malformed payload");
            None
        }
    }
}
