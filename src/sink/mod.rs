//! Notification sink: the external-facing side-effect boundary.
//!
//! Handlers never talk to collaborators directly; they return
//! [`Notification`](crate::model::Notification) values and delivery happens
//! here, after the handler's store writes have landed. Delivery is
//! best-effort: a failed call is logged and the batch continues.

mod http;

pub use http::HttpNotifier;

use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::errors::SinkError;
use crate::model::Notification;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Comment on a tracker card.
    async fn post_comment(&self, card: &str, text: &str) -> Result<(), SinkError>;

    /// Move a tracker card to another list.
    async fn move_card(&self, card: &str, list: &str) -> Result<(), SinkError>;

    /// Announce to the chat channel.
    async fn post_chat(&self, text: &str) -> Result<(), SinkError>;

    /// Ask the media server to rescan its library.
    async fn refresh_library(&self) -> Result<(), SinkError>;
}

/// Deliver a batch of notifications, isolating every failure.
///
/// `notify_tracker = false` drops tracker-bound notifications (comments and
/// card moves) before they reach the sink; chat and refresh hooks are
/// unaffected.
pub async fn deliver(notifier: &dyn Notifier, notifications: &[Notification], notify_tracker: bool) {
    for notification in notifications {
        let result = match notification {
            Notification::Comment { job, text } => {
                if !notify_tracker {
                    debug!(job = %job, "tracker notifications disabled, dropping comment");
                    continue;
                }
                notifier.post_comment(job, text).await
            }
            Notification::CardMove { card, list } => {
                if !notify_tracker {
                    debug!(card = %card, "tracker notifications disabled, dropping card move");
                    continue;
                }
                notifier.move_card(card, list).await
            }
            Notification::Chat { text } => notifier.post_chat(text).await,
            Notification::RefreshLibrary => notifier.refresh_library().await,
        };

        match result {
            Ok(()) => {}
            Err(SinkError::NotConfigured(sink)) => {
                debug!(sink, "sink not configured, skipping notification");
            }
            Err(err) => warn!(%err, "notification delivery failed"),
        }
    }
}

/// One call observed by [`RecordingNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    Comment { card: String, text: String },
    CardMove { card: String, list: String },
    Chat { text: String },
    Refresh,
}

/// Test double that records every sink call in order.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<SinkCall>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().expect("recorder lock poisoned").clone()
    }

    fn record(&self, call: SinkCall) {
        self.calls.lock().expect("recorder lock poisoned").push(call);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn post_comment(&self, card: &str, text: &str) -> Result<(), SinkError> {
        self.record(SinkCall::Comment {
            card: card.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn move_card(&self, card: &str, list: &str) -> Result<(), SinkError> {
        self.record(SinkCall::CardMove {
            card: card.to_string(),
            list: list.to_string(),
        });
        Ok(())
    }

    async fn post_chat(&self, text: &str) -> Result<(), SinkError> {
        self.record(SinkCall::Chat {
            text: text.to_string(),
        });
        Ok(())
    }

    async fn refresh_library(&self) -> Result<(), SinkError> {
        self.record(SinkCall::Refresh);
        Ok(())
    }
}
