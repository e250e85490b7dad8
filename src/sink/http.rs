//! HTTP implementations of the notification sink.
//!
//! Three collaborators, all optional: the Trello REST API for comments and
//! card moves, a chat webhook for announcements, and an Emby-compatible
//! media server for library refreshes. Unconfigured collaborators answer
//! `SinkError::NotConfigured`, which delivery treats as a quiet skip.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, info};

use super::Notifier;
use crate::config::{MediaServerConfig, TrelloConfig};
use crate::errors::SinkError;

const TRELLO_API_URL: &str = "https://api.trello.com/1";

pub struct HttpNotifier {
    client: reqwest::Client,
    trello: Option<TrelloConfig>,
    chat_webhook: Option<String>,
    media_server: Option<MediaServerConfig>,
}

impl HttpNotifier {
    pub fn new(
        trello: Option<TrelloConfig>,
        chat_webhook: Option<String>,
        media_server: Option<MediaServerConfig>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            trello,
            chat_webhook,
            media_server,
        }
    }

    fn trello(&self) -> Result<&TrelloConfig, SinkError> {
        self.trello.as_ref().ok_or(SinkError::NotConfigured("trello"))
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn post_comment(&self, card: &str, text: &str) -> Result<(), SinkError> {
        let auth = self.trello()?;
        info!(card, "posting tracker comment");

        self.client
            .post(format!("{TRELLO_API_URL}/cards/{card}/actions/comments"))
            .query(&[
                ("key", auth.key.as_str()),
                ("token", auth.token.as_str()),
                ("text", text),
            ])
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn move_card(&self, card: &str, list: &str) -> Result<(), SinkError> {
        let auth = self.trello()?;
        info!(card, list, "moving tracker card");

        self.client
            .put(format!("{TRELLO_API_URL}/cards/{card}/idList"))
            .query(&[
                ("key", auth.key.as_str()),
                ("token", auth.token.as_str()),
                ("value", list),
            ])
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn post_chat(&self, text: &str) -> Result<(), SinkError> {
        let webhook = self
            .chat_webhook
            .as_ref()
            .ok_or(SinkError::NotConfigured("chat"))?;
        debug!("posting chat announcement");

        self.client
            .post(webhook)
            .json(&json!({ "text": text }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn refresh_library(&self) -> Result<(), SinkError> {
        let media = self
            .media_server
            .as_ref()
            .ok_or(SinkError::NotConfigured("media server"))?;
        info!(url = %media.url, "requesting media library refresh");

        self.client
            .post(format!("{}/Library/Refresh", media.url.trim_end_matches('/')))
            .header("X-Emby-Token", &media.token)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SinkError;

    #[tokio::test]
    async fn test_unconfigured_sinks_report_not_configured() {
        let notifier = HttpNotifier::new(None, None, None);

        assert!(matches!(
            notifier.post_comment("card", "text").await,
            Err(SinkError::NotConfigured("trello"))
        ));
        assert!(matches!(
            notifier.move_card("card", "list").await,
            Err(SinkError::NotConfigured("trello"))
        ));
        assert!(matches!(
            notifier.post_chat("text").await,
            Err(SinkError::NotConfigured("chat"))
        ));
        assert!(matches!(
            notifier.refresh_library().await,
            Err(SinkError::NotConfigured("media server"))
        ));
    }
}
