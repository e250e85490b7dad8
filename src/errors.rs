//! Typed error hierarchy for the Beholder watcher.
//!
//! Three top-level types cover the three failure surfaces:
//! - `StoreError` — state/job store connectivity failures (the only fatal path)
//! - `SinkError` — notification delivery failures (logged, never fatal)
//! - `DecodeError` — malformed inbound payloads (logged, dropped, never retried)

use thiserror::Error;

/// Errors from the shared state store and the job-record store.
///
/// These indicate the store itself is unhealthy and propagate up to the
/// receive loop; a missing key or field is `Ok(None)`, not an error.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to connect to redis: {0}")]
    Connect(#[source] redis::RedisError),

    #[error("redis command failed: {0}")]
    Command(#[from] redis::RedisError),

    #[error("store lock poisoned")]
    LockPoisoned,
}

/// Errors from notification delivery.
///
/// Callers log these at the delivery site and move on; a failed comment or
/// card move never blocks acknowledgment of the triggering event.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),
}

/// A payload that could not be decoded into its topic's event type.
///
/// Payloads are not expected to become parseable on redelivery, so the
/// message is acknowledged and dropped.
#[derive(Debug, Error)]
#[error("malformed payload on '{topic}': {source}")]
pub struct DecodeError {
    pub topic: &'static str,
    #[source]
    pub source: serde_json::Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_lock_poisoned_is_matchable() {
        let err = StoreError::LockPoisoned;
        assert!(matches!(err, StoreError::LockPoisoned));
    }

    #[test]
    fn sink_error_not_configured_names_the_sink() {
        let err = SinkError::NotConfigured("trello");
        assert!(err.to_string().contains("trello"));
    }

    #[test]
    fn decode_error_carries_topic_and_source() {
        let source = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err();
        let err = DecodeError {
            topic: "progress",
            source,
        };
        assert!(err.to_string().contains("progress"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&StoreError::LockPoisoned);
        assert_std_error(&SinkError::NotConfigured("chat"));
    }
}
