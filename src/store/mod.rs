//! Keyed hash state store.
//!
//! All durable progress state lives here as small hash records:
//! `job:{id}:{stage}` for stage timing and `job:{id}:{stage}:{n}` for
//! subtask timing. The watcher itself holds no in-memory state, so a
//! restart resumes exactly where the store left off.

mod memory;
mod redis;

pub use memory::MemoryStore;
pub use self::redis::RedisStore;

use async_trait::async_trait;

use crate::errors::StoreError;

/// Hash field holding the RFC 3339 instant a stage or subtask began.
pub const STARTED: &str = "started";
/// Hash field holding the RFC 3339 instant a stage or subtask completed.
pub const FINISHED: &str = "finished";
/// Hash field holding the last reported percent for a stage.
pub const PERCENT: &str = "percent";

/// Field-level access to keyed hash records.
///
/// Missing keys and fields read as `None`; errors mean the store itself is
/// unreachable. Implementations must be safe to share across concurrently
/// running handlers.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn get_field(&self, key: &str, field: &str) -> Result<Option<String>, StoreError>;

    async fn set_field(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError>;

    async fn delete_key(&self, key: &str) -> Result<(), StoreError>;

    /// All keys beginning with `prefix`, in no particular order.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// Key builders for the store layout.
#[derive(Debug, Clone, Copy)]
pub struct Keys;

impl Keys {
    /// Prefix shared by every stage and subtask record.
    pub const JOB_PREFIX: &'static str = "job:";

    pub fn stage(job: &str, stage: &str) -> String {
        format!("job:{job}:{stage}")
    }

    pub fn subtask(job: &str, stage: &str, subtask: u32) -> String {
        format!("job:{job}:{stage}:{subtask}")
    }

    /// Parse a stage key back into `(job, stage)`.
    ///
    /// Subtask keys carry a fourth segment and are rejected, which is how
    /// the sweep distinguishes stage records from their subtasks.
    pub fn parse_stage(key: &str) -> Option<(&str, &str)> {
        let rest = key.strip_prefix(Self::JOB_PREFIX)?;
        let mut parts = rest.split(':');
        let job = parts.next()?;
        let stage = parts.next()?;
        if parts.next().is_some() || job.is_empty() || stage.is_empty() {
            return None;
        }
        Some((job, stage))
    }
}
