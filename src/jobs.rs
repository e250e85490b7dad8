//! Job-record collaborator.
//!
//! Job records are owned by the intake service that created them; this
//! watcher reads the creator fields and writes status transitions back.
//! Records live at `jobs:{id}` with fields `status`, `creator`, `card`.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::warn;

use crate::errors::StoreError;
use crate::model::{CreatorKind, JobStatus};

/// The slice of a job record this watcher cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub status: Option<JobStatus>,
    pub creator: CreatorKind,
    /// Tracker card id, present when `creator` is the ticket tracker.
    pub card: Option<String>,
}

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Fetch a job record; `None` when the job is unknown.
    async fn get_job(&self, job: &str) -> Result<Option<JobRecord>, StoreError>;

    /// Persist a status transition. Writes the field even when the rest of
    /// the record has not been seen yet.
    async fn set_status(&self, job: &str, status: JobStatus) -> Result<(), StoreError>;
}

fn job_key(job: &str) -> String {
    format!("jobs:{job}")
}

/// Redis-backed `JobStore` sharing the watcher's connection.
#[derive(Clone)]
pub struct RedisJobStore {
    conn: ConnectionManager,
}

impl RedisJobStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn get_job(&self, job: &str) -> Result<Option<JobRecord>, StoreError> {
        let mut conn = self.conn.clone();
        let key = job_key(job);
        let fields: HashMap<String, String> = conn.hgetall(&key).await?;
        if fields.is_empty() {
            return Ok(None);
        }

        let creator = match fields.get("creator") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(job, creator = %raw, "unrecognized creator kind, treating as other");
                CreatorKind::Other
            }),
            None => CreatorKind::Other,
        };
        let status = fields.get("status").and_then(|raw| raw.parse().ok());

        Ok(Some(JobRecord {
            status,
            creator,
            card: fields.get("card").cloned(),
        }))
    }

    async fn set_status(&self, job: &str, status: JobStatus) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(job_key(job), "status", status.as_str())
            .await?;
        Ok(())
    }
}

/// In-memory `JobStore` for tests.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    records: RwLock<HashMap<String, JobRecord>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a record, as the intake service would have.
    pub fn insert(&self, job: &str, record: JobRecord) {
        self.records
            .write()
            .expect("job store lock poisoned")
            .insert(job.to_string(), record);
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get_job(&self, job: &str) -> Result<Option<JobRecord>, StoreError> {
        let records = self.records.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(records.get(job).cloned())
    }

    async fn set_status(&self, job: &str, status: JobStatus) -> Result<(), StoreError> {
        let mut records = self.records.write().map_err(|_| StoreError::LockPoisoned)?;
        records
            .entry(job.to_string())
            .or_insert(JobRecord {
                status: None,
                creator: CreatorKind::Other,
                card: None,
            })
            .status = Some(status);
        Ok(())
    }
}
