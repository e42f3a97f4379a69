//! The storage contract shared by the volatile and durable backends.
//!
//! All job and tier state lives behind [`Storage`]; the registry and the
//! processor hold only an `Arc<dyn Storage>` and never cache entities.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::models::job::{Job, JobFilter, JobUpdate};
use crate::models::tier::TierRecord;

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::NotFound {
                entity: "row",
                id: String::new(),
            },
            other => StorageError::Backend(other.to_string()),
        }
    }
}

/// Aggregate counts for the stats surface.
#[derive(Debug, Clone, Serialize)]
pub struct StorageStats {
    pub total_jobs: u64,
    pub jobs_by_status: BTreeMap<String, u64>,
    pub total_tiers: u64,
    /// Distinct addresses counted at their latest tier.
    pub tiers_by_tier: BTreeMap<String, u64>,
}

/// Persistence contract for jobs and tier history.
///
/// Both backends implement identical semantics; the durable backend
/// additionally survives restarts and supports concurrent writers through
/// the database's row-level atomicity.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Insert a job, or idempotently upsert it by id.
    async fn save_job(&self, job: &Job) -> Result<(), StorageError>;

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StorageError>;

    /// List jobs matching `filter`, most-recently-updated first.
    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, StorageError>;

    /// Merge `update` into the job and refresh `updated_at`.
    ///
    /// Returns [`StorageError::NotFound`] if the id is absent.
    async fn update_job(&self, id: Uuid, update: JobUpdate) -> Result<Job, StorageError>;

    /// Atomically transition a job from `pending` to `processing`.
    ///
    /// Returns the claimed job, or `None` when the job is missing, already
    /// claimed, or terminal. At most one concurrent claimant wins for a
    /// given id; this is what prevents double dispatch to the prover.
    async fn claim_job(&self, id: Uuid) -> Result<Option<Job>, StorageError>;

    /// List up to `limit` pending jobs, oldest first.
    async fn list_pending(&self, limit: i64) -> Result<Vec<Job>, StorageError>;

    /// Append a tier snapshot to the address's history, retaining at most
    /// the most recent [`TIER_HISTORY_CAP`] entries per address.
    async fn save_tier(&self, record: &TierRecord) -> Result<(), StorageError>;

    /// Latest tier snapshot for the address.
    async fn get_tier(&self, address: &str) -> Result<Option<TierRecord>, StorageError>;

    /// Up to `limit` tier snapshots for the address, most recent first.
    async fn get_tier_history(
        &self,
        address: &str,
        limit: i64,
    ) -> Result<Vec<TierRecord>, StorageError>;

    /// Delete jobs whose `updated_at` precedes `now - max_age`.
    /// Returns the number of jobs removed.
    async fn cleanup_old_jobs(&self, max_age: chrono::Duration) -> Result<u64, StorageError>;

    async fn get_stats(&self) -> Result<StorageStats, StorageError>;
}

/// Maximum retained tier-history entries per address.
pub const TIER_HISTORY_CAP: usize = 100;
