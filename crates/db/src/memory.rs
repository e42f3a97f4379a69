//! Volatile in-process storage backend.
//!
//! Point-in-time only; intended for development and tests. Semantics match
//! [`PostgresStorage`](crate::postgres::PostgresStorage) exactly, including
//! the claim atomicity: the write lock is held across the whole
//! check-and-set in [`claim_job`](Storage::claim_job).

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;
use zrep_core::JobStatus;

use crate::models::job::{Job, JobFilter, JobUpdate};
use crate::models::tier::TierRecord;
use crate::storage::{Storage, StorageError, StorageStats, TIER_HISTORY_CAP};

#[derive(Default)]
struct Inner {
    jobs: HashMap<Uuid, Job>,
    /// Keyed by lowercased address; entries are append-ordered.
    tier_history: HashMap<String, Vec<TierRecord>>,
}

/// In-memory storage backend.
#[derive(Default)]
pub struct MemoryStorage {
    inner: RwLock<Inner>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save_job(&self, job: &Job) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        inner.jobs.insert(job.id, job.clone());
        tracing::debug!(job_id = %job.id, status = %job.status, "Saved job");
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner.jobs.get(&id).cloned())
    }

    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, StorageError> {
        let inner = self.inner.read().await;
        let mut jobs: Vec<Job> = inner
            .jobs
            .values()
            .filter(|j| match &filter.address {
                Some(addr) => j.address.eq_ignore_ascii_case(addr),
                None => true,
            })
            .filter(|j| match filter.status {
                Some(status) => j.status == status,
                None => true,
            })
            .cloned()
            .collect();

        jobs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        if let Some(limit) = filter.limit {
            jobs.truncate(limit.max(0) as usize);
        }

        Ok(jobs)
    }

    async fn update_job(&self, id: Uuid, update: JobUpdate) -> Result<Job, StorageError> {
        let mut inner = self.inner.write().await;
        let job = inner.jobs.get_mut(&id).ok_or(StorageError::NotFound {
            entity: "job",
            id: id.to_string(),
        })?;

        if let Some(status) = update.status {
            job.status = status;
        }
        if let Some(tier) = update.tier {
            job.tier = tier;
        }
        if let Some(proof_hash) = update.proof_hash {
            job.proof_hash = proof_hash;
        }
        if let Some(result) = update.result {
            job.result = Some(result);
        }
        if let Some(error) = update.error {
            job.error = Some(error);
        }
        if update.clear_viewing_key {
            job.viewing_key = None;
        }
        job.updated_at = Utc::now();

        tracing::debug!(job_id = %id, status = %job.status, "Updated job");
        Ok(job.clone())
    }

    async fn claim_job(&self, id: Uuid) -> Result<Option<Job>, StorageError> {
        let mut inner = self.inner.write().await;
        let Some(job) = inner.jobs.get_mut(&id) else {
            return Ok(None);
        };
        if job.status != JobStatus::Pending {
            return Ok(None);
        }
        job.status = JobStatus::Processing;
        job.updated_at = Utc::now();
        Ok(Some(job.clone()))
    }

    async fn list_pending(&self, limit: i64) -> Result<Vec<Job>, StorageError> {
        let inner = self.inner.read().await;
        let mut jobs: Vec<Job> = inner
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Pending)
            .cloned()
            .collect();

        jobs.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        jobs.truncate(limit.max(0) as usize);
        Ok(jobs)
    }

    async fn save_tier(&self, record: &TierRecord) -> Result<(), StorageError> {
        let mut inner = self.inner.write().await;
        let history = inner
            .tier_history
            .entry(record.address.to_lowercase())
            .or_default();
        history.push(record.clone());
        if history.len() > TIER_HISTORY_CAP {
            let excess = history.len() - TIER_HISTORY_CAP;
            history.drain(..excess);
        }
        tracing::debug!(address = %record.address, tier = %record.tier, "Saved tier");
        Ok(())
    }

    async fn get_tier(&self, address: &str) -> Result<Option<TierRecord>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .tier_history
            .get(&address.to_lowercase())
            .and_then(|h| h.last())
            .cloned())
    }

    async fn get_tier_history(
        &self,
        address: &str,
        limit: i64,
    ) -> Result<Vec<TierRecord>, StorageError> {
        let inner = self.inner.read().await;
        Ok(inner
            .tier_history
            .get(&address.to_lowercase())
            .map(|h| {
                h.iter()
                    .rev()
                    .take(limit.max(0) as usize)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn cleanup_old_jobs(&self, max_age: chrono::Duration) -> Result<u64, StorageError> {
        let cutoff = Utc::now() - max_age;
        let mut inner = self.inner.write().await;
        let before = inner.jobs.len();
        inner.jobs.retain(|_, job| job.updated_at >= cutoff);
        let deleted = (before - inner.jobs.len()) as u64;
        if deleted > 0 {
            tracing::info!(deleted, "Cleaned up old jobs");
        }
        Ok(deleted)
    }

    async fn get_stats(&self) -> Result<StorageStats, StorageError> {
        let inner = self.inner.read().await;

        let mut jobs_by_status = std::collections::BTreeMap::new();
        for job in inner.jobs.values() {
            *jobs_by_status
                .entry(job.status.as_str().to_string())
                .or_insert(0) += 1;
        }

        // Each address counts once, at the tier of its newest history entry.
        let mut tiers_by_tier = std::collections::BTreeMap::new();
        let mut total_tiers = 0u64;
        for history in inner.tier_history.values() {
            if let Some(latest) = history.last() {
                *tiers_by_tier
                    .entry(latest.tier.as_str().to_string())
                    .or_insert(0) += 1;
                total_tiers += 1;
            }
        }

        Ok(StorageStats {
            total_jobs: inner.jobs.len() as u64,
            jobs_by_status,
            total_tiers,
            tiers_by_tier,
        })
    }
}
