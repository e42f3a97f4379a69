//! The job registry: validation, identity assignment, and read paths.
//!
//! The registry only ever writes the initial `pending` record; every
//! later transition belongs to the processor.

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use zrep_core::{validation, CoreError, JobStatus, MetricsSink, Tier};
use zrep_db::models::job::{Job, JobFilter};
use zrep_db::Storage;

use crate::error::AppResult;

/// Input for `POST /api/jobs/range`.
///
/// `tier` and `proof_hash` are caller-supplied placeholders: validated
/// when present, stored provisionally, and overwritten by the prover's
/// authoritative values on completion.
#[derive(Debug, Deserialize)]
pub struct CreateJob {
    pub address: String,
    pub viewing_key: String,
    pub tier: Option<String>,
    pub proof_hash: Option<String>,
}

/// Validates job-creation requests, assigns identity, and exposes the
/// read/list operations.
#[derive(Clone)]
pub struct JobRegistry {
    storage: Arc<dyn Storage>,
    metrics: Arc<MetricsSink>,
}

impl JobRegistry {
    pub fn new(storage: Arc<dyn Storage>, metrics: Arc<MetricsSink>) -> Self {
        Self { storage, metrics }
    }

    /// Validate the request, assign a fresh id, and persist the job as
    /// `pending`. Returns the stored record.
    pub async fn create_job(&self, input: CreateJob) -> AppResult<Job> {
        validation::validate_address(&input.address)?;
        validation::validate_viewing_key(&input.viewing_key)?;

        let tier = match input.tier.as_deref() {
            Some(t) => Tier::parse(t)?,
            None => Tier::None,
        };
        let proof_hash = match input.proof_hash {
            Some(hash) => {
                validation::validate_proof_hash(&hash)?;
                hash
            }
            None => String::new(),
        };

        let now = Utc::now();
        let job = Job {
            id: Uuid::now_v7(),
            status: JobStatus::Pending,
            address: input.address.to_lowercase(),
            viewing_key: Some(input.viewing_key),
            tier,
            proof_hash,
            result: None,
            error: None,
            submitted_at: now,
            updated_at: now,
        };

        self.storage.save_job(&job).await?;
        self.metrics.record_job_created(tier);
        tracing::info!(job_id = %job.id, address = %job.address, "Job created");
        Ok(job)
    }

    pub async fn get_job(&self, id: Uuid) -> AppResult<Job> {
        let job = self
            .storage
            .get_job(id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: "job",
                id: id.to_string(),
            })?;
        Ok(job)
    }

    pub async fn list_jobs(&self, filter: &JobFilter) -> AppResult<Vec<Job>> {
        Ok(self.storage.list_jobs(filter).await?)
    }
}
