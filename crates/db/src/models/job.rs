//! Job entity and DTOs for the range-proof orchestrator.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use zrep_core::{JobStatus, Tier, Timestamp};

/// A tracked unit of asynchronous work.
///
/// `viewing_key` is credential material: it is never serialized into API
/// responses, and both storage backends clear it once the job reaches a
/// terminal state.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    pub status: JobStatus,
    pub address: String,
    #[serde(skip_serializing)]
    pub viewing_key: Option<String>,
    pub tier: Tier,
    pub proof_hash: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub submitted_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Encrypted artifact produced by the prover, present iff the job completed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JobResult {
    /// Opaque reference to the encrypted payload (e.g. `fhe://...`).
    pub encrypted_payload: String,
    /// Ciphertext handle for on-chain submission by the caller.
    pub ciphertext: Ciphertext,
}

/// An encrypted value handle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ciphertext {
    pub data: String,
    pub security_zone: i32,
}

/// Partial update merged into an existing job by `Storage::update_job`.
///
/// Unset fields are left untouched. `clear_viewing_key` drops the stored
/// credential; the processor sets it on every terminal transition.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub tier: Option<Tier>,
    pub proof_hash: Option<String>,
    pub result: Option<JobResult>,
    pub error: Option<String>,
    pub clear_viewing_key: bool,
}

impl JobUpdate {
    /// Terminal update for a successful prover run.
    pub fn completed(tier: Tier, proof_hash: String, result: JobResult) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            tier: Some(tier),
            proof_hash: Some(proof_hash),
            result: Some(result),
            error: None,
            clear_viewing_key: true,
        }
    }

    /// Terminal update for a failed or timed-out prover run.
    pub fn failed(error: String) -> Self {
        Self {
            status: Some(JobStatus::Failed),
            error: Some(error),
            clear_viewing_key: true,
            ..Self::default()
        }
    }
}

/// Filters for `Storage::list_jobs`.
#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    /// Case-insensitive address match.
    pub address: Option<String>,
    pub status: Option<JobStatus>,
    pub limit: Option<i64>,
}
