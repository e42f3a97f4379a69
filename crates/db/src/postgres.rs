//! Durable PostgreSQL storage backend.
//!
//! Survives restarts and supports concurrent writers; the pending →
//! processing claim is a single conditional `UPDATE`, so the database's
//! row-level atomicity guarantees at most one winner per job id.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::FromRow;
use uuid::Uuid;
use zrep_core::{JobStatus, Tier, Timestamp};

use crate::models::job::{Job, JobFilter, JobResult, JobUpdate};
use crate::models::tier::TierRecord;
use crate::storage::{Storage, StorageError, StorageStats, TIER_HISTORY_CAP};
use crate::DbPool;

/// Column list for `jobs` queries.
const JOB_COLUMNS: &str = "\
    id, status, address, viewing_key, tier, proof_hash, \
    result, error, submitted_at, updated_at";

/// Column list for `tier_history` queries.
const TIER_COLUMNS: &str = "address, tier, score, encrypted_total, volume_hint, updated_at";

/// PostgreSQL storage backend.
pub struct PostgresStorage {
    pool: DbPool,
}

impl PostgresStorage {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `jobs` table. Status/tier are TEXT and the result is
/// JSONB; decoding into domain enums happens in the `TryFrom` conversion.
#[derive(Debug, FromRow)]
struct JobRow {
    id: Uuid,
    status: String,
    address: String,
    viewing_key: Option<String>,
    tier: String,
    proof_hash: String,
    result: Option<serde_json::Value>,
    error: Option<String>,
    submitted_at: Timestamp,
    updated_at: Timestamp,
}

impl TryFrom<JobRow> for Job {
    type Error = StorageError;

    fn try_from(row: JobRow) -> Result<Self, StorageError> {
        let status = JobStatus::parse(&row.status)
            .map_err(|e| StorageError::Backend(format!("corrupt jobs row: {e}")))?;
        let tier = Tier::parse(&row.tier)
            .map_err(|e| StorageError::Backend(format!("corrupt jobs row: {e}")))?;
        let result = row
            .result
            .map(serde_json::from_value::<JobResult>)
            .transpose()
            .map_err(|e| StorageError::Backend(format!("corrupt jobs row: {e}")))?;

        Ok(Job {
            id: row.id,
            status,
            address: row.address,
            viewing_key: row.viewing_key,
            tier,
            proof_hash: row.proof_hash,
            result,
            error: row.error,
            submitted_at: row.submitted_at,
            updated_at: row.updated_at,
        })
    }
}

/// A row from the `tier_history` table.
#[derive(Debug, FromRow)]
struct TierRow {
    address: String,
    tier: String,
    score: i32,
    encrypted_total: String,
    volume_hint: Option<i64>,
    updated_at: Timestamp,
}

impl TryFrom<TierRow> for TierRecord {
    type Error = StorageError;

    fn try_from(row: TierRow) -> Result<Self, StorageError> {
        let tier = Tier::parse(&row.tier)
            .map_err(|e| StorageError::Backend(format!("corrupt tier_history row: {e}")))?;
        Ok(TierRecord {
            address: row.address,
            tier,
            score: row.score,
            encrypted_total: row.encrypted_total,
            volume_hint: row.volume_hint,
            updated_at: row.updated_at,
        })
    }
}

fn encode_result(result: &JobResult) -> Result<serde_json::Value, StorageError> {
    serde_json::to_value(result).map_err(|e| StorageError::Backend(e.to_string()))
}

// ---------------------------------------------------------------------------
// Storage impl
// ---------------------------------------------------------------------------

#[async_trait]
impl Storage for PostgresStorage {
    async fn save_job(&self, job: &Job) -> Result<(), StorageError> {
        let result = job.result.as_ref().map(encode_result).transpose()?;
        let query = format!(
            "INSERT INTO jobs ({JOB_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (id) DO UPDATE SET \
               status = EXCLUDED.status, \
               viewing_key = EXCLUDED.viewing_key, \
               tier = EXCLUDED.tier, \
               proof_hash = EXCLUDED.proof_hash, \
               result = EXCLUDED.result, \
               error = EXCLUDED.error, \
               updated_at = EXCLUDED.updated_at"
        );
        sqlx::query(&query)
            .bind(job.id)
            .bind(job.status.as_str())
            .bind(job.address.to_lowercase())
            .bind(&job.viewing_key)
            .bind(job.tier.as_str())
            .bind(&job.proof_hash)
            .bind(result)
            .bind(&job.error)
            .bind(job.submitted_at)
            .bind(job.updated_at)
            .execute(&self.pool)
            .await?;
        tracing::debug!(job_id = %job.id, status = %job.status, "Saved job");
        Ok(())
    }

    async fn get_job(&self, id: Uuid) -> Result<Option<Job>, StorageError> {
        let query = format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1");
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(Job::try_from).transpose()
    }

    async fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<Job>, StorageError> {
        // Build the WHERE clause and track the next bind parameter index.
        let mut conditions: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 1;

        if filter.address.is_some() {
            conditions.push(format!("address = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.status.is_some() {
            conditions.push(format!("status = ${bind_idx}"));
            bind_idx += 1;
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let limit_clause = if filter.limit.is_some() {
            format!("LIMIT ${bind_idx}")
        } else {
            String::new()
        };

        let query = format!(
            "SELECT {JOB_COLUMNS} FROM jobs \
             {where_clause} \
             ORDER BY updated_at DESC \
             {limit_clause}"
        );

        let mut q = sqlx::query_as::<_, JobRow>(&query);
        if let Some(address) = &filter.address {
            q = q.bind(address.to_lowercase());
        }
        if let Some(status) = filter.status {
            q = q.bind(status.as_str());
        }
        if let Some(limit) = filter.limit {
            q = q.bind(limit);
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(Job::try_from).collect()
    }

    async fn update_job(&self, id: Uuid, update: JobUpdate) -> Result<Job, StorageError> {
        let result = update.result.as_ref().map(encode_result).transpose()?;

        let mut fields: Vec<String> = Vec::new();
        let mut bind_idx: u32 = 2; // $1 is the job id

        if update.status.is_some() {
            fields.push(format!("status = ${bind_idx}"));
            bind_idx += 1;
        }
        if update.tier.is_some() {
            fields.push(format!("tier = ${bind_idx}"));
            bind_idx += 1;
        }
        if update.proof_hash.is_some() {
            fields.push(format!("proof_hash = ${bind_idx}"));
            bind_idx += 1;
        }
        if result.is_some() {
            fields.push(format!("result = ${bind_idx}"));
            bind_idx += 1;
        }
        if update.error.is_some() {
            fields.push(format!("error = ${bind_idx}"));
        }
        if update.clear_viewing_key {
            fields.push("viewing_key = NULL".to_string());
        }
        fields.push("updated_at = NOW()".to_string());

        let query = format!(
            "UPDATE jobs SET {} WHERE id = $1 RETURNING {JOB_COLUMNS}",
            fields.join(", ")
        );

        let mut q = sqlx::query_as::<_, JobRow>(&query).bind(id);
        if let Some(status) = update.status {
            q = q.bind(status.as_str());
        }
        if let Some(tier) = update.tier {
            q = q.bind(tier.as_str());
        }
        if let Some(proof_hash) = update.proof_hash {
            q = q.bind(proof_hash);
        }
        if let Some(result) = result {
            q = q.bind(result);
        }
        if let Some(error) = update.error {
            q = q.bind(error);
        }

        let row = q
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StorageError::NotFound {
                entity: "job",
                id: id.to_string(),
            })?;
        tracing::debug!(job_id = %id, "Updated job");
        Job::try_from(row)
    }

    async fn claim_job(&self, id: Uuid) -> Result<Option<Job>, StorageError> {
        // Conditional update: only one concurrent claimant can observe
        // status = 'pending', so at most one row is ever returned.
        let query = format!(
            "UPDATE jobs SET status = $2, updated_at = NOW() \
             WHERE id = $1 AND status = $3 \
             RETURNING {JOB_COLUMNS}"
        );
        let row = sqlx::query_as::<_, JobRow>(&query)
            .bind(id)
            .bind(JobStatus::Processing.as_str())
            .bind(JobStatus::Pending.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(Job::try_from).transpose()
    }

    async fn list_pending(&self, limit: i64) -> Result<Vec<Job>, StorageError> {
        let query = format!(
            "SELECT {JOB_COLUMNS} FROM jobs \
             WHERE status = $1 \
             ORDER BY submitted_at ASC \
             LIMIT $2"
        );
        let rows = sqlx::query_as::<_, JobRow>(&query)
            .bind(JobStatus::Pending.as_str())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Job::try_from).collect()
    }

    async fn save_tier(&self, record: &TierRecord) -> Result<(), StorageError> {
        let address = record.address.to_lowercase();
        let query = format!(
            "INSERT INTO tier_history ({TIER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
        );
        sqlx::query(&query)
            .bind(&address)
            .bind(record.tier.as_str())
            .bind(record.score)
            .bind(&record.encrypted_total)
            .bind(record.volume_hint)
            .bind(record.updated_at)
            .execute(&self.pool)
            .await?;

        // Cap the per-address history; oldest entries beyond the cap go.
        sqlx::query(
            "DELETE FROM tier_history WHERE id IN ( \
                 SELECT id FROM tier_history WHERE address = $1 \
                 ORDER BY updated_at DESC, id DESC OFFSET $2 \
             )",
        )
        .bind(&address)
        .bind(TIER_HISTORY_CAP as i64)
        .execute(&self.pool)
        .await?;

        tracing::debug!(address = %record.address, tier = %record.tier, "Saved tier");
        Ok(())
    }

    async fn get_tier(&self, address: &str) -> Result<Option<TierRecord>, StorageError> {
        let query = format!(
            "SELECT {TIER_COLUMNS} FROM tier_history \
             WHERE address = $1 \
             ORDER BY updated_at DESC, id DESC \
             LIMIT 1"
        );
        let row = sqlx::query_as::<_, TierRow>(&query)
            .bind(address.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        row.map(TierRecord::try_from).transpose()
    }

    async fn get_tier_history(
        &self,
        address: &str,
        limit: i64,
    ) -> Result<Vec<TierRecord>, StorageError> {
        let query = format!(
            "SELECT {TIER_COLUMNS} FROM tier_history \
             WHERE address = $1 \
             ORDER BY updated_at DESC, id DESC \
             LIMIT $2"
        );
        let rows = sqlx::query_as::<_, TierRow>(&query)
            .bind(address.to_lowercase())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TierRecord::try_from).collect()
    }

    async fn cleanup_old_jobs(&self, max_age: chrono::Duration) -> Result<u64, StorageError> {
        let cutoff = Utc::now() - max_age;
        let result = sqlx::query("DELETE FROM jobs WHERE updated_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        let deleted = result.rows_affected();
        if deleted > 0 {
            tracing::info!(deleted, "Cleaned up old jobs");
        }
        Ok(deleted)
    }

    async fn get_stats(&self) -> Result<StorageStats, StorageError> {
        let job_rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM jobs GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        // Each address counts once, at the tier of its newest history entry.
        let tier_rows: Vec<(String, i64)> = sqlx::query_as(
            "SELECT tier, COUNT(*) FROM ( \
                 SELECT DISTINCT ON (address) address, tier FROM tier_history \
                 ORDER BY address, updated_at DESC, id DESC \
             ) latest GROUP BY tier",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut jobs_by_status = std::collections::BTreeMap::new();
        let mut total_jobs = 0u64;
        for (status, count) in job_rows {
            jobs_by_status.insert(status, count as u64);
            total_jobs += count as u64;
        }

        let mut tiers_by_tier = std::collections::BTreeMap::new();
        let mut total_tiers = 0u64;
        for (tier, count) in tier_rows {
            tiers_by_tier.insert(tier, count as u64);
            total_tiers += count as u64;
        }

        Ok(StorageStats {
            total_jobs,
            jobs_by_status,
            total_tiers,
            tiers_by_tier,
        })
    }
}
