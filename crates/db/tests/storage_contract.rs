//! Contract tests for the storage interface, run against the in-memory
//! backend. The Postgres backend implements the same semantics with the
//! same method set; its conditional-update claim is exercised against a
//! real database in deployment smoke tests.

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::{Duration, Utc};
use uuid::Uuid;
use zrep_core::{JobStatus, Tier};
use zrep_db::models::job::{Ciphertext, Job, JobFilter, JobResult, JobUpdate};
use zrep_db::models::tier::TierRecord;
use zrep_db::{MemoryStorage, Storage, StorageError, TIER_HISTORY_CAP};

const ADDRESS: &str = "0xabcdef0123456789abcdef0123456789abcdef01";

fn make_job(age_secs: i64) -> Job {
    let now = Utc::now() - Duration::seconds(age_secs);
    Job {
        id: Uuid::now_v7(),
        status: JobStatus::Pending,
        address: ADDRESS.to_string(),
        viewing_key: Some("zxviews1test".to_string()),
        tier: Tier::None,
        proof_hash: String::new(),
        result: None,
        error: None,
        submitted_at: now,
        updated_at: now,
    }
}

fn make_tier(address: &str, tier: Tier, age_secs: i64) -> TierRecord {
    TierRecord {
        address: address.to_string(),
        tier,
        score: tier.score(),
        encrypted_total: "0xct".to_string(),
        volume_hint: Some(1_000_000),
        updated_at: Utc::now() - Duration::seconds(age_secs),
    }
}

fn sample_result() -> JobResult {
    JobResult {
        encrypted_payload: "fhe://artifact/1".to_string(),
        ciphertext: Ciphertext {
            data: format!("0x{}", "ab".repeat(32)),
            security_zone: 0,
        },
    }
}

// ---------------------------------------------------------------------------
// Job round trip and upsert
// ---------------------------------------------------------------------------

#[tokio::test]
async fn save_and_get_job_round_trips() {
    let storage = MemoryStorage::new();
    let job = make_job(0);

    storage.save_job(&job).await.unwrap();
    let fetched = storage.get_job(job.id).await.unwrap().unwrap();

    assert_eq!(fetched.id, job.id);
    assert_eq!(fetched.status, JobStatus::Pending);
    assert_eq!(fetched.address, ADDRESS);
    assert_eq!(fetched.viewing_key.as_deref(), Some("zxviews1test"));
}

#[tokio::test]
async fn save_job_is_idempotent_by_id() {
    let storage = MemoryStorage::new();
    let job = make_job(0);

    storage.save_job(&job).await.unwrap();
    storage.save_job(&job).await.unwrap();

    let stats = storage.get_stats().await.unwrap();
    assert_eq!(stats.total_jobs, 1);
}

#[tokio::test]
async fn get_job_returns_none_for_unknown_id() {
    let storage = MemoryStorage::new();
    assert!(storage.get_job(Uuid::now_v7()).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn list_jobs_orders_most_recently_updated_first() {
    let storage = MemoryStorage::new();
    let old = make_job(60);
    let new = make_job(1);
    storage.save_job(&old).await.unwrap();
    storage.save_job(&new).await.unwrap();

    let jobs = storage.list_jobs(&JobFilter::default()).await.unwrap();
    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].id, new.id);
    assert_eq!(jobs[1].id, old.id);
}

#[tokio::test]
async fn list_jobs_filters_by_address_case_insensitively() {
    let storage = MemoryStorage::new();
    let mut other = make_job(0);
    other.address = "0x1111111111111111111111111111111111111111".to_string();
    storage.save_job(&make_job(0)).await.unwrap();
    storage.save_job(&other).await.unwrap();

    let filter = JobFilter {
        address: Some(ADDRESS.to_uppercase().replace("0X", "0x")),
        ..JobFilter::default()
    };
    let jobs = storage.list_jobs(&filter).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].address, ADDRESS);
}

#[tokio::test]
async fn list_jobs_filters_by_status_and_applies_limit() {
    let storage = MemoryStorage::new();
    for age in 0..5 {
        storage.save_job(&make_job(age)).await.unwrap();
    }
    let completed = make_job(10);
    storage.save_job(&completed).await.unwrap();
    storage
        .update_job(
            completed.id,
            JobUpdate::completed(Tier::Gold, format!("0x{}", "cd".repeat(32)), sample_result()),
        )
        .await
        .unwrap();

    let pending = storage
        .list_jobs(&JobFilter {
            status: Some(JobStatus::Pending),
            limit: Some(3),
            ..JobFilter::default()
        })
        .await
        .unwrap();
    assert_eq!(pending.len(), 3);
    assert!(pending.iter().all(|j| j.status == JobStatus::Pending));
}

// ---------------------------------------------------------------------------
// Updates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn update_job_fails_for_unknown_id() {
    let storage = MemoryStorage::new();
    let err = storage
        .update_job(Uuid::now_v7(), JobUpdate::failed("boom".to_string()))
        .await
        .unwrap_err();
    assert_matches!(err, StorageError::NotFound { entity: "job", .. });
}

#[tokio::test]
async fn update_job_merges_fields_and_refreshes_updated_at() {
    let storage = MemoryStorage::new();
    let job = make_job(60);
    storage.save_job(&job).await.unwrap();

    let updated = storage
        .update_job(
            job.id,
            JobUpdate::completed(Tier::Gold, format!("0x{}", "cd".repeat(32)), sample_result()),
        )
        .await
        .unwrap();

    assert_eq!(updated.status, JobStatus::Completed);
    assert_eq!(updated.tier, Tier::Gold);
    assert_eq!(updated.result, Some(sample_result()));
    assert!(updated.error.is_none());
    assert!(updated.updated_at > job.updated_at);
    assert!(updated.updated_at >= updated.submitted_at);
}

#[tokio::test]
async fn terminal_updates_clear_the_viewing_key() {
    let storage = MemoryStorage::new();
    let completed = make_job(0);
    let failed = make_job(0);
    storage.save_job(&completed).await.unwrap();
    storage.save_job(&failed).await.unwrap();

    let done = storage
        .update_job(
            completed.id,
            JobUpdate::completed(Tier::Silver, format!("0x{}", "ef".repeat(32)), sample_result()),
        )
        .await
        .unwrap();
    let broke = storage
        .update_job(failed.id, JobUpdate::failed("prover unavailable".to_string()))
        .await
        .unwrap();

    assert!(done.viewing_key.is_none());
    assert!(broke.viewing_key.is_none());
    assert_eq!(broke.error.as_deref(), Some("prover unavailable"));
    assert!(broke.result.is_none());
}

// ---------------------------------------------------------------------------
// Claims
// ---------------------------------------------------------------------------

#[tokio::test]
async fn claim_job_transitions_pending_to_processing_once() {
    let storage = MemoryStorage::new();
    let job = make_job(0);
    storage.save_job(&job).await.unwrap();

    let claimed = storage.claim_job(job.id).await.unwrap().unwrap();
    assert_eq!(claimed.status, JobStatus::Processing);

    // Second claim must lose: the job is no longer pending.
    assert!(storage.claim_job(job.id).await.unwrap().is_none());
}

#[tokio::test]
async fn claim_job_skips_missing_and_terminal_jobs() {
    let storage = MemoryStorage::new();
    assert!(storage.claim_job(Uuid::now_v7()).await.unwrap().is_none());

    let job = make_job(0);
    storage.save_job(&job).await.unwrap();
    storage
        .update_job(job.id, JobUpdate::failed("x".to_string()))
        .await
        .unwrap();
    assert!(storage.claim_job(job.id).await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_claims_have_exactly_one_winner() {
    let storage = Arc::new(MemoryStorage::new());
    let job = make_job(0);
    storage.save_job(&job).await.unwrap();

    let claims = (0..16).map(|_| {
        let storage = Arc::clone(&storage);
        let id = job.id;
        tokio::spawn(async move { storage.claim_job(id).await.unwrap() })
    });

    let results = futures::future::join_all(claims).await;
    let winners = results
        .into_iter()
        .filter(|r| matches!(r, Ok(Some(_))))
        .count();
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn list_pending_returns_oldest_first_up_to_limit() {
    let storage = MemoryStorage::new();
    let oldest = make_job(30);
    let middle = make_job(20);
    let newest = make_job(10);
    for job in [&newest, &oldest, &middle] {
        storage.save_job(job).await.unwrap();
    }

    let pending = storage.list_pending(2).await.unwrap();
    assert_eq!(pending.len(), 2);
    assert_eq!(pending[0].id, oldest.id);
    assert_eq!(pending[1].id, middle.id);
}

// ---------------------------------------------------------------------------
// Tier history
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_tier_returns_latest_snapshot() {
    let storage = MemoryStorage::new();
    storage
        .save_tier(&make_tier(ADDRESS, Tier::Bronze, 20))
        .await
        .unwrap();
    storage
        .save_tier(&make_tier(ADDRESS, Tier::Gold, 1))
        .await
        .unwrap();

    let latest = storage.get_tier(ADDRESS).await.unwrap().unwrap();
    assert_eq!(latest.tier, Tier::Gold);

    // Lookup is case-insensitive on the address.
    let upper = storage.get_tier(&ADDRESS.to_uppercase()).await.unwrap();
    assert!(upper.is_some());
}

#[tokio::test]
async fn tier_history_is_most_recent_first_and_bounded_by_limit() {
    let storage = MemoryStorage::new();
    for age in (1..=5).rev() {
        let tier = if age > 2 { Tier::Bronze } else { Tier::Silver };
        storage.save_tier(&make_tier(ADDRESS, tier, age)).await.unwrap();
    }

    let history = storage.get_tier_history(ADDRESS, 3).await.unwrap();
    assert_eq!(history.len(), 3);
    assert!(history[0].updated_at >= history[1].updated_at);
    assert!(history[1].updated_at >= history[2].updated_at);
    assert_eq!(history[0].tier, Tier::Silver);
}

#[tokio::test]
async fn tier_history_retains_at_most_the_cap_per_address() {
    let storage = MemoryStorage::new();
    let total = TIER_HISTORY_CAP + 5;
    for i in 0..total {
        storage
            .save_tier(&make_tier(ADDRESS, Tier::Bronze, (total - i) as i64))
            .await
            .unwrap();
    }

    let history = storage
        .get_tier_history(ADDRESS, (total * 2) as i64)
        .await
        .unwrap();
    assert_eq!(history.len(), TIER_HISTORY_CAP);
}

#[tokio::test]
async fn tier_history_for_unknown_address_is_empty() {
    let storage = MemoryStorage::new();
    let history = storage
        .get_tier_history("0x2222222222222222222222222222222222222222", 10)
        .await
        .unwrap();
    assert!(history.is_empty());
    assert!(storage.get_tier(ADDRESS).await.unwrap().is_none());
}

// ---------------------------------------------------------------------------
// Cleanup and stats
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cleanup_with_zero_max_age_removes_all_jobs() {
    let storage = MemoryStorage::new();
    for age in 0..4 {
        storage.save_job(&make_job(age)).await.unwrap();
    }

    let deleted = storage.cleanup_old_jobs(Duration::zero()).await.unwrap();
    assert_eq!(deleted, 4);

    let stats = storage.get_stats().await.unwrap();
    assert_eq!(stats.total_jobs, 0);
}

#[tokio::test]
async fn cleanup_spares_recently_updated_jobs() {
    let storage = MemoryStorage::new();
    storage.save_job(&make_job(3600)).await.unwrap();
    storage.save_job(&make_job(0)).await.unwrap();

    let deleted = storage
        .cleanup_old_jobs(Duration::minutes(10))
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    assert_eq!(storage.get_stats().await.unwrap().total_jobs, 1);
}

#[tokio::test]
async fn stats_count_jobs_by_status_and_addresses_at_latest_tier() {
    let storage = MemoryStorage::new();
    let a = make_job(0);
    let b = make_job(0);
    storage.save_job(&a).await.unwrap();
    storage.save_job(&b).await.unwrap();
    storage
        .update_job(a.id, JobUpdate::failed("x".to_string()))
        .await
        .unwrap();

    // One address moved Bronze -> Gold, another stayed Silver: the
    // distribution reflects only the latest tier of each address.
    let other = "0x3333333333333333333333333333333333333333";
    storage
        .save_tier(&make_tier(ADDRESS, Tier::Bronze, 20))
        .await
        .unwrap();
    storage
        .save_tier(&make_tier(ADDRESS, Tier::Gold, 1))
        .await
        .unwrap();
    storage
        .save_tier(&make_tier(other, Tier::Silver, 5))
        .await
        .unwrap();

    let stats = storage.get_stats().await.unwrap();
    assert_eq!(stats.total_jobs, 2);
    assert_eq!(stats.jobs_by_status.get("pending"), Some(&1));
    assert_eq!(stats.jobs_by_status.get("failed"), Some(&1));
    assert_eq!(stats.total_tiers, 2);
    assert_eq!(stats.tiers_by_tier.get("GOLD"), Some(&1));
    assert_eq!(stats.tiers_by_tier.get("SILVER"), Some(&1));
    assert_eq!(stats.tiers_by_tier.get("BRONZE"), None);
}
