//! Scenario tests for the job processor, driven one tick at a time
//! against the in-memory backend and stub provers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;
use zrep_core::{JobStatus, MetricsSink, Tier};
use zrep_db::models::job::{Ciphertext, Job};
use zrep_db::models::tier::TierRecord;
use zrep_db::{MemoryStorage, Storage};
use zrep_events::{EventKind, SubscribeRequest, WebhookDispatcher};
use zrep_processor::{JobProcessor, ProcessorConfig, Prover, ProverArtifact, ProverError};

const ADDRESS: &str = "0xabcdef0123456789abcdef0123456789abcdef01";

fn gold_artifact() -> ProverArtifact {
    ProverArtifact {
        tier: Tier::Gold,
        proof_hash: format!("0x{}", "de".repeat(32)),
        encrypted_payload: "fhe://artifact/1".to_string(),
        ciphertext: Ciphertext {
            data: format!("0x{}", "ab".repeat(32)),
            security_zone: 0,
        },
        notes_scanned: 4200,
    }
}

/// Succeeds immediately with a fixed artifact.
struct MockProver {
    artifact: ProverArtifact,
}

#[async_trait]
impl Prover for MockProver {
    async fn prove(&self, _address: &str, _viewing_key: &str) -> Result<ProverArtifact, ProverError> {
        Ok(self.artifact.clone())
    }
}

/// Never answers within any reasonable timeout.
struct SlowProver;

#[async_trait]
impl Prover for SlowProver {
    async fn prove(&self, _address: &str, _viewing_key: &str) -> Result<ProverArtifact, ProverError> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok(gold_artifact())
    }
}

/// Always reports failure.
struct FailingProver;

#[async_trait]
impl Prover for FailingProver {
    async fn prove(&self, _address: &str, _viewing_key: &str) -> Result<ProverArtifact, ProverError> {
        Err(ProverError::Unsuccessful("note scan aborted".to_string()))
    }
}

fn pending_job() -> Job {
    let now = Utc::now();
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

fn processor(
    storage: Arc<dyn Storage>,
    prover: Arc<dyn Prover>,
    dispatcher: WebhookDispatcher,
    metrics: Arc<MetricsSink>,
) -> JobProcessor {
    JobProcessor::new(
        storage,
        prover,
        dispatcher,
        metrics,
        ProcessorConfig {
            poll_interval: Duration::from_millis(10),
            batch_size: 10,
            prover_timeout: Duration::from_millis(100),
        },
    )
}

fn harness(prover: Arc<dyn Prover>) -> (Arc<MemoryStorage>, Arc<MetricsSink>, JobProcessor) {
    let storage = Arc::new(MemoryStorage::new());
    let metrics = Arc::new(MetricsSink::new());
    let dispatcher = WebhookDispatcher::new(8, Arc::clone(&metrics));
    let processor = processor(
        Arc::clone(&storage) as Arc<dyn Storage>,
        prover,
        dispatcher,
        Arc::clone(&metrics),
    );
    (storage, metrics, processor)
}

// ---------------------------------------------------------------------------
// Success path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn one_tick_drives_a_pending_job_to_completed() {
    let (storage, metrics, processor) = harness(Arc::new(MockProver {
        artifact: gold_artifact(),
    }));
    let job = pending_job();
    storage.save_job(&job).await.unwrap();

    processor.tick().await.unwrap();

    let done = storage.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert_eq!(done.tier, Tier::Gold);
    assert_eq!(done.proof_hash, format!("0x{}", "de".repeat(32)));
    assert!(done.result.is_some());
    assert!(done.error.is_none());
    // The credential is dropped the moment the job turns terminal.
    assert!(done.viewing_key.is_none());

    assert_eq!(metrics.snapshot().jobs_completed["GOLD"], 1);
}

#[tokio::test]
async fn completion_appends_a_tier_snapshot() {
    let (storage, _metrics, processor) = harness(Arc::new(MockProver {
        artifact: gold_artifact(),
    }));
    storage.save_job(&pending_job()).await.unwrap();

    processor.tick().await.unwrap();

    let record = storage.get_tier(ADDRESS).await.unwrap().unwrap();
    assert_eq!(record.tier, Tier::Gold);
    assert_eq!(record.score, 500);
    assert_eq!(record.volume_hint, Some(4200));
    assert_eq!(record.encrypted_total, format!("0x{}", "ab".repeat(32)));
}

// ---------------------------------------------------------------------------
// Failure paths
// ---------------------------------------------------------------------------

#[tokio::test]
async fn prover_timeout_fails_the_job_with_an_error() {
    let (storage, metrics, processor) = harness(Arc::new(SlowProver));
    let job = pending_job();
    storage.save_job(&job).await.unwrap();

    processor.tick().await.unwrap();

    let failed = storage.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed.error.as_deref().unwrap().contains("timed out"));
    assert!(failed.result.is_none());
    assert!(failed.viewing_key.is_none());

    assert_eq!(metrics.snapshot().jobs_failed["NONE"], 1);
    assert_eq!(metrics.snapshot().errors["processor"], 1);
}

#[tokio::test]
async fn prover_failure_fails_the_job_with_its_message() {
    let (storage, _metrics, processor) = harness(Arc::new(FailingProver));
    let job = pending_job();
    storage.save_job(&job).await.unwrap();

    processor.tick().await.unwrap();

    let failed = storage.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(failed.status, JobStatus::Failed);
    assert!(failed
        .error
        .as_deref()
        .unwrap()
        .contains("note scan aborted"));
    // No tier snapshot is ever written for a failed job.
    assert!(storage.get_tier(ADDRESS).await.unwrap().is_none());
}

#[tokio::test]
async fn tick_with_nothing_pending_is_a_no_op() {
    let (_storage, _metrics, processor) = harness(Arc::new(FailingProver));
    processor.tick().await.unwrap();
}

#[tokio::test]
async fn terminal_and_claimed_jobs_are_left_untouched() {
    let (storage, _metrics, processor) = harness(Arc::new(MockProver {
        artifact: gold_artifact(),
    }));

    let mut processing = pending_job();
    processing.status = JobStatus::Processing;
    let mut failed = pending_job();
    failed.status = JobStatus::Failed;
    failed.error = Some("previous failure".to_string());
    storage.save_job(&processing).await.unwrap();
    storage.save_job(&failed).await.unwrap();

    processor.tick().await.unwrap();

    let processing_after = storage.get_job(processing.id).await.unwrap().unwrap();
    let failed_after = storage.get_job(failed.id).await.unwrap().unwrap();
    assert_eq!(processing_after.status, JobStatus::Processing);
    assert_eq!(failed_after.status, JobStatus::Failed);
    assert_eq!(failed_after.error.as_deref(), Some("previous failure"));
}

#[tokio::test]
async fn run_loop_processes_jobs_and_stops_on_cancel() {
    let (storage, _metrics, processor) = harness(Arc::new(MockProver {
        artifact: gold_artifact(),
    }));
    let job = pending_job();
    storage.save_job(&job).await.unwrap();

    let processor = Arc::new(processor);
    let cancel = tokio_util::sync::CancellationToken::new();
    let handle = {
        let processor = Arc::clone(&processor);
        let cancel = cancel.clone();
        tokio::spawn(async move { processor.run(cancel).await })
    };

    for _ in 0..200 {
        let current = storage.get_job(job.id).await.unwrap().unwrap();
        if current.status == JobStatus::Completed {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    let done = storage.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);

    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("run loop did not stop on cancel")
        .unwrap();
}

// ---------------------------------------------------------------------------
// Webhook interaction
// ---------------------------------------------------------------------------

#[tokio::test]
async fn webhook_delivery_failure_never_touches_job_state() {
    let storage = Arc::new(MemoryStorage::new());
    let metrics = Arc::new(MetricsSink::new());
    let dispatcher = WebhookDispatcher::new(8, Arc::clone(&metrics));

    // Nothing listens here: every delivery attempt fails.
    dispatcher
        .subscribe(SubscribeRequest {
            owner_address: ADDRESS.to_string(),
            callback_url: "http://127.0.0.1:9/hook".to_string(),
            events: Some(vec![EventKind::BadgeMinted]),
            secret: None,
        })
        .await
        .unwrap();

    let processor = processor(
        Arc::clone(&storage) as Arc<dyn Storage>,
        Arc::new(MockProver {
            artifact: gold_artifact(),
        }),
        dispatcher,
        Arc::clone(&metrics),
    );

    let job = pending_job();
    storage.save_job(&job).await.unwrap();
    processor.tick().await.unwrap();

    // Give the failed delivery time to resolve, then confirm the job is
    // still cleanly completed.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let done = storage.get_job(job.id).await.unwrap().unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.error.is_none());
}

#[tokio::test]
async fn rising_above_a_previous_tier_emits_an_upgrade_event() {
    use axum::extract::State;
    use axum::routing::post;
    use axum::{Json, Router};

    type Sink = Arc<Mutex<Vec<serde_json::Value>>>;
    async fn record(State(sink): State<Sink>, Json(body): Json<serde_json::Value>) {
        sink.lock().await.push(body);
    }

    let sink: Sink = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/hook", post(record))
        .with_state(Arc::clone(&sink));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/hook", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let storage = Arc::new(MemoryStorage::new());
    let metrics = Arc::new(MetricsSink::new());
    let dispatcher = WebhookDispatcher::new(8, Arc::clone(&metrics));

    // Subscriber only cares about upgrades, not badges.
    dispatcher
        .subscribe(SubscribeRequest {
            owner_address: ADDRESS.to_string(),
            callback_url: url,
            events: Some(vec![EventKind::TierUpgrade]),
            secret: None,
        })
        .await
        .unwrap();

    // The address previously resolved to SILVER.
    storage
        .save_tier(&TierRecord {
            address: ADDRESS.to_string(),
            tier: Tier::Silver,
            score: Tier::Silver.score(),
            encrypted_total: "0xct".to_string(),
            volume_hint: None,
            updated_at: Utc::now(),
        })
        .await
        .unwrap();

    let processor = processor(
        Arc::clone(&storage) as Arc<dyn Storage>,
        Arc::new(MockProver {
            artifact: gold_artifact(),
        }),
        dispatcher,
        Arc::clone(&metrics),
    );

    storage.save_job(&pending_job()).await.unwrap();
    processor.tick().await.unwrap();

    let mut received = Vec::new();
    for _ in 0..200 {
        received = sink.lock().await.clone();
        if !received.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // Exactly one callback: the upgrade. The badge_minted event was
    // filtered out by the subscription's event set.
    assert_eq!(received.len(), 1);
    assert_eq!(received[0]["event"], "tier_upgrade");
    assert_eq!(received[0]["data"]["old_tier"], "SILVER");
    assert_eq!(received[0]["data"]["new_tier"], "GOLD");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sink.lock().await.len(), 1);
}
