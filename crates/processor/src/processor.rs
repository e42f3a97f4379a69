//! The polling control loop.
//!
//! Polls storage for pending jobs on a fixed interval, claims each one
//! with an atomic conditional transition, invokes the prover under a
//! bounded timeout, and writes back the terminal outcome. The durable
//! backend is the queue: a processor restart loses nothing, and multiple
//! replicas against shared storage cannot double-dispatch a job because
//! only one claim per id can win.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use zrep_core::metrics::Component;
use zrep_core::{MetricsSink, Tier};
use zrep_db::models::job::{Job, JobResult, JobUpdate};
use zrep_db::models::tier::TierRecord;
use zrep_db::{Storage, StorageError};
use zrep_events::{EventData, EventKind, WebhookDispatcher};

use crate::prover::Prover;

/// Tuning knobs for the control loop.
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    /// How often to poll for pending jobs.
    pub poll_interval: Duration,
    /// Maximum pending jobs picked up per tick.
    pub batch_size: i64,
    /// Upper bound on a single prover call; exceeding it fails the job.
    pub prover_timeout: Duration,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            batch_size: 10,
            prover_timeout: Duration::from_secs(60),
        }
    }
}

/// Background job processor.
pub struct JobProcessor {
    storage: Arc<dyn Storage>,
    prover: Arc<dyn Prover>,
    dispatcher: WebhookDispatcher,
    metrics: Arc<MetricsSink>,
    config: ProcessorConfig,
}

impl JobProcessor {
    pub fn new(
        storage: Arc<dyn Storage>,
        prover: Arc<dyn Prover>,
        dispatcher: WebhookDispatcher,
        metrics: Arc<MetricsSink>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            storage,
            prover,
            dispatcher,
            metrics,
            config,
        }
    }

    /// Run the polling loop until the cancellation token is triggered.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            batch_size = self.config.batch_size,
            "Job processor started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Job processor shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    // A storage outage here is retried next tick; it never
                    // fails a job.
                    if let Err(e) = self.tick().await {
                        tracing::error!(error = %e, "Processor tick failed");
                        self.metrics.record_error(Component::Storage);
                    }
                }
            }
        }
    }

    /// One poll cycle: pick up a batch of pending jobs and drive each to a
    /// terminal state. Jobs in the batch are processed concurrently.
    pub async fn tick(&self) -> Result<(), StorageError> {
        let pending = self.storage.list_pending(self.config.batch_size).await?;
        if pending.is_empty() {
            return Ok(());
        }

        let tasks = pending.into_iter().map(|job| self.process_job(job));
        futures::future::join_all(tasks).await;
        Ok(())
    }

    async fn process_job(&self, job: Job) {
        let claimed = match self.storage.claim_job(job.id).await {
            Ok(Some(claimed)) => claimed,
            Ok(None) => {
                // Another processor instance won the claim, or the job
                // already left pending.
                tracing::debug!(job_id = %job.id, "Job no longer claimable, skipping");
                return;
            }
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "Failed to claim job");
                self.metrics.record_error(Component::Storage);
                return;
            }
        };

        tracing::info!(job_id = %claimed.id, address = %claimed.address, "Processing job");

        let Some(viewing_key) = claimed.viewing_key.clone() else {
            self.fail_job(&claimed, "viewing key missing from job record".to_string())
                .await;
            return;
        };

        let outcome = tokio::time::timeout(
            self.config.prover_timeout,
            self.prover.prove(&claimed.address, &viewing_key),
        )
        .await;

        match outcome {
            Ok(Ok(artifact)) => self.complete_job(&claimed, artifact).await,
            Ok(Err(e)) => {
                self.metrics.record_error(Component::Processor);
                self.fail_job(&claimed, e.to_string()).await;
            }
            Err(_elapsed) => {
                self.metrics.record_error(Component::Processor);
                self.fail_job(
                    &claimed,
                    format!(
                        "prover request timed out after {}s",
                        self.config.prover_timeout.as_secs()
                    ),
                )
                .await;
            }
        }
    }

    async fn complete_job(&self, job: &Job, artifact: crate::prover::ProverArtifact) {
        let tier = artifact.tier;
        let update = JobUpdate::completed(
            tier,
            artifact.proof_hash.clone(),
            JobResult {
                encrypted_payload: artifact.encrypted_payload,
                ciphertext: artifact.ciphertext.clone(),
            },
        );

        if let Err(e) = self.storage.update_job(job.id, update).await {
            // Leave the job for the liveness sweep; completing it with a
            // stale write would race a concurrent mutation.
            tracing::error!(job_id = %job.id, error = %e, "Failed to record completion");
            self.metrics.record_error(Component::Storage);
            return;
        }

        tracing::info!(job_id = %job.id, tier = %tier, "Job completed");

        let previous = match self.storage.get_tier(&job.address).await {
            Ok(previous) => previous,
            Err(e) => {
                tracing::error!(address = %job.address, error = %e, "Failed to load previous tier");
                self.metrics.record_error(Component::Storage);
                None
            }
        };

        let record = TierRecord {
            address: job.address.to_lowercase(),
            tier,
            score: tier.score(),
            encrypted_total: artifact.ciphertext.data,
            volume_hint: Some(artifact.notes_scanned),
            updated_at: Utc::now(),
        };
        if let Err(e) = self.storage.save_tier(&record).await {
            tracing::error!(address = %job.address, error = %e, "Failed to append tier history");
            self.metrics.record_error(Component::Storage);
        }

        let old_tier = previous.as_ref().map(|p| p.tier);
        let data = EventData {
            address: record.address.clone(),
            old_tier,
            new_tier: tier,
            score: record.score,
            proof_hash: artifact.proof_hash,
        };

        // Fire-and-forget: dispatch spawns delivery tasks and returns.
        self.dispatcher.dispatch(EventKind::BadgeMinted, data.clone()).await;
        match old_tier {
            Some(old) if tier > old => {
                self.dispatcher.dispatch(EventKind::TierUpgrade, data).await;
            }
            Some(old) if tier < old => {
                self.dispatcher.dispatch(EventKind::TierDowngrade, data).await;
            }
            _ => {}
        }

        self.metrics
            .record_job_completed(tier, job_duration(job));
    }

    async fn fail_job(&self, job: &Job, error: String) {
        tracing::warn!(job_id = %job.id, error = %error, "Job failed");

        if let Err(e) = self
            .storage
            .update_job(job.id, JobUpdate::failed(error))
            .await
        {
            tracing::error!(job_id = %job.id, error = %e, "Failed to record job failure");
            self.metrics.record_error(Component::Storage);
            return;
        }

        self.metrics
            .record_job_failed(Tier::None, job_duration(job));
    }
}

/// Wall-clock time from submission to now.
fn job_duration(job: &Job) -> Duration {
    (Utc::now() - job.submitted_at).to_std().unwrap_or_default()
}
