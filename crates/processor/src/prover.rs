//! The prover boundary.
//!
//! The actual note scanning, proof generation, and homomorphic encryption
//! happen in a separate service. The orchestrator only needs one call:
//! submit `{address, viewing_key}`, receive a [`ProverArtifact`] or an
//! error.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use zrep_core::Tier;
use zrep_db::models::job::Ciphertext;

/// Error type for prover calls.
#[derive(Debug, thiserror::Error)]
pub enum ProverError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("Prover request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The prover returned a non-2xx status code.
    #[error("Prover returned HTTP {0}")]
    HttpStatus(u16),

    /// The prover answered but reported failure.
    #[error("Prover returned unsuccessful result: {0}")]
    Unsuccessful(String),
}

/// Everything the prover produces for a completed scan.
#[derive(Debug, Clone, Deserialize)]
pub struct ProverArtifact {
    pub tier: Tier,
    pub proof_hash: String,
    pub encrypted_payload: String,
    pub ciphertext: Ciphertext,
    /// Number of shielded notes scanned; a coarse activity magnitude.
    pub notes_scanned: i64,
}

/// The external proving capability.
#[async_trait]
pub trait Prover: Send + Sync {
    /// One blocking request per job. The processor bounds this call with
    /// its own timeout and never retries it.
    async fn prove(&self, address: &str, viewing_key: &str) -> Result<ProverArtifact, ProverError>;
}

/// Response envelope from the prover service.
#[derive(Debug, Deserialize)]
struct ProverResponse {
    success: bool,
    artifact: Option<ProverArtifact>,
    error: Option<String>,
}

/// HTTP client for the prover service.
pub struct HttpProver {
    client: reqwest::Client,
    base_url: String,
}

impl HttpProver {
    /// `base_url` is the prover service root, e.g. `http://localhost:4101`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl Prover for HttpProver {
    async fn prove(&self, address: &str, viewing_key: &str) -> Result<ProverArtifact, ProverError> {
        let response = self
            .client
            .post(format!("{}/prove", self.base_url))
            .json(&serde_json::json!({
                "address": address,
                "viewing_key": viewing_key,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProverError::HttpStatus(status.as_u16()));
        }

        let envelope: ProverResponse = response.json().await?;
        if !envelope.success {
            return Err(ProverError::Unsuccessful(
                envelope
                    .error
                    .unwrap_or_else(|| "no error detail provided".to_string()),
            ));
        }
        envelope.artifact.ok_or_else(|| {
            ProverError::Unsuccessful("success response carried no artifact".to_string())
        })
    }
}
