//! Background job processor for the zrep orchestrator.
//!
//! - [`Prover`] — the external proving capability, consumed over HTTP by
//!   [`HttpProver`]; the only interface required from the cryptographic
//!   subsystem.
//! - [`JobProcessor`] — the polling control loop that drives every
//!   pending job to exactly one terminal state.

pub mod processor;
pub mod prover;

pub use processor::{JobProcessor, ProcessorConfig};
pub use prover::{HttpProver, Prover, ProverArtifact, ProverError};
