//! Core domain types for the zrep reputation aggregator.
//!
//! This crate holds everything the other layers agree on:
//!
//! - [`JobStatus`] and [`Tier`] — the job state machine and the ordered
//!   reputation tiers.
//! - [`CoreError`] — the domain error taxonomy.
//! - [`validation`] — input validators for addresses, proof hashes, and
//!   viewing keys.
//! - [`MetricsSink`] — a passive in-process counter/histogram registry.
//! - [`signing`] — HMAC signing for webhook payloads.

pub mod error;
pub mod job;
pub mod metrics;
pub mod signing;
pub mod tier;
pub mod validation;

pub use error::CoreError;
pub use job::JobStatus;
pub use metrics::MetricsSink;
pub use tier::Tier;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
