//! Passive in-process metrics registry.
//!
//! [`MetricsSink`] is written to by the registry, the processor, and the
//! webhook dispatcher, and read by the stats/metrics HTTP routes. Every
//! recording method is infallible and lock-free so an unavailable or
//! contended sink can never affect a job outcome.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

use crate::tier::{Tier, ALL_TIERS};

/// Histogram bucket upper bounds for job duration, in seconds.
pub const DURATION_BUCKETS: [f64; 8] = [0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0];

/// Component label for error counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Registry,
    Processor,
    Storage,
    Webhook,
}

/// All components, in counter-slot order.
const ALL_COMPONENTS: [Component; 4] = [
    Component::Registry,
    Component::Processor,
    Component::Storage,
    Component::Webhook,
];

impl Component {
    /// Metric label value.
    pub fn as_str(self) -> &'static str {
        match self {
            Component::Registry => "registry",
            Component::Processor => "processor",
            Component::Storage => "storage",
            Component::Webhook => "webhook",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Point-in-time view of all counters, for the JSON stats surface.
#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub jobs_created: BTreeMap<&'static str, u64>,
    pub jobs_completed: BTreeMap<&'static str, u64>,
    pub jobs_failed: BTreeMap<&'static str, u64>,
    pub job_duration: DurationSnapshot,
    pub tier_queries: u64,
    pub errors: BTreeMap<&'static str, u64>,
}

/// Histogram summary for job duration.
#[derive(Debug, Serialize)]
pub struct DurationSnapshot {
    pub count: u64,
    pub sum_seconds: f64,
}

/// Lock-free counter/histogram registry.
pub struct MetricsSink {
    jobs_created: [AtomicU64; ALL_TIERS.len()],
    jobs_completed: [AtomicU64; ALL_TIERS.len()],
    jobs_failed: [AtomicU64; ALL_TIERS.len()],
    duration_buckets: [AtomicU64; DURATION_BUCKETS.len()],
    duration_count: AtomicU64,
    duration_sum_micros: AtomicU64,
    tier_queries: AtomicU64,
    errors: [AtomicU64; ALL_COMPONENTS.len()],
}

impl MetricsSink {
    pub fn new() -> Self {
        Self {
            jobs_created: std::array::from_fn(|_| AtomicU64::new(0)),
            jobs_completed: std::array::from_fn(|_| AtomicU64::new(0)),
            jobs_failed: std::array::from_fn(|_| AtomicU64::new(0)),
            duration_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            duration_count: AtomicU64::new(0),
            duration_sum_micros: AtomicU64::new(0),
            tier_queries: AtomicU64::new(0),
            errors: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    /// Record a job accepted by the registry, labeled by its provisional tier.
    pub fn record_job_created(&self, tier: Tier) {
        self.jobs_created[tier.index()].fetch_add(1, Ordering::Relaxed);
    }

    /// Record a job reaching `completed`, with its authoritative tier and
    /// end-to-end duration.
    pub fn record_job_completed(&self, tier: Tier, duration: Duration) {
        self.jobs_completed[tier.index()].fetch_add(1, Ordering::Relaxed);
        self.observe_duration(duration);
    }

    /// Record a job reaching `failed`, labeled by its last known tier.
    pub fn record_job_failed(&self, tier: Tier, duration: Duration) {
        self.jobs_failed[tier.index()].fetch_add(1, Ordering::Relaxed);
        self.observe_duration(duration);
    }

    /// Record a tier lookup on the read path.
    pub fn record_tier_query(&self) {
        self.tier_queries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an error attributed to a component.
    pub fn record_error(&self, component: Component) {
        self.errors[component.index()].fetch_add(1, Ordering::Relaxed);
    }

    fn observe_duration(&self, duration: Duration) {
        let secs = duration.as_secs_f64();
        for (i, bound) in DURATION_BUCKETS.iter().enumerate() {
            if secs <= *bound {
                self.duration_buckets[i].fetch_add(1, Ordering::Relaxed);
                break;
            }
        }
        self.duration_count.fetch_add(1, Ordering::Relaxed);
        self.duration_sum_micros
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    /// Point-in-time snapshot of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let per_tier = |counters: &[AtomicU64; ALL_TIERS.len()]| -> BTreeMap<&'static str, u64> {
            ALL_TIERS
                .iter()
                .map(|t| (t.as_str(), counters[t.index()].load(Ordering::Relaxed)))
                .collect()
        };

        MetricsSnapshot {
            jobs_created: per_tier(&self.jobs_created),
            jobs_completed: per_tier(&self.jobs_completed),
            jobs_failed: per_tier(&self.jobs_failed),
            job_duration: DurationSnapshot {
                count: self.duration_count.load(Ordering::Relaxed),
                sum_seconds: self.duration_sum_micros.load(Ordering::Relaxed) as f64 / 1e6,
            },
            tier_queries: self.tier_queries.load(Ordering::Relaxed),
            errors: ALL_COMPONENTS
                .iter()
                .map(|c| (c.as_str(), self.errors[c.index()].load(Ordering::Relaxed)))
                .collect(),
        }
    }

    /// Render the Prometheus text exposition format.
    pub fn render_prometheus(&self) -> String {
        let mut out = String::new();

        let render_per_tier = |out: &mut String, name: &str, counters: &[AtomicU64]| {
            out.push_str(&format!("# TYPE {name} counter\n"));
            for tier in ALL_TIERS {
                let value = counters[tier.index()].load(Ordering::Relaxed);
                out.push_str(&format!("{name}{{tier=\"{tier}\"}} {value}\n"));
            }
        };

        render_per_tier(&mut out, "zrep_jobs_created_total", &self.jobs_created);
        render_per_tier(&mut out, "zrep_jobs_completed_total", &self.jobs_completed);
        render_per_tier(&mut out, "zrep_jobs_failed_total", &self.jobs_failed);

        // Histogram buckets are cumulative in the exposition format.
        out.push_str("# TYPE zrep_job_duration_seconds histogram\n");
        let mut cumulative = 0u64;
        for (i, bound) in DURATION_BUCKETS.iter().enumerate() {
            cumulative += self.duration_buckets[i].load(Ordering::Relaxed);
            out.push_str(&format!(
                "zrep_job_duration_seconds_bucket{{le=\"{bound}\"}} {cumulative}\n"
            ));
        }
        let count = self.duration_count.load(Ordering::Relaxed);
        let sum = self.duration_sum_micros.load(Ordering::Relaxed) as f64 / 1e6;
        out.push_str(&format!(
            "zrep_job_duration_seconds_bucket{{le=\"+Inf\"}} {count}\n"
        ));
        out.push_str(&format!("zrep_job_duration_seconds_sum {sum}\n"));
        out.push_str(&format!("zrep_job_duration_seconds_count {count}\n"));

        out.push_str("# TYPE zrep_tier_queries_total counter\n");
        out.push_str(&format!(
            "zrep_tier_queries_total {}\n",
            self.tier_queries.load(Ordering::Relaxed)
        ));

        out.push_str("# TYPE zrep_errors_total counter\n");
        for component in ALL_COMPONENTS {
            let value = self.errors[component.index()].load(Ordering::Relaxed);
            out.push_str(&format!(
                "zrep_errors_total{{component=\"{}\"}} {value}\n",
                component.as_str()
            ));
        }

        out
    }
}

impl Default for MetricsSink {
    fn default() -> Self {
        Self::new()
    }
}
