use std::sync::Arc;
use std::time::Duration;

use prometheus_client::encoding::{EncodeLabelSet, EncodeLabelValue};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

// ---------------------------------------------------------------------------
// Label types
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Operation {
    Archive,
    Remove,
    List,
    ListSizes,
    UpdateAll,
    RecloneAll,
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Outcome {
    Success,
    Failure,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OperationLabels {
    pub operation: Operation,
    pub outcome: Outcome,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OperationKindLabels {
    pub operation: Operation,
}

// ---------------------------------------------------------------------------
// Metrics struct
// ---------------------------------------------------------------------------

/// Every Prometheus metric exposed by the service.
pub struct Metrics {
    pub operations_total: Family<OperationLabels, Counter>,
    pub operation_duration_seconds: Family<OperationKindLabels, Histogram>,
    /// Entry directories seen by the most recent size listing.
    pub archive_entries: Gauge,
    /// Bytes reported by the most recent size listing.
    pub archive_size_bytes: Gauge,
}

impl Metrics {
    /// Create a new [`Metrics`] instance and register every metric with the
    /// supplied `registry`.
    pub fn new(registry: &mut Registry) -> Self {
        let operations_total = Family::<OperationLabels, Counter>::default();
        registry.register(
            "repo_archive_operations",
            "Archive operations by outcome",
            operations_total.clone(),
        );

        let operation_duration_seconds =
            Family::<OperationKindLabels, Histogram>::new_with_constructor(|| {
                Histogram::new(exponential_buckets(0.01, 2.0, 16))
            });
        registry.register(
            "repo_archive_operation_duration_seconds",
            "Archive operation latency in seconds",
            operation_duration_seconds.clone(),
        );

        let archive_entries: Gauge = Gauge::default();
        registry.register(
            "repo_archive_entries",
            "Entry directories in the archive root at the last size listing",
            archive_entries.clone(),
        );

        let archive_size_bytes: Gauge = Gauge::default();
        registry.register(
            "repo_archive_size_bytes",
            "Archive size in bytes at the last size listing",
            archive_size_bytes.clone(),
        );

        Self {
            operations_total,
            operation_duration_seconds,
            archive_entries,
            archive_size_bytes,
        }
    }
}

// ---------------------------------------------------------------------------
// Shared handle
// ---------------------------------------------------------------------------

/// Thread-safe wrapper for the metrics registry, used in [`AppState`](crate::AppState).
#[derive(Clone)]
pub struct MetricsRegistry {
    pub registry: Arc<Registry>,
    pub metrics: Arc<Metrics>,
}

impl MetricsRegistry {
    /// Build a fresh registry and pre-register all metrics.
    pub fn new() -> Self {
        let mut registry = Registry::default();
        let metrics = Metrics::new(&mut registry);
        Self {
            registry: Arc::new(registry),
            metrics: Arc::new(metrics),
        }
    }

    /// Count one finished operation and its latency.
    pub fn record(&self, operation: Operation, succeeded: bool, elapsed: Duration) {
        let outcome = if succeeded {
            Outcome::Success
        } else {
            Outcome::Failure
        };
        self.metrics
            .operations_total
            .get_or_create(&OperationLabels { operation, outcome })
            .inc();
        self.metrics
            .operation_duration_seconds
            .get_or_create(&OperationKindLabels { operation })
            .observe(elapsed.as_secs_f64());
    }

    pub fn set_archive_usage(&self, entries: usize, bytes: u64) {
        self.metrics
            .archive_entries
            .set(i64::try_from(entries).unwrap_or(i64::MAX));
        self.metrics
            .archive_size_bytes
            .set(i64::try_from(bytes).unwrap_or(i64::MAX));
    }

    /// Render the registry in OpenMetrics text format.
    pub fn encode(&self) -> Result<String, std::fmt::Error> {
        let mut buf = String::new();
        prometheus_client::encoding::text::encode(&mut buf, &self.registry)?;
        Ok(buf)
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
