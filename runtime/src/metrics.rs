//! Prometheus metrics for observability and monitoring.
//!
//! This module provides metric collection for the store components:
//! - Action dispatch and validation
//! - Reducer execution
//! - Feature topology changes
//!
//! Metrics are recorded through the `metrics` facade and are no-ops until a
//! recorder is installed.
//!
//! # Example
//!
//! ```rust,no_run
//! use composable_store_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = MetricsExporter::new();
//! exporter.install()?;
//!
//! // ... run stores ...
//!
//! if let Some(text) = exporter.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Total actions entering the store, synthetic ones included.
pub const ACTIONS_DISPATCHED: &str = "store_actions_dispatched_total";
/// Dispatched actions that failed validation.
pub const ACTIONS_INVALID: &str = "store_actions_invalid_total";
/// Reductions that returned an error.
pub const REDUCER_ERRORS: &str = "store_reducer_errors_total";
/// Time spent in the active reducer.
pub const REDUCER_DURATION: &str = "store_reducer_duration_seconds";
/// Committed reducer swaps.
pub const RECOMBINATIONS: &str = "store_recombinations_total";
/// Topology changes undone because their synthetic action failed.
pub const ROLLBACKS: &str = "store_topology_rollbacks_total";
/// Currently registered features.
pub const ACTIVE_FEATURES: &str = "store_active_features";

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder for store metrics.
///
/// Scraping is left to the embedding application; [`render`](Self::render)
/// returns the exposition text.
#[derive(Default)]
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsExporter")
            .field("installed", &self.handle.is_some())
            .finish()
    }
}

impl MetricsExporter {
    /// Create an exporter that is not installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// Only one global recorder can exist. If one is already installed
    /// (e.g., by another test), a warning is logged and no handle is kept.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!("Store metrics recorder installed");
                Ok(())
            },
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            },
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this exporter did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(ACTIONS_DISPATCHED, "Total number of actions entering the store");
    describe_counter!(ACTIONS_INVALID, "Total number of dispatched actions that failed validation");
    describe_counter!(REDUCER_ERRORS, "Total number of failed reductions");
    describe_histogram!(REDUCER_DURATION, "Time taken to run the active reducer");
    describe_counter!(RECOMBINATIONS, "Total number of committed reducer swaps");
    describe_counter!(ROLLBACKS, "Total number of topology changes rolled back");
    describe_gauge!(ACTIVE_FEATURES, "Number of currently registered features");
}

/// Dispatch-path metrics recorder.
pub struct DispatchMetrics;

impl DispatchMetrics {
    /// Record an action entering the store.
    pub fn record_dispatch() {
        counter!(ACTIONS_DISPATCHED).increment(1);
    }

    /// Record an action that failed validation.
    pub fn record_invalid() {
        counter!(ACTIONS_INVALID).increment(1);
    }

    /// Record a reducer run.
    pub fn record_reduction(duration: Duration) {
        histogram!(REDUCER_DURATION).record(duration.as_secs_f64());
    }

    /// Record a reducer error.
    pub fn record_error() {
        counter!(REDUCER_ERRORS).increment(1);
    }
}

/// Topology metrics recorder.
pub struct TopologyMetrics;

impl TopologyMetrics {
    /// Record a committed reducer swap.
    #[allow(clippy::cast_precision_loss)] // feature counts stay far below 2^52
    pub fn record_recombination(active_features: usize) {
        counter!(RECOMBINATIONS).increment(1);
        gauge!(ACTIVE_FEATURES).set(active_features as f64);
    }

    /// Record a rolled-back topology change.
    pub fn record_rollback() {
        counter!(ROLLBACKS).increment(1);
    }
}
