//! Observability infrastructure for the predictor
//!
//! Provides:
//! - Prometheus metrics (prediction latency and counts, errors, dispersion fallbacks, artifact loads)
//! - Structured logging with tracing

use crate::error::RhomutError;
use crate::models::{
    ArtifactResource, Diagnostic, ModelKey, Prediction, PredictionMode, PredictionRequest,
    Quantity,
};
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, Histogram, IntCounter,
    IntCounterVec,
};
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<PredictorMetricsInner> = OnceLock::new();

struct PredictorMetricsInner {
    prediction_latency_seconds: Histogram,
    predictions: IntCounterVec,
    prediction_errors: IntCounterVec,
    dispersion_fallbacks: IntCounter,
    artifact_loads: IntCounter,
    artifact_load_errors: IntCounter,
}

impl PredictorMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "rhomut_prediction_latency_seconds",
                "Time spent producing one prediction, including inverse sweeps",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            predictions: register_int_counter_vec!(
                "rhomut_predictions_total",
                "Total number of predictions by quantity and mode",
                &["quantity", "mode"]
            )
            .expect("Failed to register predictions_total"),

            prediction_errors: register_int_counter_vec!(
                "rhomut_prediction_errors_total",
                "Total number of failed predictions by quantity and mode",
                &["quantity", "mode"]
            )
            .expect("Failed to register prediction_errors_total"),

            dispersion_fallbacks: register_int_counter!(
                "rhomut_dispersion_fallbacks_total",
                "Dispersion lookups that fell back to the maximum dispersion"
            )
            .expect("Failed to register dispersion_fallbacks_total"),

            artifact_loads: register_int_counter!(
                "rhomut_artifact_loads_total",
                "Model artifact sets read from disk"
            )
            .expect("Failed to register artifact_loads_total"),

            artifact_load_errors: register_int_counter!(
                "rhomut_artifact_load_errors_total",
                "Model artifact sets that failed to load"
            )
            .expect("Failed to register artifact_load_errors_total"),
        }
    }
}

/// Predictor metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the
/// same underlying metrics.
#[derive(Clone)]
pub struct PredictorMetrics {
    _private: (),
}

impl Default for PredictorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(PredictorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &PredictorMetricsInner {
        GLOBAL_METRICS.get_or_init(PredictorMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self, quantity: Quantity, mode: PredictionMode) {
        self.inner()
            .predictions
            .with_label_values(&[quantity.as_str(), &mode.to_string()])
            .inc();
    }

    pub fn inc_prediction_errors(&self, quantity: Quantity, mode: PredictionMode) {
        self.inner()
            .prediction_errors
            .with_label_values(&[quantity.as_str(), &mode.to_string()])
            .inc();
    }

    pub fn inc_dispersion_fallbacks(&self) {
        self.inner().dispersion_fallbacks.inc();
    }

    pub fn inc_artifact_loads(&self) {
        self.inner().artifact_loads.inc();
    }

    pub fn inc_artifact_load_errors(&self) {
        self.inner().artifact_load_errors.inc();
    }

    /// Number of successful predictions recorded so far
    pub fn predictions(&self, quantity: Quantity, mode: PredictionMode) -> u64 {
        self.inner()
            .predictions
            .with_label_values(&[quantity.as_str(), &mode.to_string()])
            .get()
    }
}

/// Structured logger for prediction events
#[derive(Clone)]
pub struct StructuredLogger {
    component: String,
}

impl StructuredLogger {
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
        }
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    /// Log a completed prediction
    pub fn log_prediction(&self, request: &PredictionRequest, prediction: &Prediction) {
        debug!(
            event = "prediction_generated",
            model = %self.component,
            mode = %prediction.mode,
            period = request.period,
            damping = request.damping,
            hardening_ratio = request.hardening_ratio,
            ductility = request.ductility,
            dynamic_ductility = ?request.dynamic_ductility,
            strength_ratio = ?request.strength_ratio,
            median = prediction.result.median,
            dispersion = prediction.result.dispersion,
            warnings = prediction.diagnostics.len(),
            "Generated prediction"
        );
    }

    pub fn log_prediction_error(&self, mode: PredictionMode, error: &RhomutError) {
        warn!(
            event = "prediction_failed",
            model = %self.component,
            mode = %mode,
            error = %error,
            "Prediction failed"
        );
    }

    /// Log advisory diagnostics raised during a prediction
    pub fn log_diagnostics(&self, diagnostics: &[Diagnostic]) {
        for diagnostic in diagnostics {
            warn!(
                event = "prediction_warning",
                model = %self.component,
                diagnostic = %diagnostic,
                "Prediction warning"
            );
        }
    }

    pub fn log_artifact_loaded(
        &self,
        key: ModelKey,
        resource: ArtifactResource,
        path: &Path,
        size_bytes: usize,
        checksum: &str,
    ) {
        info!(
            event = "artifact_loaded",
            component = %self.component,
            model = %key,
            resource = %resource,
            path = %path.display(),
            size = size_bytes,
            checksum = %checksum,
            "Model artifact loaded"
        );
    }
}

/// Install a global tracing subscriber filtered by `RUST_LOG` (default `info`).
///
/// Emits JSON lines when `json` is set. Does nothing if a subscriber is
/// already installed.
pub fn init_tracing(json: bool) {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .try_init();
}
