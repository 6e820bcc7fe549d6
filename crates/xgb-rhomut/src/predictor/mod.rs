//! Strength ratio prediction engine
//!
//! A [`Predictor`] is bound to one model selector for its lifetime. Forward
//! predictions turn a dynamic ductility into a median strength ratio and
//! dispersion; inverse predictions sweep the forward model to estimate the
//! dynamic ductility reached at a target strength ratio.

mod deadline;
pub mod dispersion;
mod features;
mod inference;
pub mod inverse;
mod output;

pub use deadline::{predict_with_deadline, DEFAULT_DEADLINE};
pub use dispersion::{DispersionLeaf, DispersionQuery, DispersionTable, ResolvedDispersion};
pub use features::{FeatureExtractor, FeatureScaler, FittedScaler, MinMaxScaler, StandardScaler};
pub use inference::{OnnxRegressor, TreeEnsemble};
pub use inverse::{ductility_grid, ResponseCurve, SWEEP_POINTS};
pub use output::{OutputConfig, OutputFormatter, ELASTIC_DUCTILITY_LIMIT, LOW_DUCTILITY_LIMIT};

use crate::config::PredictorConfig;
use crate::error::{Result, RhomutError};
use crate::models::{
    Diagnostic, InputParameter, ModelKey, ModelSelector, Prediction, PredictionMode,
    PredictionRequest, PredictionResult, Quantity,
};
use crate::observability::{PredictorMetrics, StructuredLogger};
use crate::store::{ArtifactStore, FileArtifactStore, ModelArtifacts};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Trained model mapping scaled features to a `log1p`-space strength ratio
pub trait Regressor: Send + Sync {
    fn predict(&self, features: &[f64]) -> Result<f64>;
}

/// Predicts R, rho2 or rho3 for one intensity measure type and collapse flag
pub struct Predictor {
    selector: ModelSelector,
    store: Arc<dyn ArtifactStore>,
    feature_extractor: FeatureExtractor,
    output_formatter: OutputFormatter,
    logger: StructuredLogger,
    metrics: PredictorMetrics,
}

impl Predictor {
    /// Create a predictor reading artifacts from `store`.
    ///
    /// `im_type` is `"sa"` (R) or `"sa_avg"`/`"saavg"` (rho3 if `collapse`,
    /// else rho2), case-insensitive.
    pub fn new(im_type: &str, collapse: bool, store: Arc<dyn ArtifactStore>) -> Result<Self> {
        let selector = Self::resolve_selector(im_type, collapse)?;
        debug!(model = %selector.key(), im_type = %im_type, "Predictor configured");

        Ok(Self {
            selector,
            store,
            feature_extractor: FeatureExtractor::new(selector),
            output_formatter: OutputFormatter::new(selector),
            logger: StructuredLogger::new(selector.key().to_string()),
            metrics: PredictorMetrics::new(),
        })
    }

    /// Create a predictor backed by the file store described in `config`
    pub fn from_config(im_type: &str, collapse: bool, config: &PredictorConfig) -> Result<Self> {
        let store = FileArtifactStore::new(&config.model_dir).with_cache(config.cache_artifacts);
        Self::new(im_type, collapse, Arc::new(store))
    }

    /// Map an intensity measure type and collapse flag to a model selector
    pub fn resolve_selector(im_type: &str, collapse: bool) -> Result<ModelSelector> {
        let quantity = match im_type.to_ascii_lowercase().as_str() {
            "sa" => Quantity::R,
            "sa_avg" | "saavg" if collapse => Quantity::Rho3,
            "sa_avg" | "saavg" => Quantity::Rho2,
            _ => {
                return Err(RhomutError::invalid(format!(
                    "intensity measure type must be 'sa' or 'sa_avg', got '{im_type}'"
                )))
            }
        };
        Ok(ModelSelector { quantity, collapse })
    }

    pub fn selector(&self) -> ModelSelector {
        self.selector
    }

    /// Quantity predicted by this instance
    pub fn parameter(&self) -> Quantity {
        self.selector.quantity
    }

    pub fn key(&self) -> ModelKey {
        self.selector.key()
    }

    /// Warnings for inputs outside the domain covered by the training data.
    ///
    /// Advisory only; out-of-range requests are still predicted.
    pub fn verify_input(&self, request: &PredictionRequest) -> Vec<Diagnostic> {
        let checks = [
            (InputParameter::Period, request.period),
            (InputParameter::Damping, request.damping),
            (InputParameter::HardeningRatio, request.hardening_ratio),
            (InputParameter::Ductility, request.ductility),
        ];

        checks
            .into_iter()
            .filter_map(|(parameter, value)| {
                let (min, max) = parameter.recommended_range();
                (!(min..=max).contains(&value)).then_some(Diagnostic::OutOfRange {
                    parameter,
                    value,
                    min,
                    max,
                })
            })
            .collect()
    }

    /// Predict for one request.
    ///
    /// A target strength ratio selects inverse mode (ductility estimation);
    /// otherwise the dynamic ductility is required for non-collapse models.
    pub fn make_prediction(&self, request: &PredictionRequest) -> Result<Prediction> {
        let start = Instant::now();
        let mode = request.mode();

        let outcome = match request.strength_ratio {
            Some(target) => self.estimate_ductility(request, target),
            None => self.predict_forward(request),
        };

        self.metrics
            .observe_prediction_latency(start.elapsed().as_secs_f64());
        match &outcome {
            Ok(prediction) => {
                self.metrics
                    .inc_predictions(self.selector.quantity, prediction.mode);
                self.logger.log_diagnostics(&prediction.diagnostics);
                self.logger.log_prediction(request, prediction);
            }
            Err(e) => {
                self.metrics.inc_prediction_errors(self.selector.quantity, mode);
                self.logger.log_prediction_error(mode, e);
            }
        }
        outcome
    }

    /// Predict a batch of requests independently
    pub fn make_predictions(&self, requests: &[PredictionRequest]) -> Vec<Result<Prediction>> {
        requests.iter().map(|r| self.make_prediction(r)).collect()
    }

    fn predict_forward(&self, request: &PredictionRequest) -> Result<Prediction> {
        let mut diagnostics = self.verify_input(request);

        let dynamic_ductility = request.supplied_dynamic_ductility();
        if !self.selector.collapse && dynamic_ductility.is_none() {
            return Err(RhomutError::invalid(format!(
                "dynamic ductility is required for non-collapse {} predictions",
                self.selector.quantity
            )));
        }

        if let Some(result) = self.output_formatter.elastic_shortcut(dynamic_ductility) {
            return Ok(Prediction {
                result,
                mode: PredictionMode::Forward,
                diagnostics,
            });
        }

        let artifacts = self.store.load(self.key())?;
        let (result, fallback) = self.evaluate(&artifacts, request, dynamic_ductility)?;
        diagnostics.extend(fallback);

        Ok(Prediction {
            result,
            mode: PredictionMode::Forward,
            diagnostics,
        })
    }

    /// Estimate the dynamic ductility at which the median reaches `strength_ratio`
    pub fn estimate_ductility(
        &self,
        request: &PredictionRequest,
        strength_ratio: f64,
    ) -> Result<Prediction> {
        if self.selector.collapse {
            return Err(RhomutError::invalid(
                "ductility estimation requires a non-collapse model",
            ));
        }
        if !strength_ratio.is_finite() {
            return Err(RhomutError::invalid(format!(
                "target strength ratio must be finite, got {strength_ratio}"
            )));
        }

        let mut diagnostics = self.verify_input(request);
        let artifacts = self.store.load(self.key())?;

        let mut curve = ResponseCurve::with_capacity(SWEEP_POINTS);
        for ductility in ductility_grid() {
            let (result, fallback) = self.evaluate(&artifacts, request, Some(ductility))?;
            diagnostics.extend(fallback);
            curve.push(ductility, result.median, result.dispersion);
        }

        let inversion = curve.invert(strength_ratio).ok_or_else(|| {
            RhomutError::Inference("forward model produced no finite medians".to_string())
        })?;
        diagnostics.extend(inversion.diagnostics);

        Ok(Prediction {
            result: PredictionResult {
                median: inversion.ductility,
                dispersion: inversion.dispersion,
            },
            mode: PredictionMode::Inverse,
            diagnostics,
        })
    }

    /// Forward model at one dynamic ductility, with its dispersion
    fn evaluate(
        &self,
        artifacts: &ModelArtifacts,
        request: &PredictionRequest,
        dynamic_ductility: Option<f64>,
    ) -> Result<(PredictionResult, Option<Diagnostic>)> {
        if let Some(result) = self.output_formatter.elastic_shortcut(dynamic_ductility) {
            return Ok((result, None));
        }

        let features = self
            .feature_extractor
            .extract(request, dynamic_ductility)
            .to_vec();
        let scaled = artifacts.scaler.transform(&features)?;
        let margin = artifacts.regressor.predict(&scaled)?;
        let median = self.output_formatter.median(margin, dynamic_ductility);

        let query = DispersionQuery {
            period: request.period,
            damping: request.damping,
            hardening_ratio: request.hardening_ratio,
            ductility: request.ductility,
            dynamic_ductility,
        };
        let resolved = artifacts.dispersion.resolve(&query, self.selector.collapse)?;
        if resolved.diagnostic.is_some() {
            self.metrics.inc_dispersion_fallbacks();
        }

        Ok((
            PredictionResult {
                median,
                dispersion: resolved.value,
            },
            resolved.diagnostic,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryArtifactStore;
    use serde_json::json;

    /// Regressor whose median is `0.8 * dynamic + 0.1 * ductility`, or
    /// `0.5 * ductility` for collapse models
    struct LinearRegressor;

    impl Regressor for LinearRegressor {
        fn predict(&self, features: &[f64]) -> Result<f64> {
            let median = match features.len() {
                5 => 0.8 * features[4] + 0.1 * features[3],
                4 => 0.5 * features[3],
                n => return Err(RhomutError::Inference(format!("unexpected {n} features"))),
            };
            Ok(median.ln_1p())
        }
    }

    fn dispersion_table(collapse: bool) -> DispersionTable {
        if collapse {
            DispersionTable::from_value(json!({
                "1.0": {"0.05": {"0.05": {"3.0": 0.4}}}
            }))
            .unwrap()
        } else {
            DispersionTable::from_value(json!({
                "ductility": [0.5, 1.0, 2.0, 4.0, 8.0],
                "1.0": {"0.05": {"0.05": {
                    "3.0": [0.2, 0.25, 0.3, 0.35, 0.45],
                    "6.0": [0.0, 0.0, 0.0, 0.5, 0.6]
                }}}
            }))
            .unwrap()
        }
    }

    fn store() -> Arc<InMemoryArtifactStore> {
        let store = InMemoryArtifactStore::new();
        for (quantity, collapse) in [
            (Quantity::R, false),
            (Quantity::R, true),
            (Quantity::Rho2, false),
            (Quantity::Rho3, true),
        ] {
            let selector = ModelSelector { quantity, collapse };
            store.insert(
                selector.key(),
                ModelArtifacts::new(
                    Box::new(LinearRegressor),
                    Box::new(FittedScaler::identity(selector.feature_count())),
                    dispersion_table(collapse),
                ),
            );
        }
        Arc::new(store)
    }

    fn predictor(im_type: &str, collapse: bool) -> Predictor {
        Predictor::new(im_type, collapse, store()).unwrap()
    }

    fn request() -> PredictionRequest {
        PredictionRequest::new(1.0, 0.05, 0.05, 3.0)
    }

    #[test]
    fn test_selector_resolution() {
        assert_eq!(predictor("sa", true).parameter(), Quantity::R);
        assert_eq!(predictor("sa", false).parameter(), Quantity::R);
        assert_eq!(predictor("SAAVG", false).parameter(), Quantity::Rho2);
        assert_eq!(predictor("SAAVG", true).parameter(), Quantity::Rho3);
        assert_eq!(predictor("Sa_Avg", false).parameter(), Quantity::Rho2);
        assert_eq!(predictor("sa_avg", true).key().to_string(), "ro_3_xgb_collapse");
    }

    #[test]
    fn test_unknown_im_type_rejected() {
        for im_type in ["", "pga", "sa avg"] {
            let err = Predictor::new(im_type, true, store()).err().unwrap();
            assert!(err.is_invalid_argument());
        }
    }

    #[test]
    fn test_verify_input_flags_out_of_range() {
        let p = predictor("sa", false);
        assert!(p.verify_input(&request()).is_empty());

        let out = PredictionRequest::new(4.0, 0.01, 0.05, 10.0);
        let diagnostics = p.verify_input(&out);
        assert_eq!(diagnostics.len(), 3);
        assert!(diagnostics.iter().all(|d| matches!(d, Diagnostic::OutOfRange { .. })));
    }

    #[test]
    fn test_out_of_range_still_predicts() {
        let p = predictor("sa", false);
        let prediction = p
            .make_prediction(&PredictionRequest::new(4.0, 0.05, 0.05, 3.0).with_dynamic_ductility(2.0))
            .unwrap();
        assert!(prediction.has_warnings());
        assert!(prediction.median() > 0.0);
    }

    #[test]
    fn test_forward_prediction() {
        let p = predictor("sa_avg", false);
        let prediction = p
            .make_prediction(&request().with_dynamic_ductility(2.0))
            .unwrap();
        assert_eq!(prediction.mode, PredictionMode::Forward);
        assert!((prediction.median() - 1.9).abs() < 1e-9);
        assert!((prediction.dispersion() - 0.3).abs() < 1e-12);
        assert!(prediction.diagnostics.is_empty());
    }

    #[test]
    fn test_forward_prediction_is_deterministic() {
        let p = predictor("sa", false);
        let r = request().with_dynamic_ductility(3.0);
        assert_eq!(p.make_prediction(&r).unwrap(), p.make_prediction(&r).unwrap());
    }

    #[test]
    fn test_missing_dynamic_ductility_rejected() {
        let p = predictor("sa", false);
        assert!(p.make_prediction(&request()).unwrap_err().is_invalid_argument());
        assert!(p
            .make_prediction(&request().with_dynamic_ductility(0.0))
            .unwrap_err()
            .is_invalid_argument());
    }

    #[test]
    fn test_collapse_does_not_need_dynamic_ductility() {
        let p = predictor("sa_avg", true);
        let prediction = p.make_prediction(&request()).unwrap();
        assert!((prediction.median() - 1.5).abs() < 1e-9);
        assert_eq!(prediction.dispersion(), 0.4);

        let with_dynamic = p.make_prediction(&request().with_dynamic_ductility(4.0)).unwrap();
        assert_eq!(with_dynamic, prediction);
    }

    #[test]
    fn test_elastic_r_short_circuits() {
        let p = predictor("sa", false);
        let prediction = p.make_prediction(&request().with_dynamic_ductility(0.7)).unwrap();
        assert_eq!(
            prediction.result,
            PredictionResult {
                median: 0.7,
                dispersion: 0.0
            }
        );
    }

    #[test]
    fn test_low_ductility_rho_uses_ductility() {
        let p = predictor("sa_avg", false);
        let prediction = p.make_prediction(&request().with_dynamic_ductility(0.5)).unwrap();
        assert_eq!(prediction.median(), 0.5);
        assert!((prediction.dispersion() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_unattainable_ductility_falls_back() {
        let p = predictor("sa_avg", false);
        let r = PredictionRequest::new(1.0, 0.05, 0.05, 6.0).with_dynamic_ductility(1.5);
        let prediction = p.make_prediction(&r).unwrap();
        assert_eq!(prediction.dispersion(), 0.6);
        assert!(prediction
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::UnattainableDuctility { .. })));
    }

    #[test]
    fn test_inverse_round_trip() {
        let p = predictor("sa_avg", false);
        let estimate = p.make_prediction(&request().with_strength_ratio(3.0)).unwrap();
        assert_eq!(estimate.mode, PredictionMode::Inverse);
        assert!((estimate.median() - 3.375).abs() < 1e-6);

        let forward = p
            .make_prediction(&request().with_dynamic_ductility(estimate.median()))
            .unwrap();
        assert!((forward.median() - 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_strength_ratio_takes_precedence() {
        let p = predictor("sa", false);
        let r = request().with_dynamic_ductility(2.0).with_strength_ratio(3.0);
        assert_eq!(p.make_prediction(&r).unwrap().mode, PredictionMode::Inverse);
    }

    #[test]
    fn test_inverse_clamps_unreachable_target() {
        let p = predictor("sa", false);
        let estimate = p.make_prediction(&request().with_strength_ratio(50.0)).unwrap();
        assert!((estimate.median() - 11.95).abs() < 1e-6);
        assert!(estimate
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::TargetClamped { .. })));
    }

    #[test]
    fn test_inverse_rejected_for_collapse() {
        let p = predictor("sa_avg", true);
        let err = p.make_prediction(&request().with_strength_ratio(2.0)).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_missing_artifacts_are_not_invalid_argument() {
        let p = Predictor::new("sa", false, Arc::new(InMemoryArtifactStore::new())).unwrap();
        let err = p
            .make_prediction(&request().with_dynamic_ductility(2.0))
            .unwrap_err();
        assert!(matches!(err, RhomutError::ArtifactNotFound { .. }));
    }

    #[test]
    fn test_batch_predictions() {
        let p = predictor("sa", false);
        let results = p.make_predictions(&[request().with_dynamic_ductility(2.0), request()]);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }
}
