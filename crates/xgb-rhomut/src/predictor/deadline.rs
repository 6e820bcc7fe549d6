//! Deadline-bounded prediction for async callers
//!
//! Prediction is CPU-bound and synchronous, so it runs on the blocking pool
//! while the caller waits at most `deadline` for the result.

use super::Predictor;
use crate::error::{Result, RhomutError};
use crate::models::{Prediction, PredictionRequest};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Deadline used when none is configured
pub const DEFAULT_DEADLINE: Duration = Duration::from_millis(5000);

/// Run `predictor.make_prediction(request)` with a deadline.
///
/// On timeout the blocking task is left to finish in the background and its
/// result is discarded.
pub async fn predict_with_deadline(
    predictor: Arc<Predictor>,
    request: PredictionRequest,
    deadline: Duration,
) -> Result<Prediction> {
    let model = predictor.key();
    let task = tokio::task::spawn_blocking(move || predictor.make_prediction(&request));

    match tokio::time::timeout(deadline, task).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_error)) => Err(RhomutError::Inference(format!(
            "prediction task failed: {join_error}"
        ))),
        Err(_) => {
            warn!(
                event = "prediction_deadline_exceeded",
                model = %model,
                deadline_ms = deadline.as_millis() as u64,
                "Prediction exceeded deadline"
            );
            Err(RhomutError::DeadlineExceeded(deadline))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::models::ModelKey;
    use crate::predictor::{DispersionTable, FittedScaler, Regressor};
    use crate::store::{ArtifactStore, ModelArtifacts};
    use serde_json::json;

    struct ConstantRegressor;

    impl Regressor for ConstantRegressor {
        fn predict(&self, _features: &[f64]) -> Result<f64> {
            Ok(1.0_f64.ln_1p())
        }
    }

    /// Store that blocks before serving artifacts
    struct SlowStore {
        delay: Duration,
    }

    impl ArtifactStore for SlowStore {
        fn load(&self, _key: ModelKey) -> Result<Arc<ModelArtifacts>> {
            std::thread::sleep(self.delay);
            let dispersion = DispersionTable::from_value(json!({
                "1.0": {"0.05": {"0.05": {"3.0": 0.3}}}
            }))
            .map_err(|e| RhomutError::Inference(e.to_string()))?;
            Ok(Arc::new(ModelArtifacts::new(
                Box::new(ConstantRegressor),
                Box::new(FittedScaler::identity(4)),
                dispersion,
            )))
        }
    }

    fn predictor(delay: Duration) -> Arc<Predictor> {
        Arc::new(Predictor::new("sa", true, Arc::new(SlowStore { delay })).unwrap())
    }

    #[tokio::test]
    async fn test_prediction_within_deadline() {
        let request = PredictionRequest::new(1.0, 0.05, 0.05, 3.0);
        let prediction = predict_with_deadline(predictor(Duration::ZERO), request, DEFAULT_DEADLINE)
            .await
            .unwrap();
        assert!((prediction.median() - 1.0).abs() < 1e-12);
        assert_eq!(prediction.dispersion(), 0.3);
    }

    #[tokio::test]
    async fn test_deadline_exceeded() {
        let request = PredictionRequest::new(1.0, 0.05, 0.05, 3.0);
        let result = predict_with_deadline(
            predictor(Duration::from_millis(500)),
            request,
            Duration::from_millis(20),
        )
        .await;
        assert!(matches!(result, Err(RhomutError::DeadlineExceeded(d)) if d == Duration::from_millis(20)));
    }
}
