//! Feature construction and scaling for regressor input
//!
//! Features are always ordered `[period, damping, hardening_ratio,
//! ductility]`, with `actual_ductility_end` appended for non-collapse
//! models. Scalers are the fitted parameters of a standard or min-max
//! scaler, stored as JSON next to the regressor.

use crate::error::{Result, RhomutError};
use crate::models::{FeatureVector, ModelSelector, PredictionRequest};
use serde::{Deserialize, Serialize};

/// Builds model-ordered feature vectors for one selector
pub struct FeatureExtractor {
    selector: ModelSelector,
}

impl FeatureExtractor {
    pub fn new(selector: ModelSelector) -> Self {
        Self { selector }
    }

    /// Feature vector for `request` evaluated at `dynamic_ductility`.
    ///
    /// Collapse models ignore the dynamic ductility.
    pub fn extract(&self, request: &PredictionRequest, dynamic_ductility: Option<f64>) -> FeatureVector {
        FeatureVector {
            period: request.period,
            damping: request.damping,
            hardening_ratio: request.hardening_ratio,
            ductility: request.ductility,
            actual_ductility_end: if self.selector.collapse {
                None
            } else {
                dynamic_ductility
            },
        }
    }

    pub fn feature_count(&self) -> usize {
        self.selector.feature_count()
    }
}

/// Fitted feature transform applied before regression
pub trait FeatureScaler: Send + Sync {
    fn transform(&self, features: &[f64]) -> Result<Vec<f64>>;
}

/// Zero-mean, unit-variance scaling: `(x - mean) / scale`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Range scaling: `x * scale + min`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    pub min: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Any supported scaler, distinguished by its field names
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FittedScaler {
    Standard(StandardScaler),
    MinMax(MinMaxScaler),
}

impl FittedScaler {
    /// Scaler that leaves features unchanged
    pub fn identity(feature_count: usize) -> Self {
        FittedScaler::Standard(StandardScaler {
            mean: vec![0.0; feature_count],
            scale: vec![1.0; feature_count],
        })
    }

    pub fn from_json(bytes: &[u8]) -> anyhow::Result<Self> {
        let scaler: FittedScaler = serde_json::from_slice(bytes)?;
        let (offsets, scales) = scaler.parameters();
        if offsets.len() != scales.len() {
            anyhow::bail!(
                "scaler has {} offsets but {} scales",
                offsets.len(),
                scales.len()
            );
        }
        Ok(scaler)
    }

    pub fn feature_count(&self) -> usize {
        self.parameters().0.len()
    }

    fn parameters(&self) -> (&[f64], &[f64]) {
        match self {
            FittedScaler::Standard(s) => (&s.mean, &s.scale),
            FittedScaler::MinMax(s) => (&s.min, &s.scale),
        }
    }
}

impl FeatureScaler for FittedScaler {
    fn transform(&self, features: &[f64]) -> Result<Vec<f64>> {
        let expected = self.feature_count();
        if features.len() != expected {
            return Err(RhomutError::Inference(format!(
                "scaler expects {} features, got {}",
                expected,
                features.len()
            )));
        }

        let scaled = match self {
            FittedScaler::Standard(s) => features
                .iter()
                .zip(s.mean.iter().zip(&s.scale))
                .map(|(x, (mean, scale))| {
                    // Constant features are fitted with scale 0; treat as 1
                    let scale = if *scale == 0.0 { 1.0 } else { *scale };
                    (x - mean) / scale
                })
                .collect(),
            FittedScaler::MinMax(s) => features
                .iter()
                .zip(s.min.iter().zip(&s.scale))
                .map(|(x, (min, scale))| x * scale + min)
                .collect(),
        };
        Ok(scaled)
    }
}
