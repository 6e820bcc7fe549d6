//! Core data models for strength ratio prediction

use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical quantity predicted by a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quantity {
    /// Strength ratio at first-mode spectral acceleration
    #[serde(rename = "R")]
    R,
    /// Average spectral acceleration ratio, non-collapse
    #[serde(rename = "ro_2")]
    Rho2,
    /// Average spectral acceleration ratio, collapse
    #[serde(rename = "ro_3")]
    Rho3,
}

impl Quantity {
    /// Parameter name used in artifact keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Quantity::R => "R",
            Quantity::Rho2 => "ro_2",
            Quantity::Rho3 => "ro_3",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Model selection resolved once from intensity measure type and collapse flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelSelector {
    pub quantity: Quantity,
    pub collapse: bool,
}

impl ModelSelector {
    pub fn key(&self) -> ModelKey {
        ModelKey {
            quantity: self.quantity,
            collapse: self.collapse,
        }
    }

    /// Number of features the regressor expects for this selector
    pub fn feature_count(&self) -> usize {
        if self.collapse {
            4
        } else {
            5
        }
    }
}

/// Key locating regressor, scaler and dispersion table, e.g. `ro_2_xgb`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelKey {
    pub quantity: Quantity,
    pub collapse: bool,
}

impl ModelKey {
    pub fn feature_count(&self) -> usize {
        ModelSelector {
            quantity: self.quantity,
            collapse: self.collapse,
        }
        .feature_count()
    }
}

impl fmt::Display for ModelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_xgb", self.quantity)?;
        if self.collapse {
            f.write_str("_collapse")?;
        }
        Ok(())
    }
}

/// The three resources stored per model key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactResource {
    Regressor,
    Scaler,
    Dispersion,
}

impl fmt::Display for ArtifactResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ArtifactResource::Regressor => "regressor",
            ArtifactResource::Scaler => "scaler",
            ArtifactResource::Dispersion => "dispersion",
        };
        f.write_str(name)
    }
}

/// Physical inputs subject to recommended-domain checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputParameter {
    Period,
    Damping,
    HardeningRatio,
    Ductility,
}

impl InputParameter {
    /// Domain covered by the training data
    pub fn recommended_range(&self) -> (f64, f64) {
        match self {
            InputParameter::Period => (0.01, 3.0),
            InputParameter::Damping => (0.02, 0.2),
            InputParameter::HardeningRatio => (0.02, 0.07),
            InputParameter::Ductility => (2.0, 8.0),
        }
    }
}

impl fmt::Display for InputParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputParameter::Period => "period",
            InputParameter::Damping => "damping",
            InputParameter::HardeningRatio => "hardening_ratio",
            InputParameter::Ductility => "ductility",
        };
        f.write_str(name)
    }
}

/// A single prediction request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// Period in seconds
    pub period: f64,
    /// Damping ratio
    pub damping: f64,
    /// Post-yield hardening ratio
    pub hardening_ratio: f64,
    /// Hardening ductility (capacity) of the system
    pub ductility: f64,
    /// Ductility at which the strength ratio is predicted (forward mode)
    #[serde(default)]
    pub dynamic_ductility: Option<f64>,
    /// Target strength ratio; when present the ductility is estimated instead
    #[serde(default)]
    pub strength_ratio: Option<f64>,
}

impl PredictionRequest {
    pub fn new(period: f64, damping: f64, hardening_ratio: f64, ductility: f64) -> Self {
        Self {
            period,
            damping,
            hardening_ratio,
            ductility,
            dynamic_ductility: None,
            strength_ratio: None,
        }
    }

    pub fn with_dynamic_ductility(mut self, dynamic_ductility: f64) -> Self {
        self.dynamic_ductility = Some(dynamic_ductility);
        self
    }

    pub fn with_strength_ratio(mut self, strength_ratio: f64) -> Self {
        self.strength_ratio = Some(strength_ratio);
        self
    }

    /// Which mode the request resolves to; a target strength ratio wins
    pub fn mode(&self) -> PredictionMode {
        if self.strength_ratio.is_some() {
            PredictionMode::Inverse
        } else {
            PredictionMode::Forward
        }
    }

    /// Dynamic ductility, treating zero as absent
    pub fn supplied_dynamic_ductility(&self) -> Option<f64> {
        self.dynamic_ductility.filter(|d| *d != 0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionMode {
    /// Strength ratio from dynamic ductility
    Forward,
    /// Dynamic ductility from target strength ratio
    Inverse,
}

impl fmt::Display for PredictionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictionMode::Forward => f.write_str("forward"),
            PredictionMode::Inverse => f.write_str("inverse"),
        }
    }
}

/// Output record: `median` is the strength ratio in forward mode and the
/// estimated dynamic ductility in inverse mode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    #[serde(alias = "strength_ratio")]
    pub median: f64,
    pub dispersion: f64,
}

/// Advisory condition raised during a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// Input outside the domain covered by the training data
    OutOfRange {
        parameter: InputParameter,
        value: f64,
        min: f64,
        max: f64,
    },
    /// Dispersion interpolated to zero or NaN; maximum dispersion used instead
    UnattainableDuctility {
        dynamic_ductility: f64,
        fallback_dispersion: f64,
    },
    /// Target strength ratio moved into the achievable median range
    TargetClamped { requested: f64, clamped: f64 },
    /// Median curve decreases somewhere on the swept grid
    NonMonotonicCurve { dynamic_ductility: f64 },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::OutOfRange {
                parameter,
                value,
                min,
                max,
            } => write!(
                f,
                "{parameter} = {value} is outside the recommended range [{min}, {max}]"
            ),
            Diagnostic::UnattainableDuctility {
                dynamic_ductility,
                fallback_dispersion,
            } => write!(
                f,
                "dynamic ductility {dynamic_ductility} is not attainable for the given inputs, \
                 using maximum dispersion {fallback_dispersion}"
            ),
            Diagnostic::TargetClamped { requested, clamped } => write!(
                f,
                "strength ratio {requested} is outside the achievable range, clamped to {clamped}"
            ),
            Diagnostic::NonMonotonicCurve { dynamic_ductility } => write!(
                f,
                "median curve decreases at dynamic ductility {dynamic_ductility}, \
                 using the first crossing"
            ),
        }
    }
}

/// Prediction result together with the warnings raised while producing it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub result: PredictionResult,
    pub mode: PredictionMode,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl Prediction {
    pub fn median(&self) -> f64 {
        self.result.median
    }

    pub fn dispersion(&self) -> f64 {
        self.result.dispersion
    }

    pub fn has_warnings(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Feature vector for regressor input, in model order
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub period: f64,
    pub damping: f64,
    pub hardening_ratio: f64,
    pub ductility: f64,
    /// Present only for non-collapse models
    pub actual_ductility_end: Option<f64>,
}

impl FeatureVector {
    /// Flatten to `[period, damping, hardening_ratio, ductility, actual_ductility_end?]`
    pub fn to_vec(&self) -> Vec<f64> {
        let mut values = vec![self.period, self.damping, self.hardening_ratio, self.ductility];
        if let Some(end) = self.actual_ductility_end {
            values.push(end);
        }
        values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_key_format() {
        let key = ModelKey {
            quantity: Quantity::Rho2,
            collapse: false,
        };
        assert_eq!(key.to_string(), "ro_2_xgb");

        let key = ModelKey {
            quantity: Quantity::R,
            collapse: true,
        };
        assert_eq!(key.to_string(), "R_xgb_collapse");
    }

    #[test]
    fn test_request_mode_prefers_strength_ratio() {
        let request = PredictionRequest::new(1.0, 0.05, 0.05, 3.0)
            .with_dynamic_ductility(2.0)
            .with_strength_ratio(1.5);
        assert_eq!(request.mode(), PredictionMode::Inverse);

        let request = PredictionRequest::new(1.0, 0.05, 0.05, 3.0).with_dynamic_ductility(2.0);
        assert_eq!(request.mode(), PredictionMode::Forward);
    }

    #[test]
    fn test_zero_dynamic_ductility_is_absent() {
        let request = PredictionRequest::new(1.0, 0.05, 0.05, 3.0).with_dynamic_ductility(0.0);
        assert_eq!(request.supplied_dynamic_ductility(), None);
    }

    #[test]
    fn test_feature_vector_order() {
        let features = FeatureVector {
            period: 1.0,
            damping: 0.05,
            hardening_ratio: 0.02,
            ductility: 4.0,
            actual_ductility_end: Some(3.0),
        };
        assert_eq!(features.to_vec(), vec![1.0, 0.05, 0.02, 4.0, 3.0]);

        let collapse = FeatureVector {
            actual_ductility_end: None,
            ..features
        };
        assert_eq!(collapse.to_vec().len(), 4);
    }

    #[test]
    fn test_result_accepts_strength_ratio_alias() {
        let result: PredictionResult =
            serde_json::from_str(r#"{"strength_ratio": 2.5, "dispersion": 0.3}"#).unwrap();
        assert_eq!(result.median, 2.5);

        let json = serde_json::to_value(result).unwrap();
        assert!(json.get("median").is_some());
        assert!(json.get("strength_ratio").is_none());
    }
}
