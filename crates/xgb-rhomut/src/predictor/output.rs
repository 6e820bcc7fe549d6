//! Prediction output post-processing
//!
//! Converts raw regressor margins to strength ratios and applies the
//! low-ductility corrections where the model is not used.

use crate::models::{ModelSelector, PredictionResult, Quantity};

/// Below this dynamic ductility R is elastic and equal to the ductility
pub const ELASTIC_DUCTILITY_LIMIT: f64 = 1.0;

/// Below this dynamic ductility the rho models are replaced by the ductility
pub const LOW_DUCTILITY_LIMIT: f64 = 0.625;

/// Configuration for output formatting
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Dynamic ductility below which R short-circuits (default: 1.0)
    pub elastic_ductility_limit: f64,
    /// Dynamic ductility below which rho2/rho3 medians are overwritten (default: 0.625)
    pub low_ductility_limit: f64,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            elastic_ductility_limit: ELASTIC_DUCTILITY_LIMIT,
            low_ductility_limit: LOW_DUCTILITY_LIMIT,
        }
    }
}

/// Formats regressor outputs for one model selector
pub struct OutputFormatter {
    selector: ModelSelector,
    config: OutputConfig,
}

impl OutputFormatter {
    pub fn new(selector: ModelSelector) -> Self {
        Self {
            selector,
            config: OutputConfig::default(),
        }
    }

    pub fn with_config(selector: ModelSelector, config: OutputConfig) -> Self {
        Self { selector, config }
    }

    /// Result returned without running the regressor, if any.
    ///
    /// Non-collapse R below unit ductility is the elastic identity with no
    /// dispersion.
    pub fn elastic_shortcut(&self, dynamic_ductility: Option<f64>) -> Option<PredictionResult> {
        if self.selector.collapse || self.selector.quantity != Quantity::R {
            return None;
        }
        dynamic_ductility
            .filter(|d| *d < self.config.elastic_ductility_limit)
            .map(|d| PredictionResult {
                median: d,
                dispersion: 0.0,
            })
    }

    /// Median strength ratio from a `log1p`-space margin
    pub fn median(&self, margin: f64, dynamic_ductility: Option<f64>) -> f64 {
        let median = margin.exp_m1();

        if self.selector.collapse || self.selector.quantity == Quantity::R {
            return median;
        }
        match dynamic_ductility {
            Some(d) if d < self.config.low_ductility_limit => d,
            _ => median,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatter(quantity: Quantity, collapse: bool) -> OutputFormatter {
        OutputFormatter::new(ModelSelector { quantity, collapse })
    }

    #[test]
    fn test_elastic_shortcut_only_for_non_collapse_r() {
        let r = formatter(Quantity::R, false);
        assert_eq!(
            r.elastic_shortcut(Some(0.8)),
            Some(PredictionResult {
                median: 0.8,
                dispersion: 0.0
            })
        );
        assert_eq!(r.elastic_shortcut(Some(1.0)), None);

        assert_eq!(formatter(Quantity::R, true).elastic_shortcut(Some(0.8)), None);
        assert_eq!(formatter(Quantity::Rho2, false).elastic_shortcut(Some(0.8)), None);
    }

    #[test]
    fn test_log_space_inverse_transform() {
        let r = formatter(Quantity::R, false);
        let margin = 2.5_f64.ln_1p();
        assert!((r.median(margin, Some(3.0)) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_low_ductility_override_for_rho() {
        let rho = formatter(Quantity::Rho2, false);
        assert_eq!(rho.median(1.0, Some(0.5)), 0.5);
        assert!((rho.median(1.0, Some(0.7)) - 1.0_f64.exp_m1()).abs() < 1e-12);

        let r = formatter(Quantity::R, false);
        assert!((r.median(1.0, Some(0.5)) - 1.0_f64.exp_m1()).abs() < 1e-12);
    }

    #[test]
    fn test_collapse_ignores_dynamic_ductility() {
        let rho3 = formatter(Quantity::Rho3, true);
        assert!((rho3.median(0.5, Some(0.1)) - 0.5_f64.exp_m1()).abs() < 1e-12);
    }
}
