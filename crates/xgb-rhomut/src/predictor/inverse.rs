//! Inverse ductility estimation
//!
//! The forward model is evaluated over a fixed dynamic-ductility grid and the
//! resulting median curve is inverted by linear interpolation. Where the curve
//! is not monotonic the first crossing of the target is used.

use crate::models::Diagnostic;

/// First dynamic ductility of the sweep
pub const SWEEP_START: f64 = 0.05;
/// Spacing of the sweep
pub const SWEEP_STEP: f64 = 0.1;
/// Number of sweep points, covering 0.05 to 11.95
pub const SWEEP_POINTS: usize = 120;

/// Dynamic ductilities evaluated during inversion
pub fn ductility_grid() -> Vec<f64> {
    (0..SWEEP_POINTS)
        .map(|i| SWEEP_START + i as f64 * SWEEP_STEP)
        .collect()
}

/// Forward median and dispersion sampled over the ductility grid
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseCurve {
    ductility: Vec<f64>,
    median: Vec<f64>,
    dispersion: Vec<f64>,
}

/// Outcome of inverting a response curve at a target median
#[derive(Debug, Clone, PartialEq)]
pub struct CurveInversion {
    pub ductility: f64,
    pub dispersion: f64,
    pub diagnostics: Vec<Diagnostic>,
}

impl ResponseCurve {
    pub fn with_capacity(points: usize) -> Self {
        Self {
            ductility: Vec::with_capacity(points),
            median: Vec::with_capacity(points),
            dispersion: Vec::with_capacity(points),
        }
    }

    pub fn push(&mut self, ductility: f64, median: f64, dispersion: f64) {
        self.ductility.push(ductility);
        self.median.push(median);
        self.dispersion.push(dispersion);
    }

    pub fn len(&self) -> usize {
        self.ductility.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ductility.is_empty()
    }

    pub fn medians(&self) -> &[f64] {
        &self.median
    }

    /// Smallest and largest median on the curve
    pub fn median_range(&self) -> Option<(f64, f64)> {
        let finite = self.median.iter().copied().filter(|m| m.is_finite());
        finite.fold(None, |range, m| match range {
            None => Some((m, m)),
            Some((lo, hi)) => Some((lo.min(m), hi.max(m))),
        })
    }

    /// Ductility at which the median first decreases, if it ever does
    pub fn first_decrease(&self) -> Option<f64> {
        self.median
            .windows(2)
            .position(|w| w[1] < w[0])
            .map(|i| self.ductility[i + 1])
    }

    /// Ductility and dispersion at which the median reaches `target`.
    ///
    /// Targets outside the achievable range are clamped to it. Returns `None`
    /// for a curve without finite medians.
    pub fn invert(&self, target: f64) -> Option<CurveInversion> {
        let (lo, hi) = self.median_range()?;
        let mut diagnostics = Vec::new();

        let clamped = target.clamp(lo, hi);
        if clamped != target {
            diagnostics.push(Diagnostic::TargetClamped {
                requested: target,
                clamped,
            });
        }
        if let Some(ductility) = self.first_decrease() {
            diagnostics.push(Diagnostic::NonMonotonicCurve {
                dynamic_ductility: ductility,
            });
        }

        let (ductility, dispersion) = self.interpolate_at(clamped)?;
        Some(CurveInversion {
            ductility,
            dispersion,
            diagnostics,
        })
    }

    fn interpolate_at(&self, target: f64) -> Option<(f64, f64)> {
        let crossing = self.median.windows(2).position(|w| {
            let (lo, hi) = if w[0] <= w[1] { (w[0], w[1]) } else { (w[1], w[0]) };
            lo <= target && target <= hi
        });

        match crossing {
            Some(i) => {
                let (m0, m1) = (self.median[i], self.median[i + 1]);
                let t = if m1 == m0 { 0.0 } else { (target - m0) / (m1 - m0) };
                let lerp = |a: &[f64]| a[i] + t * (a[i + 1] - a[i]);
                Some((lerp(&self.ductility), lerp(&self.dispersion)))
            }
            // Single point, or the target only matches an isolated sample
            None => self
                .median
                .iter()
                .position(|m| *m == target)
                .map(|i| (self.ductility[i], self.dispersion[i])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linear_curve() -> ResponseCurve {
        let mut curve = ResponseCurve::with_capacity(SWEEP_POINTS);
        for d in ductility_grid() {
            curve.push(d, 0.8 * d + 0.3, 0.1 + 0.01 * d);
        }
        curve
    }

    #[test]
    fn test_grid_spans_sweep() {
        let grid = ductility_grid();
        assert_eq!(grid.len(), 120);
        assert!((grid[0] - 0.05).abs() < 1e-12);
        assert!((grid[119] - 11.95).abs() < 1e-9);
    }

    #[test]
    fn test_invert_linear_curve() {
        let inversion = linear_curve().invert(3.0).unwrap();
        assert!((inversion.ductility - 3.375).abs() < 1e-9);
        assert!((inversion.dispersion - (0.1 + 0.03375)).abs() < 1e-9);
        assert!(inversion.diagnostics.is_empty());
    }

    #[test]
    fn test_target_clamped_to_range() {
        let curve = linear_curve();
        let high = curve.invert(100.0).unwrap();
        assert!((high.ductility - 11.95).abs() < 1e-9);
        assert!(matches!(
            high.diagnostics[0],
            Diagnostic::TargetClamped { requested, .. } if requested == 100.0
        ));

        let low = curve.invert(0.0).unwrap();
        assert!((low.ductility - 0.05).abs() < 1e-9);
    }

    #[test]
    fn test_non_monotonic_uses_first_crossing() {
        let mut curve = ResponseCurve::with_capacity(4);
        curve.push(1.0, 1.0, 0.1);
        curve.push(2.0, 3.0, 0.2);
        curve.push(3.0, 2.0, 0.3);
        curve.push(4.0, 4.0, 0.4);

        let inversion = curve.invert(2.5).unwrap();
        assert!((inversion.ductility - 1.75).abs() < 1e-12);
        assert!(inversion
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::NonMonotonicCurve { dynamic_ductility } if *dynamic_ductility == 3.0)));
    }

    #[test]
    fn test_flat_curve_returns_first_point() {
        let mut curve = ResponseCurve::with_capacity(3);
        curve.push(1.0, 2.0, 0.1);
        curve.push(2.0, 2.0, 0.2);
        curve.push(3.0, 2.0, 0.3);
        let inversion = curve.invert(5.0).unwrap();
        assert_eq!(inversion.ductility, 1.0);
        assert_eq!(inversion.dispersion, 0.1);
    }

    #[test]
    fn test_empty_curve() {
        assert!(ResponseCurve::with_capacity(0).invert(1.0).is_none());
    }
}
