//! Vidic, Fajfar and Fischinger (1994)
//!
//! Consistent inelastic design spectra: strength and displacement.
//! Earthquake Engineering & Structural Dynamics 23(5), 507-521.
//! DOI: 10.1002/eqe.4290230504

// Bilinear, instantaneous stiffness row of Table II
const C1: f64 = 1.1;
const C_R: f64 = 0.95;
const C2: f64 = 0.75;
const C_T: f64 = 0.2;

/// Strength ratio for ductility `mu`; `period_c` is T1 in the article
pub fn strength_ratio(mu: f64, period: f64, period_c: f64) -> f64 {
    let period_0 = C2 * mu.powf(C_T) * period_c;
    let plateau = C1 * (mu - 1.0).powf(C_R);

    if period < period_0 {
        plateau * (period / period_0) + 1.0
    } else {
        plateau + 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_period() {
        assert_eq!(strength_ratio(5.0, 0.5, 1.0).round(), 3.0);
    }

    #[test]
    fn test_long_period() {
        assert_eq!(strength_ratio(5.0, 1.5, 1.0).round(), 5.0);
    }

    #[test]
    fn test_unit_ductility_is_elastic() {
        assert_eq!(strength_ratio(1.0, 0.3, 0.5), 1.0);
    }
}
