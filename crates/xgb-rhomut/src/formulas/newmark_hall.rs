//! Newmark and Hall (1982)
//!
//! Earthquake Spectra and Design. Earthquake Engineering Research
//! Institute, Berkeley, CA.

/// Start of the amplified acceleration range
pub const PERIOD_A: f64 = 1.0 / 33.0;
/// End of the transition to the amplified acceleration range
pub const PERIOD_B: f64 = 0.125;

/// Strength ratio for ductility `mu`.
///
/// `period_cc` is Tc' in the article and `period_c` the corner period where
/// the acceleration range transitions to the velocity range.
pub fn strength_ratio(mu: f64, period: f64, period_cc: f64, period_c: f64) -> f64 {
    if period < PERIOD_A {
        1.0
    } else if period <= PERIOD_B {
        let beta = (period / PERIOD_A).ln() / (PERIOD_B / PERIOD_A).ln();
        (2.0 * mu - 1.0).powf(0.5 * beta)
    } else if period <= period_cc {
        (2.0 * mu - 1.0).sqrt()
    } else if period <= period_c {
        (period / period_c) * mu
    } else {
        mu
    }
}
