//! Eurocode 8 Part 1, Annex B
//!
//! CEN (2004). EN 1998-1:2004, Design of structures for earthquake
//! resistance. Part 1: General rules, seismic actions and rules for buildings.

/// Strength ratio for ductility `mu` at `period`, with corner period `period_c`
pub fn strength_ratio(mu: f64, period: f64, period_c: f64) -> f64 {
    if period < period_c {
        (mu - 1.0) * (period / period_c) + 1.0
    } else {
        mu
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_period_branch() {
        assert_eq!(strength_ratio(3.0, 0.5, 1.0), 2.0);
    }

    #[test]
    fn test_plateau_from_corner_period() {
        assert_eq!(strength_ratio(3.0, 1.0, 1.0), 3.0);
        assert_eq!(strength_ratio(3.0, 1.5, 1.0), 3.0);
    }
}
