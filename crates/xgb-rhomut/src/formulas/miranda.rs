//! Miranda and Bertero (1994)
//!
//! Evaluation of strength reduction factors for earthquake-resistant design.
//! Earthquake Spectra 10(2), 357-379. DOI: 10.1193/1.1585778

use crate::error::{Result, RhomutError};
use std::str::FromStr;

/// Site classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteType {
    Rock,
    SoftSoil,
    Alluvium,
}

impl FromStr for SiteType {
    type Err = RhomutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "rock" => Ok(SiteType::Rock),
            "soft-soil" => Ok(SiteType::SoftSoil),
            "alluvium" => Ok(SiteType::Alluvium),
            _ => Err(RhomutError::invalid(format!(
                "site must be 'rock', 'soft-soil' or 'alluvium', got '{s}'"
            ))),
        }
    }
}

fn phi(mu: f64, period: f64, site: SiteType, period_g: f64) -> f64 {
    match site {
        SiteType::Rock => {
            1.0 + 1.0 / (10.0 * period - mu * period)
                - 1.0 / (2.0 * period) * (-1.5 * (period.ln() - 0.6).powi(2)).exp()
        }
        SiteType::SoftSoil => {
            1.0 + 1.0 / (12.0 * period - mu * period)
                - 2.0 / (5.0 * period) * (-2.0 * (period.ln() - 0.2).powi(2)).exp()
        }
        SiteType::Alluvium => {
            1.0 + period_g / (3.0 * period)
                - 3.0 * period_g / (4.0 * period)
                    * (-3.0 * ((period / period_g).ln() - 0.25).powi(2)).exp()
        }
    }
}

/// Strength ratio for ductility `mu`, never below 1.
///
/// `period_g` is the predominant ground-motion period and only affects
/// alluvium sites.
pub fn strength_ratio(mu: f64, period: f64, site: SiteType, period_g: f64) -> f64 {
    let r = (mu - 1.0) / phi(mu, period, site, period_g) + 1.0;
    r.max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_sites_give_positive_ratio() {
        for site in ["rock", "soft-soil", "alluvium"] {
            let site: SiteType = site.parse().unwrap();
            assert!(strength_ratio(3.0, 1.0, site, 1.0) >= 1.0);
        }
    }

    #[test]
    fn test_unknown_site_rejected() {
        assert!("".parse::<SiteType>().unwrap_err().is_invalid_argument());
        assert!("clay".parse::<SiteType>().is_err());
    }

    #[test]
    fn test_ratio_clamped_to_one() {
        for period in [0.05, 0.1, 0.5, 1.0, 2.0, 4.0] {
            for site in [SiteType::Rock, SiteType::SoftSoil, SiteType::Alluvium] {
                assert!(strength_ratio(1.2, period, site, 1.0) >= 1.0);
            }
        }
    }
}
