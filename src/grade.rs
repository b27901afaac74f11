//! # Grade Module
//!
//! Turns measured gaps into grades in [0, 1].
//!
//! ## Purpose
//! Each gap is mapped to an impact that decreases linearly from 1 (no gap)
//! to 0 (gap at its maximum). Impacts are combined by a weighted geometric
//! mean, so any single impact at 0 sinks the whole grade.
//!
//! ## Related Modules
//! - `config` - supplies the gap maxima per profile
//! - `inters` - every scorer builds its relation grade here

use crate::config::ConnectionConstants;

/// Impact of a non-negative gap against its maximum
///
/// A zero or negative maximum accepts only a null gap.
pub fn gap_impact(gap: f64, max: f64) -> f64 {
    let gap = gap.abs();
    if max <= 0.0 {
        return if gap == 0.0 { 1.0 } else { 0.0 };
    }
    (1.0 - gap / max).clamp(0.0, 1.0)
}

/// Weighted geometric mean of (impact, weight) pairs
pub fn weighted_mean(impacts: &[(f64, f64)]) -> f64 {
    let total: f64 = impacts.iter().map(|(_, w)| *w).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let mut product = 1.0;
    for (value, weight) in impacts {
        product *= value.clamp(0.0, 1.0).powf(*weight);
    }
    product.powf(1.0 / total).clamp(0.0, 1.0)
}

/// Grade of a connection with a stem
///
/// `x_gap` is signed: negative values are overlaps measured against the
/// "in" maximum, positive values are gaps measured against the "out"
/// maximum. `y_gap` is measured along the stem.
pub fn connection_grade(
    constants: &ConnectionConstants,
    profile: usize,
    x_gap: f64,
    y_gap: f64,
) -> f64 {
    let x_impact = if x_gap < 0.0 {
        gap_impact(-x_gap, constants.x_in_gap_max.at(profile))
    } else {
        gap_impact(x_gap, constants.x_out_gap_max.at(profile))
    };
    let y_impact = gap_impact(y_gap, constants.y_gap_max.at(profile));
    weighted_mean(&[(x_impact, constants.x_weight), (y_impact, constants.y_weight)])
}

/// Contextual grade of an inter supported by relations
///
/// Each support with grade `g` and coefficient `c` multiplies a ratio by
/// `1 + c * g`; the result is `ratio * grade / (1 - grade + ratio * grade)`.
pub fn contextual(grade: f64, supports: &[(f64, f64)]) -> f64 {
    let ratio: f64 = supports
        .iter()
        .map(|(coeff, rel_grade)| 1.0 + coeff * rel_grade)
        .product();
    let den = 1.0 - grade + ratio * grade;
    if den <= 0.0 {
        grade
    } else {
        (ratio * grade / den).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gap_impact_is_decreasing() {
        assert_eq!(gap_impact(0.0, 0.5), 1.0);
        assert_eq!(gap_impact(0.25, 0.5), 0.5);
        assert_eq!(gap_impact(0.5, 0.5), 0.0);
        assert_eq!(gap_impact(1.0, 0.5), 0.0);
        assert_eq!(gap_impact(0.0, 0.0), 1.0);
    }

    #[test]
    fn test_weighted_mean() {
        assert!((weighted_mean(&[(0.25, 1.0), (1.0, 1.0)]) - 0.5).abs() < 1e-9);
        assert_eq!(weighted_mean(&[(0.0, 1.0), (1.0, 3.0)]), 0.0);
        assert_eq!(weighted_mean(&[]), 0.0);
    }

    #[test]
    fn test_connection_grade_in_and_out() {
        let c = ConnectionConstants::default();
        let perfect = connection_grade(&c, 0, 0.0, 0.0);
        let overlap = connection_grade(&c, 0, -0.1, 0.0);
        let far = connection_grade(&c, 0, 0.15, 0.0);
        assert_eq!(perfect, 1.0);
        assert!(overlap < perfect && overlap > 0.0);
        assert_eq!(far, 0.0);
    }

    #[test]
    fn test_contextual_grade_bounds() {
        assert_eq!(contextual(0.5, &[]), 0.5);
        let boosted = contextual(0.5, &[(4.0, 0.8)]);
        assert!(boosted > 0.5 && boosted <= 1.0);
        assert_eq!(contextual(1.0, &[(10.0, 1.0)]), 1.0);
    }
}
