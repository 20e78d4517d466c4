//! Channel differences and current estimation with propagated uncertainty.
//!
//! Two voltage drops are formed at every ramp step, resistor drop `A0 - A1`
//! and LED drop `A1 - A2`, each carrying an error figure derived from the
//! per-channel spreads. The resistor drop then turns into a current through
//! Ohm's law, with the resistor's own tolerance folded in by the quotient
//! rule.

use crate::measure::stats::SampleStats;

/// How the spread of two channels is carried into their difference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ErrorModel {
    /// The bench's historical rule: each channel's deviation is weighted by
    /// that channel's own mean, `sqrt(mean_a^2 * sd_a^2 + mean_b^2 * sd_b^2)`.
    /// That is the propagation form for a product applied to a difference, so
    /// the weighting has no textbook basis here, but every dataset on file
    /// was produced with it. It stays the default so new runs remain
    /// comparable with old ones.
    #[default]
    MeanWeighted,
    /// Textbook rule for a difference of independent quantities,
    /// `sqrt(sd_a^2 + sd_b^2)`.
    Quadrature,
}

impl ErrorModel {
    pub fn label(self) -> &'static str {
        match self {
            ErrorModel::MeanWeighted => "mean-weighted",
            ErrorModel::Quadrature => "quadrature",
        }
    }
}

/// Difference of two channel means with its propagated error, in volts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DiffStats {
    pub diff: f64,
    pub error: f64,
}

/// Ohm's-law current through the series resistor, in milliamps.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CurrentEstimate {
    pub milliamps: f64,
    pub error: f64,
}

/// Subtracts channel `b` from channel `a` and propagates their spreads.
pub fn combine(a: SampleStats, b: SampleStats, model: ErrorModel) -> DiffStats {
    let error = match model {
        ErrorModel::MeanWeighted => {
            (a.mean * a.mean * a.std_dev * a.std_dev + b.mean * b.mean * b.std_dev * b.std_dev)
                .sqrt()
        }
        ErrorModel::Quadrature => (a.std_dev * a.std_dev + b.std_dev * b.std_dev).sqrt(),
    };
    DiffStats {
        diff: a.mean - b.mean,
        error,
    }
}

/// Converts the resistor drop to a current in milliamps.
///
/// The relative errors of the voltage drop and of the resistance add in
/// quadrature. A zero drop makes the relative error divide by zero; the
/// resulting NaN or infinity is returned untouched so a degenerate step is
/// visible in the record rather than silently rewritten.
pub fn estimate_current(drop: DiffStats, resistance_ohms: f64, tolerance: f64) -> CurrentEstimate {
    let milliamps = drop.diff / resistance_ohms * 1000.0;
    let resistance_err = resistance_ohms * tolerance;
    let relative =
        ((drop.error / drop.diff).powi(2) + (resistance_err / resistance_ohms).powi(2)).sqrt();
    CurrentEstimate {
        milliamps,
        error: milliamps * relative,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RESISTOR_OHMS, RESISTOR_TOLERANCE};

    fn stats(mean: f64, std_dev: f64) -> SampleStats {
        SampleStats { mean, std_dev }
    }

    #[test]
    fn mean_weighted_difference_matches_hand_computation() {
        let a = stats(2.5, 0.01);
        let b = stats(2.0, 0.01);
        let d = combine(a, b, ErrorModel::MeanWeighted);
        assert!((d.diff - 0.5).abs() < 1e-12);
        // sqrt(2.5^2 * 0.01^2 + 2.0^2 * 0.01^2) = sqrt(0.001025)
        assert!((d.error - 0.001_025_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn quadrature_difference_ignores_the_means() {
        let a = stats(2.5, 0.01);
        let b = stats(2.0, 0.01);
        let d = combine(a, b, ErrorModel::Quadrature);
        assert!((d.diff - 0.5).abs() < 1e-12);
        assert!((d.error - 0.000_2_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn identical_channels_cancel() {
        let a = stats(3.3, 0.02);
        let d = combine(a, a, ErrorModel::MeanWeighted);
        assert_eq!(d.diff, 0.0);
        assert!(d.error > 0.0);
    }

    #[test]
    fn current_estimate_matches_hand_computation() {
        let drop = DiffStats {
            diff: 1.0,
            error: 0.02,
        };
        let current = estimate_current(drop, RESISTOR_OHMS, RESISTOR_TOLERANCE);
        let expected_ma = 1.0 / 218.3 * 1000.0;
        assert!((current.milliamps - expected_ma).abs() < 1e-9);
        let expected_rel = (0.02_f64.powi(2) + 0.005_f64.powi(2)).sqrt();
        assert!((current.error - expected_ma * expected_rel).abs() < 1e-9);
    }

    #[test]
    fn zero_drop_yields_zero_current_and_undefined_error() {
        let drop = DiffStats {
            diff: 0.0,
            error: 0.01,
        };
        let current = estimate_current(drop, RESISTOR_OHMS, RESISTOR_TOLERANCE);
        assert_eq!(current.milliamps, 0.0);
        assert!(current.error.is_nan());
    }

    #[test]
    fn zero_error_on_a_zero_drop_is_also_undefined() {
        // 0 / 0 inside the relative term, not 0 * inf
        let drop = DiffStats {
            diff: 0.0,
            error: 0.0,
        };
        let current = estimate_current(drop, RESISTOR_OHMS, RESISTOR_TOLERANCE);
        assert_eq!(current.milliamps, 0.0);
        assert!(current.error.is_nan());
    }
}
