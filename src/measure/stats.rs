//! Reduction of raw readings to per-channel statistics.

use crate::measure::error::MeasureError;
use crate::measure::ranging::counts_to_volts;

/// Mean and spread of one channel's readings at one ramp step, in volts.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampleStats {
    pub mean: f64,
    pub std_dev: f64,
}

impl SampleStats {
    /// Reduces a burst of raw 10-bit counts to voltage statistics.
    ///
    /// The spread is the population standard deviation (divide by N): the
    /// burst is the entire population of interest at that step, not a sample
    /// of a larger one. Both the mean and the deviation go through the same
    /// count-to-volt map; with both ranges anchored at zero that map is a
    /// pure scale factor, so scaling the deviation with it is exact.
    pub fn from_raw(readings: &[u16]) -> Result<Self, MeasureError> {
        if readings.is_empty() {
            return Err(MeasureError::EmptySampleSet);
        }
        let n = readings.len() as f64;
        let mean = readings.iter().map(|&r| f64::from(r)).sum::<f64>() / n;
        let variance = readings
            .iter()
            .map(|&r| {
                let d = f64::from(r) - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        Ok(SampleStats {
            mean: counts_to_volts(mean),
            std_dev: counts_to_volts(variance.sqrt()),
        })
    }
}
