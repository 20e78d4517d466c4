//! Linear range mapping between converter codes and volts.

use crate::config::{ADC_MAX_COUNT, DAC_MAX_CODE, FULL_SCALE_VOLTS};

/// Re-maps `value` from the `from` range onto the `to` range.
///
/// Floating-point version of the classic `map` used on hobby boards: pure
/// linear interpolation with no clamping, so inputs outside the source range
/// extrapolate. A degenerate source range (equal bounds) divides by zero and
/// yields the IEEE result; every caller in this crate maps between fixed,
/// distinct bounds.
pub fn map_range(value: f64, from_low: f64, from_high: f64, to_low: f64, to_high: f64) -> f64 {
    to_low + (value - from_low) * (to_high - to_low) / (from_high - from_low)
}

/// Voltage a ramp step aims for: step `k` targets `k / 10` volts.
pub fn step_target_volts(step: u32) -> f64 {
    f64::from(step) / 10.0
}

/// 12-bit DAC code whose nominal output is a ramp step's target voltage.
pub fn dac_code_for_step(step: u32) -> u16 {
    let code = map_range(
        step_target_volts(step),
        0.0,
        FULL_SCALE_VOLTS,
        0.0,
        f64::from(DAC_MAX_CODE),
    );
    code.round() as u16
}

/// Converts a raw front-end count onto the 0 to 5 V scale.
pub fn counts_to_volts(counts: f64) -> f64 {
    map_range(counts, 0.0, f64::from(ADC_MAX_COUNT), 0.0, FULL_SCALE_VOLTS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::STEP_COUNT;

    #[test]
    fn map_range_hits_both_endpoints() {
        assert!((map_range(0.0, 0.0, 1023.0, 0.0, 5.0)).abs() < 1e-12);
        assert!((map_range(1023.0, 0.0, 1023.0, 0.0, 5.0) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn map_range_round_trips() {
        for value in [0.0, 0.1, 2.5, 4.99, 5.0, 7.3] {
            let mapped = map_range(value, 0.0, 5.0, 0.0, 4095.0);
            let back = map_range(mapped, 0.0, 4095.0, 0.0, 5.0);
            assert!((back - value).abs() < 1e-9, "value {value} came back as {back}");
        }
    }

    #[test]
    fn map_range_extrapolates_outside_source_range() {
        let mapped = map_range(6.0, 0.0, 5.0, 0.0, 1000.0);
        assert!((mapped - 1200.0).abs() < 1e-9);
    }

    #[test]
    fn ramp_endpoints_cover_the_full_dac_range() {
        assert_eq!(dac_code_for_step(0), 0);
        assert_eq!(dac_code_for_step(STEP_COUNT - 1), DAC_MAX_CODE);
    }

    #[test]
    fn dac_codes_are_monotonic() {
        let codes: Vec<u16> = (0..STEP_COUNT).map(dac_code_for_step).collect();
        assert!(codes.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn full_scale_count_reads_five_volts() {
        assert!((counts_to_volts(1023.0) - 5.0).abs() < 1e-12);
        assert!((counts_to_volts(0.0)).abs() < 1e-12);
    }
}
