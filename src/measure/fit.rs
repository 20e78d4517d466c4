//! Shockley-model fit of a recorded sweep.
//!
//! The LED's forward characteristic `I = Is * (exp(V / (n * Vt)) - 1)`
//! linearizes to `ln I = ln Is + V / (n * Vt)` once the device conducts,
//! where the `-1` term is negligible. A least-squares line through
//! `(V, ln I)` therefore gives the ideality factor `n` from the slope and
//! the saturation current `Is` from the intercept. Points below a small
//! current floor are left out: `ln` is undefined at zero and the
//! linearization only holds in forward conduction.

use serde::Serialize;

use crate::measure::error::MeasureError;

/// Thermal voltage kT/e at 298.15 K, in volts.
pub const THERMAL_VOLTS: f64 = 0.025_692_58;

/// Current floor in milliamps below which a point is not considered to be in
/// forward conduction.
const CURRENT_FLOOR_MA: f64 = 1e-4;

/// Forward current of a Shockley diode at `volts`, in amps.
pub fn shockley_current(volts: f64, saturation_current_a: f64, ideality: f64) -> f64 {
    saturation_current_a * ((volts / (ideality * THERMAL_VOLTS)).exp() - 1.0)
}

/// One data row of a recorded sweep, reduced to the pair the fit needs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SweepPoint {
    /// Voltage across the LED, the `A1-A2` column.
    pub led_volts: f64,
    /// Estimated current, the `current (mA)` column.
    pub milliamps: f64,
}

/// Fitted diode parameters.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct LedFit {
    pub saturation_current_a: f64,
    pub ideality: f64,
    pub points_used: usize,
}

impl LedFit {
    /// Largest saturation current a real LED plausibly has.
    pub const MAX_SATURATION_A: f64 = 1e-6;
    /// Largest plausible ideality factor.
    pub const MAX_IDEALITY: f64 = 10.0;

    /// Whether the fitted parameters land in a plausible range for an LED.
    /// A fit outside it usually means the record was noise, or the probes
    /// were on the wrong device.
    pub fn in_physical_range(&self) -> bool {
        self.saturation_current_a > 0.0
            && self.saturation_current_a <= Self::MAX_SATURATION_A
            && self.ideality > 0.0
            && self.ideality <= Self::MAX_IDEALITY
    }
}

// Field positions within a record row, per the emitter's column order.
const LED_DROP_FIELD: usize = 9;
const CURRENT_FIELD: usize = 11;
const FIELD_COUNT: usize = 13;

/// Extracts the fit input from recorded sweep text.
///
/// The preamble (banner, instrument line) is skipped up to the column
/// header; the table ends at the first line that does not have the full
/// field count, which in a complete record is the completion line.
/// Non-finite values parse and pass through, the fit filters them later.
pub fn parse_sweep_csv(text: &str) -> Result<Vec<SweepPoint>, MeasureError> {
    let mut points = Vec::new();
    let mut in_table = false;
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if !in_table {
            in_table = line.starts_with("out,");
            continue;
        }
        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != FIELD_COUNT {
            break;
        }
        points.push(SweepPoint {
            led_volts: parse_field(fields[LED_DROP_FIELD], index)?,
            milliamps: parse_field(fields[CURRENT_FIELD], index)?,
        });
    }
    if !in_table {
        return Err(MeasureError::MalformedRecord {
            line: 0,
            reason: "no column header found".to_string(),
        });
    }
    Ok(points)
}

fn parse_field(field: &str, index: usize) -> Result<f64, MeasureError> {
    field.trim().parse().map_err(|_| MeasureError::MalformedRecord {
        line: index + 1,
        reason: format!("unreadable number {field:?}"),
    })
}

/// Fits the Shockley model to the forward-conduction part of a sweep.
pub fn fit_led(points: &[SweepPoint]) -> Result<LedFit, MeasureError> {
    let usable: Vec<(f64, f64)> = points
        .iter()
        .filter(|p| {
            p.led_volts.is_finite() && p.milliamps.is_finite() && p.milliamps > CURRENT_FLOOR_MA
        })
        .map(|p| (p.led_volts, (p.milliamps * 1e-3).ln()))
        .collect();
    if usable.len() < 2 {
        return Err(MeasureError::FitUnderdetermined(usable.len()));
    }

    let n = usable.len() as f64;
    let sum_v: f64 = usable.iter().map(|(v, _)| v).sum();
    let sum_y: f64 = usable.iter().map(|(_, y)| y).sum();
    let sum_vv: f64 = usable.iter().map(|(v, _)| v * v).sum();
    let sum_vy: f64 = usable.iter().map(|(v, y)| v * y).sum();
    let denom = n * sum_vv - sum_v * sum_v;
    if denom <= f64::EPSILON * n * sum_vv {
        return Err(MeasureError::FitDegenerate(
            "no voltage spread across usable points",
        ));
    }

    let slope = (n * sum_vy - sum_v * sum_y) / denom;
    if slope <= 0.0 {
        return Err(MeasureError::FitDegenerate(
            "current does not grow with voltage",
        ));
    }
    let intercept = (sum_y - slope * sum_v) / n;
    Ok(LedFit {
        saturation_current_a: intercept.exp(),
        ideality: 1.0 / (slope * THERMAL_VOLTS),
        points_used: usable.len(),
    })
}
