// src/config.rs
//! Fixed parameters of the LED I-V bench.
//!
//! Everything here is a build-time property of the physical rig: the series
//! resistor soldered between the DAC output and the LED, the MCP4725 on the
//! I2C bus, the 10-bit analog front end, and the pacing of the ramp. Nothing
//! in this module is meant to change between runs; runtime flags only pick
//! the backend and the output sink.

use std::time::Duration;

/// Series resistor (ohms), measured with the bench meter rather than trusted
/// from the color bands.
pub const RESISTOR_OHMS: f64 = 218.3;
/// Manufacturer tolerance of the series resistor, as a fraction.
pub const RESISTOR_TOLERANCE: f64 = 0.005;
/// I2C address of the MCP4725 DAC on the bridge board.
pub const DAC_ADDRESS: u8 = 0x60;
/// Highest DAC output code (12-bit converter).
pub const DAC_MAX_CODE: u16 = 4095;
/// Highest raw count the analog front end returns (10-bit converter).
pub const ADC_MAX_COUNT: u16 = 1023;
/// Front-end full scale: raw counts map linearly onto [0, 5.0] volts.
pub const FULL_SCALE_VOLTS: f64 = 5.0;
/// Ramp length. Step `k` targets `k / 10` volts, so 51 steps cover 0 to 5 V
/// in 0.1 V increments.
pub const STEP_COUNT: u32 = 51;
/// Readings averaged per channel at each ramp step.
pub const SAMPLES_PER_CHANNEL: usize = 20;
/// Wait after commanding the DAC before sampling begins.
pub const DAC_SETTLE: Duration = Duration::from_millis(100);
/// Wait after each individual reading of a channel.
pub const SAMPLE_GAP: Duration = Duration::from_millis(10);
/// Hold after a step's row is emitted, before the next DAC write.
pub const STEP_HOLD: Duration = Duration::from_millis(100);

/// The three front-end pins probing the circuit.
///
/// `A0` sits on the DAC side of the series resistor, `A1` on the junction
/// between the resistor and the LED anode, and `A2` on the ground return, so
/// `A0 - A1` is the drop across the resistor and `A1 - A2` the drop across
/// the LED.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnalogPin {
    A0,
    A1,
    A2,
}

impl AnalogPin {
    /// Probe order used at every ramp step.
    pub const ALL: [AnalogPin; 3] = [AnalogPin::A0, AnalogPin::A1, AnalogPin::A2];

    /// Channel number the front end multiplexes on.
    pub fn index(self) -> u8 {
        match self {
            AnalogPin::A0 => 0,
            AnalogPin::A1 => 1,
            AnalogPin::A2 => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AnalogPin::A0 => "A0",
            AnalogPin::A1 => "A1",
            AnalogPin::A2 => "A2",
        }
    }
}
