//! Software model of the measurement rig.
//!
//! The simulated circuit is the real one: the DAC drives a series resistor
//! into an LED to ground. Given the commanded output voltage, the junction
//! voltage is the point where the resistor current `(Vout - V) / R` equals
//! the Shockley current of the LED; both are monotonic in `V`, so a
//! bisection on `[0, Vout]` finds it. Readings are quantized to the 10-bit
//! front end with optional Gaussian noise, and settle times are accounted
//! on a virtual clock instead of being slept.

use std::time::Duration;

use anyhow::{ensure, Result};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::bench::Bench;
use crate::config::{AnalogPin, ADC_MAX_COUNT, DAC_MAX_CODE, FULL_SCALE_VOLTS, RESISTOR_OHMS};
use crate::measure::{map_range, shockley_current};

/// Tunables of the simulated rig.
#[derive(Clone, Copy, Debug)]
pub struct SimConfig {
    /// RNG seed for the ADC noise. Zero seeds from entropy.
    pub seed: u64,
    /// Standard deviation of the ADC noise, in counts.
    pub noise_counts: f64,
    /// Saturation current of the simulated LED, in amps.
    pub saturation_current_a: f64,
    /// Ideality factor of the simulated LED.
    pub ideality: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        // a garden-variety red LED, conducting around 1.8 V
        SimConfig {
            seed: 0,
            noise_counts: 2.0,
            saturation_current_a: 1e-12,
            ideality: 3.0,
        }
    }
}

pub struct SimBench {
    cfg: SimConfig,
    rng: SmallRng,
    dac_code: u16,
    elapsed: Duration,
}

impl SimBench {
    pub fn new(cfg: SimConfig) -> Self {
        let rng = if cfg.seed == 0 {
            SmallRng::from_entropy()
        } else {
            SmallRng::seed_from_u64(cfg.seed)
        };
        SimBench {
            cfg,
            rng,
            dac_code: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Total settle time the sweep has asked for so far.
    pub fn virtual_elapsed(&self) -> Duration {
        self.elapsed
    }

    fn dac_volts(&self) -> f64 {
        map_range(
            f64::from(self.dac_code),
            0.0,
            f64::from(DAC_MAX_CODE),
            0.0,
            FULL_SCALE_VOLTS,
        )
    }

    /// Voltage at the resistor-LED junction for the present DAC setting.
    fn junction_volts(&self) -> f64 {
        let v_out = self.dac_volts();
        if v_out <= 0.0 {
            return 0.0;
        }
        let (mut lo, mut hi) = (0.0_f64, v_out);
        for _ in 0..64 {
            let mid = 0.5 * (lo + hi);
            let resistor_current = (v_out - mid) / RESISTOR_OHMS;
            let led_current =
                shockley_current(mid, self.cfg.saturation_current_a, self.cfg.ideality);
            if resistor_current > led_current {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        0.5 * (lo + hi)
    }

    fn node_volts(&self, pin: AnalogPin) -> f64 {
        match pin {
            AnalogPin::A0 => self.dac_volts(),
            AnalogPin::A1 => self.junction_volts(),
            AnalogPin::A2 => 0.0,
        }
    }

    fn noise(&mut self) -> f64 {
        if self.cfg.noise_counts == 0.0 {
            return 0.0;
        }
        let n: f64 = self.rng.sample(StandardNormal);
        n * self.cfg.noise_counts
    }
}

impl Bench for SimBench {
    fn set_dac(&mut self, code: u16, _persist: bool) -> Result<()> {
        ensure!(
            code <= DAC_MAX_CODE,
            "DAC code {code} exceeds the 12-bit range"
        );
        self.dac_code = code;
        Ok(())
    }

    fn read_adc(&mut self, pin: AnalogPin) -> Result<u16> {
        let ideal = map_range(
            self.node_volts(pin),
            0.0,
            FULL_SCALE_VOLTS,
            0.0,
            f64::from(ADC_MAX_COUNT),
        );
        let counts = (ideal + self.noise())
            .round()
            .clamp(0.0, f64::from(ADC_MAX_COUNT));
        Ok(counts as u16)
    }

    fn settle(&mut self, wait: Duration) {
        self.elapsed += wait;
    }

    fn identity(&self) -> String {
        format!(
            "simulated bench: {RESISTOR_OHMS} ohm + LED (Is={:.1e} A, n={:.1}), seed {}",
            self.cfg.saturation_current_a, self.cfg.ideality, self.cfg.seed
        )
    }
}
