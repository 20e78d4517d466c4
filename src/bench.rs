use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{bail, Result};

use crate::config::AnalogPin;

/// Seam between the sweep engine and whatever produces real electrons.
///
/// Two implementations ship: `bridge::SerialBridge` talks to the lab
/// interface board over a serial line, and `sim::SimBench` models the
/// resistor-plus-LED circuit in software. Tests script a third one.
pub trait Bench {
    /// Loads the DAC output register with a 12-bit code. `persist` forwards
    /// the converter's EEPROM flag; the sweep itself never persists.
    fn set_dac(&mut self, code: u16, persist: bool) -> Result<()>;

    /// Takes one raw 10-bit reading of a front-end pin.
    fn read_adc(&mut self, pin: AnalogPin) -> Result<u16>;

    /// Lets the circuit settle. Hardware backends sleep; the simulator
    /// accounts the time instead of spending it.
    fn settle(&mut self, wait: Duration);

    /// One line describing the attached instrument, for the record preamble.
    fn identity(&self) -> String;
}

impl<B: Bench + ?Sized> Bench for Box<B> {
    fn set_dac(&mut self, code: u16, persist: bool) -> Result<()> {
        (**self).set_dac(code, persist)
    }

    fn read_adc(&mut self, pin: AnalogPin) -> Result<u16> {
        (**self).read_adc(pin)
    }

    fn settle(&mut self, wait: Duration) {
        (**self).settle(wait)
    }

    fn identity(&self) -> String {
        (**self).identity()
    }
}

/// Canned bench for tests: hands out scripted readings in order and records
/// every DAC write and settle it is asked for.
pub struct ScriptedBench {
    readings: VecDeque<u16>,
    pub dac_writes: Vec<u16>,
    pub settled: Duration,
}

impl ScriptedBench {
    pub fn new(readings: impl IntoIterator<Item = u16>) -> Self {
        ScriptedBench {
            readings: readings.into_iter().collect(),
            dac_writes: Vec::new(),
            settled: Duration::ZERO,
        }
    }
}

impl Bench for ScriptedBench {
    fn set_dac(&mut self, code: u16, _persist: bool) -> Result<()> {
        self.dac_writes.push(code);
        Ok(())
    }

    fn read_adc(&mut self, _pin: AnalogPin) -> Result<u16> {
        match self.readings.pop_front() {
            Some(count) => Ok(count),
            None => bail!("scripted readings exhausted"),
        }
    }

    fn settle(&mut self, wait: Duration) {
        self.settled += wait;
    }

    fn identity(&self) -> String {
        "scripted bench".to_string()
    }
}
