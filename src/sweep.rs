//! One-shot ramp controller.

use std::io::Write;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::bench::Bench;
use crate::config::{
    AnalogPin, DAC_SETTLE, RESISTOR_OHMS, RESISTOR_TOLERANCE, SAMPLES_PER_CHANNEL, SAMPLE_GAP,
    STEP_COUNT, STEP_HOLD,
};
use crate::emitter::{RecordWriter, StepRecord};
use crate::measure::{
    combine, dac_code_for_step, estimate_current, step_target_volts, ErrorModel, SampleStats,
};

/// Where the controller is in its life. A sweep runs once and latches; it
/// latches even when the run fails, so a record is never written twice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SweepState {
    Armed,
    Done,
}

/// What one call to `tick` did.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TickOutcome {
    Completed(RunSummary),
    Idle,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RunSummary {
    pub rows: usize,
    /// Steps whose resistor drop was exactly zero. Their current error is
    /// undefined and was recorded as such.
    pub degenerate_rows: usize,
    pub elapsed: Duration,
}

/// Drives the full voltage ramp over a bench and streams the record.
pub struct Sweep<B: Bench, W: Write> {
    bench: B,
    writer: RecordWriter<W>,
    model: ErrorModel,
    samples_per_channel: usize,
    state: SweepState,
}

impl<B: Bench, W: Write> Sweep<B, W> {
    pub fn new(bench: B, sink: W, model: ErrorModel) -> Self {
        Sweep {
            bench,
            writer: RecordWriter::new(sink),
            model,
            samples_per_channel: SAMPLES_PER_CHANNEL,
            state: SweepState::Armed,
        }
    }

    /// Overrides the per-channel burst length. Short bursts are for tests;
    /// a zero burst fails the sweep at the first acquisition.
    pub fn with_samples_per_channel(mut self, samples: usize) -> Self {
        self.samples_per_channel = samples;
        self
    }

    pub fn state(&self) -> SweepState {
        self.state
    }

    pub fn bench(&self) -> &B {
        &self.bench
    }

    pub fn into_sink(self) -> W {
        self.writer.into_inner()
    }

    /// Runs the whole ramp on the first call; every later call is a no-op.
    pub fn tick(&mut self) -> Result<TickOutcome> {
        if self.state == SweepState::Done {
            return Ok(TickOutcome::Idle);
        }
        self.state = SweepState::Done;
        let summary = self.run()?;
        Ok(TickOutcome::Completed(summary))
    }

    fn run(&mut self) -> Result<RunSummary> {
        let started = Instant::now();
        log::info!(
            "sweep started: {STEP_COUNT} steps, {} samples per channel, {} error model",
            self.samples_per_channel,
            self.model.label()
        );
        self.writer
            .preamble(&self.bench.identity())
            .context("writing the record preamble")?;

        let mut degenerate_rows = 0;
        for step in 0..STEP_COUNT {
            let code = dac_code_for_step(step);
            self.bench
                .set_dac(code, false)
                .with_context(|| format!("commanding the DAC at step {step}"))?;
            self.bench.settle(DAC_SETTLE);

            let mut channels = [SampleStats { mean: 0.0, std_dev: 0.0 }; 3];
            for (slot, pin) in channels.iter_mut().zip(AnalogPin::ALL) {
                *slot = self.acquire(pin)?;
            }
            let [a0, a1, a2] = channels;

            let resistor_drop = combine(a0, a1, self.model);
            let led_drop = combine(a1, a2, self.model);
            let current = estimate_current(resistor_drop, RESISTOR_OHMS, RESISTOR_TOLERANCE);
            if resistor_drop.diff == 0.0 {
                degenerate_rows += 1;
                log::warn!("step {step}: zero drop across the resistor, current error is undefined");
            }

            let record = StepRecord {
                out_volts: step_target_volts(step),
                channels,
                drops: [resistor_drop, led_drop],
                current,
            };
            self.writer
                .record(&record)
                .with_context(|| format!("writing the row for step {step}"))?;
            log::debug!(
                "step {step}: out {:.4} V, current {:.4} mA",
                record.out_volts,
                current.milliamps
            );
            self.bench.settle(STEP_HOLD);
        }

        self.writer
            .completion()
            .context("writing the completion line")?;
        let summary = RunSummary {
            rows: self.writer.rows_written(),
            degenerate_rows,
            elapsed: started.elapsed(),
        };
        log::info!("sweep complete: {} rows in {:.1?}", summary.rows, summary.elapsed);
        Ok(summary)
    }

    fn acquire(&mut self, pin: AnalogPin) -> Result<SampleStats> {
        let mut readings = Vec::with_capacity(self.samples_per_channel);
        for _ in 0..self.samples_per_channel {
            let count = self
                .bench
                .read_adc(pin)
                .with_context(|| format!("reading {}", pin.label()))?;
            readings.push(count);
            self.bench.settle(SAMPLE_GAP);
        }
        Ok(SampleStats::from_raw(&readings)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::ScriptedBench;
    use crate::emitter::SEPARATOR;
    use crate::measure::{fit_led, parse_sweep_csv};
    use crate::sim::{SimBench, SimConfig};

    const TEST_SAMPLES: usize = 2;

    fn scripted_readings(step_count: usize) -> usize {
        step_count * 3 * TEST_SAMPLES
    }

    fn run_to_text<B: Bench>(bench: B, model: ErrorModel) -> (RunSummary, String) {
        let mut sweep =
            Sweep::new(bench, Vec::<u8>::new(), model).with_samples_per_channel(TEST_SAMPLES);
        let summary = match sweep.tick().unwrap() {
            TickOutcome::Completed(summary) => summary,
            TickOutcome::Idle => panic!("first tick must run the sweep"),
        };
        (summary, String::from_utf8(sweep.into_sink()).unwrap())
    }

    #[test]
    fn runs_once_and_latches() {
        let total = scripted_readings(STEP_COUNT as usize);
        let bench = ScriptedBench::new(std::iter::repeat(512).take(total));
        let mut sweep = Sweep::new(bench, Vec::<u8>::new(), ErrorModel::MeanWeighted)
            .with_samples_per_channel(TEST_SAMPLES);

        assert_eq!(sweep.state(), SweepState::Armed);
        let summary = match sweep.tick().unwrap() {
            TickOutcome::Completed(summary) => summary,
            TickOutcome::Idle => panic!("first tick must run the sweep"),
        };
        assert_eq!(summary.rows, STEP_COUNT as usize);
        assert_eq!(sweep.state(), SweepState::Done);
        assert_eq!(sweep.bench().dac_writes.len(), STEP_COUNT as usize);
        let per_step = DAC_SETTLE + SAMPLE_GAP * (3 * TEST_SAMPLES) as u32 + STEP_HOLD;
        assert_eq!(sweep.bench().settled, per_step * STEP_COUNT);

        assert_eq!(sweep.tick().unwrap(), TickOutcome::Idle);
        assert_eq!(sweep.bench().dac_writes.len(), STEP_COUNT as usize);
        assert_eq!(sweep.bench().settled, per_step * STEP_COUNT);
        let text = String::from_utf8(sweep.into_sink()).unwrap();
        assert_eq!(text.lines().count(), 3 + STEP_COUNT as usize + 1);
    }

    #[test]
    fn record_has_preamble_rows_and_completion() {
        let total = scripted_readings(STEP_COUNT as usize);
        let bench = ScriptedBench::new(std::iter::repeat(512).take(total));
        let (summary, text) = run_to_text(bench, ErrorModel::MeanWeighted);

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3 + STEP_COUNT as usize + 1);
        assert_eq!(lines[0], SEPARATOR);
        assert_eq!(lines[1], "scripted bench");
        assert!(lines[2].starts_with("out,"));
        assert_eq!(lines[lines.len() - 1], "sweep complete");
        for row in &lines[3..lines.len() - 1] {
            assert_eq!(row.split(',').count(), 13);
        }
        assert_eq!(summary.rows, STEP_COUNT as usize);
    }

    #[test]
    fn flat_readings_degenerate_every_step() {
        let total = scripted_readings(STEP_COUNT as usize);
        let bench = ScriptedBench::new(std::iter::repeat(512).take(total));
        let (summary, text) = run_to_text(bench, ErrorModel::MeanWeighted);

        assert_eq!(summary.degenerate_rows, STEP_COUNT as usize);
        let first_row = text.lines().nth(3).unwrap();
        let fields: Vec<&str> = first_row.split(',').collect();
        assert_eq!(fields[11], "0.0000");
        assert_eq!(fields[12], "NaN");
    }

    #[test]
    fn dac_codes_follow_the_ramp() {
        let total = scripted_readings(STEP_COUNT as usize);
        let bench = ScriptedBench::new(std::iter::repeat(512).take(total));
        let mut sweep = Sweep::new(bench, Vec::<u8>::new(), ErrorModel::MeanWeighted)
            .with_samples_per_channel(TEST_SAMPLES);
        sweep.tick().unwrap();

        let expected: Vec<u16> = (0..STEP_COUNT).map(dac_code_for_step).collect();
        assert_eq!(sweep.bench().dac_writes, expected);
    }

    #[test]
    fn error_model_reaches_the_record() {
        let readings =
            || (0..scripted_readings(STEP_COUNT as usize)).map(|i| if i % 2 == 0 { 500 } else { 540 });
        let (_, weighted) = run_to_text(ScriptedBench::new(readings()), ErrorModel::MeanWeighted);
        let (_, quadrature) = run_to_text(ScriptedBench::new(readings()), ErrorModel::Quadrature);

        let err_field = |text: &str| -> String {
            text.lines().nth(3).unwrap().split(',').nth(8).unwrap().to_string()
        };
        assert_ne!(err_field(&weighted), err_field(&quadrature));
    }

    #[test]
    fn failed_run_latches_too() {
        let bench = ScriptedBench::new(Vec::new());
        let mut sweep = Sweep::new(bench, Vec::<u8>::new(), ErrorModel::MeanWeighted)
            .with_samples_per_channel(TEST_SAMPLES);
        assert!(sweep.tick().is_err());
        assert_eq!(sweep.state(), SweepState::Done);
        assert_eq!(sweep.tick().unwrap(), TickOutcome::Idle);
    }

    #[test]
    fn simulated_sweep_matches_the_circuit() {
        let bench = SimBench::new(SimConfig {
            seed: 1,
            noise_counts: 0.0,
            ..SimConfig::default()
        });
        let mut sweep = Sweep::new(bench, Vec::<u8>::new(), ErrorModel::MeanWeighted)
            .with_samples_per_channel(TEST_SAMPLES);
        sweep.tick().unwrap();

        // virtual pacing: per step, one DAC settle, six sample gaps, one hold
        let per_step = DAC_SETTLE + SAMPLE_GAP * (3 * TEST_SAMPLES) as u32 + STEP_HOLD;
        assert_eq!(
            sweep.bench().virtual_elapsed(),
            per_step * STEP_COUNT
        );

        let text = String::from_utf8(sweep.into_sink()).unwrap();
        let points = parse_sweep_csv(&text).unwrap();
        assert_eq!(points.len(), STEP_COUNT as usize);
        assert_eq!(points[0].milliamps, 0.0);
        let last = points.last().unwrap();
        assert!(last.led_volts > 1.5 && last.led_volts < 2.0);
        assert!(last.milliamps > 10.0 && last.milliamps < 16.0);

        // the record is good enough to recover the simulated diode, within
        // the distortion the 10-bit quantization adds at low currents
        let fit = fit_led(&points).unwrap();
        assert!(fit.in_physical_range());
        assert!(fit.ideality > 2.5 && fit.ideality < 4.0);
    }
}
