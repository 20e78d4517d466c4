use std::io::{self, Write};

use crate::measure::{CurrentEstimate, DiffStats, SampleStats};

/// Banner line opening every record, 35 characters wide to match the logs
/// the downstream analysis scripts already parse.
pub const SEPARATOR: &str = "===================================";

/// Column order of the record. Fixed contract with the analysis side.
pub const COLUMNS: [&str; 13] = [
    "out",
    "A0",
    "A0 std",
    "A1",
    "A1 std",
    "A2",
    "A2 std",
    "A0-A1",
    "A0-A1 err",
    "A1-A2",
    "A1-A2 err",
    "current (mA)",
    "current err (mA)",
];

/// One fully derived ramp step, ready for the record.
#[derive(Clone, Copy, Debug)]
pub struct StepRecord {
    /// Voltage the DAC was asked for at this step.
    pub out_volts: f64,
    /// Per-channel statistics, in probe order A0, A1, A2.
    pub channels: [SampleStats; 3],
    /// Resistor drop (A0-A1) and LED drop (A1-A2).
    pub drops: [DiffStats; 2],
    pub current: CurrentEstimate,
}

/// Streams a sweep record to any byte sink.
///
/// Values are printed with four fractional digits. Non-finite values print
/// the way Rust formats them (`NaN`, `inf`); they are forwarded, not
/// rewritten, so a degenerate step stays visible downstream.
pub struct RecordWriter<W: Write> {
    sink: W,
    rows: usize,
}

impl<W: Write> RecordWriter<W> {
    pub fn new(sink: W) -> Self {
        RecordWriter { sink, rows: 0 }
    }

    /// Writes the banner, the instrument identification line and the column
    /// header.
    pub fn preamble(&mut self, identity: &str) -> io::Result<()> {
        writeln!(self.sink, "{SEPARATOR}")?;
        writeln!(self.sink, "{identity}")?;
        writeln!(self.sink, "{}", COLUMNS.join(","))
    }

    /// Writes one data row.
    pub fn record(&mut self, step: &StepRecord) -> io::Result<()> {
        write!(self.sink, "{:.4}", step.out_volts)?;
        for channel in &step.channels {
            write!(self.sink, ",{:.4},{:.4}", channel.mean, channel.std_dev)?;
        }
        for drop in &step.drops {
            write!(self.sink, ",{:.4},{:.4}", drop.diff, drop.error)?;
        }
        writeln!(
            self.sink,
            ",{:.4},{:.4}",
            step.current.milliamps, step.current.error
        )?;
        self.rows += 1;
        Ok(())
    }

    /// Writes the completion line and flushes the sink.
    pub fn completion(&mut self) -> io::Result<()> {
        writeln!(self.sink, "sweep complete")?;
        self.sink.flush()
    }

    pub fn rows_written(&self) -> usize {
        self.rows
    }

    pub fn into_inner(self) -> W {
        self.sink
    }
}
