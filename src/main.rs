// src/main.rs
mod bench;
mod bridge;
mod config;
mod emitter;
mod measure;
mod sim;
mod sweep;

use std::env;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, bail, Context, Result};
use serde::Serialize;

use crate::bench::Bench;
use crate::bridge::SerialBridge;
use crate::config::{
    DAC_ADDRESS, RESISTOR_OHMS, RESISTOR_TOLERANCE, SAMPLES_PER_CHANNEL, STEP_COUNT,
};
use crate::measure::{fit_led, parse_sweep_csv, render_iv_png, ChartStyle, ErrorModel};
use crate::sim::{SimBench, SimConfig};
use crate::sweep::{Sweep, TickOutcome};

const USAGE: &str = "\
ivsweep, LED I-V curve bench

USAGE:
  ivsweep sweep [--port <device> | --sim] [--out <file.csv>]
                [--error-model <mean-weighted|quadrature>]
                [--seed <u64>] [--noise <counts>]
  ivsweep analyze <record.csv> [--chart <file.png>]

With no --port the sweep runs against the simulated bench. The record goes
to stdout unless --out is given; --out also writes a JSON manifest next to
the record. --seed 0 draws a fresh noise seed (the manifest records the one
used) and --noise sets the simulated ADC noise in counts. RUST_LOG tunes
log verbosity; logs go to stderr.
";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("sweep") => run_sweep(&args[1..]),
        Some("analyze") => run_analyze(&args[1..]),
        Some("--help") | Some("-h") | None => {
            print!("{USAGE}");
            Ok(())
        }
        Some(other) => bail!("unknown command {other:?}; try --help"),
    }
}

#[derive(Debug)]
struct SweepArgs {
    port: Option<String>,
    out: Option<PathBuf>,
    model: ErrorModel,
    seed: u64,
    noise_counts: f64,
}

fn parse_sweep_args(args: &[String]) -> Result<SweepArgs> {
    let mut parsed = SweepArgs {
        port: None,
        out: None,
        model: ErrorModel::default(),
        seed: 0,
        noise_counts: SimConfig::default().noise_counts,
    };
    let mut sim = false;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--sim" => sim = true,
            "--port" => parsed.port = Some(value(&mut iter, "--port")?),
            "--out" => parsed.out = Some(PathBuf::from(value(&mut iter, "--out")?)),
            "--error-model" => {
                parsed.model = match value(&mut iter, "--error-model")?.as_str() {
                    "mean-weighted" => ErrorModel::MeanWeighted,
                    "quadrature" => ErrorModel::Quadrature,
                    other => bail!("unknown error model {other:?}"),
                }
            }
            "--seed" => {
                parsed.seed = value(&mut iter, "--seed")?
                    .parse()
                    .context("--seed wants an unsigned integer")?
            }
            "--noise" => {
                parsed.noise_counts = value(&mut iter, "--noise")?
                    .parse()
                    .context("--noise wants a count figure")?
            }
            other => bail!("unknown flag {other:?} for sweep"),
        }
    }
    if sim && parsed.port.is_some() {
        bail!("--sim and --port are mutually exclusive");
    }
    Ok(parsed)
}

fn value(iter: &mut std::slice::Iter<String>, flag: &str) -> Result<String> {
    iter.next()
        .cloned()
        .ok_or_else(|| anyhow!("{flag} wants a value"))
}

/// Sidecar metadata describing how a record was produced.
#[derive(Serialize)]
struct RunManifest {
    instrument: String,
    resistor_ohms: f64,
    resistor_tolerance: f64,
    dac_address: u8,
    steps: u32,
    samples_per_channel: usize,
    error_model: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    started_unix: u64,
}

impl RunManifest {
    fn new(identity: &str, args: &SweepArgs, seed: Option<u64>) -> Self {
        RunManifest {
            instrument: identity.to_string(),
            resistor_ohms: RESISTOR_OHMS,
            resistor_tolerance: RESISTOR_TOLERANCE,
            dac_address: DAC_ADDRESS,
            steps: STEP_COUNT,
            samples_per_channel: SAMPLES_PER_CHANNEL,
            error_model: args.model.label(),
            seed,
            started_unix: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        }
    }
}

/// A zero seed asks for a fresh one. The draw happens before the bench is
/// built so the manifest records the seed a run actually used.
fn resolve_sim_seed(requested: u64) -> u64 {
    match requested {
        0 => rand::random::<u64>().max(1),
        seed => seed,
    }
}

fn run_sweep(args: &[String]) -> Result<()> {
    let args = parse_sweep_args(args)?;
    let (bench, seed): (Box<dyn Bench>, Option<u64>) = match &args.port {
        Some(port) => (Box::new(SerialBridge::connect(port)?), None),
        None => {
            let seed = resolve_sim_seed(args.seed);
            log::info!("no port given, sweeping the simulated bench");
            let bench = SimBench::new(SimConfig {
                seed,
                noise_counts: args.noise_counts,
                ..SimConfig::default()
            });
            (Box::new(bench), Some(seed))
        }
    };
    let manifest = RunManifest::new(&bench.identity(), &args, seed);

    let sink: Box<dyn Write> = match &args.out {
        Some(path) => {
            let file =
                File::create(path).with_context(|| format!("creating {}", path.display()))?;
            Box::new(BufWriter::new(file))
        }
        None => Box::new(io::stdout()),
    };

    let mut sweep = Sweep::new(bench, sink, args.model);
    if let TickOutcome::Completed(summary) = sweep.tick()? {
        if summary.degenerate_rows > 0 {
            log::warn!(
                "{} of {} rows had a zero resistor drop",
                summary.degenerate_rows,
                summary.rows
            );
        }
        match &args.out {
            Some(path) => {
                let manifest_path = path.with_extension("json");
                fs::write(&manifest_path, serde_json::to_vec_pretty(&manifest)?)
                    .with_context(|| format!("writing {}", manifest_path.display()))?;
                log::info!(
                    "record at {}, manifest at {}",
                    path.display(),
                    manifest_path.display()
                );
            }
            None => log::info!("run manifest: {}", serde_json::to_string(&manifest)?),
        }
    }
    Ok(())
}

fn run_analyze(args: &[String]) -> Result<()> {
    let mut record: Option<PathBuf> = None;
    let mut chart: Option<PathBuf> = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--chart" => chart = Some(PathBuf::from(value(&mut iter, "--chart")?)),
            other if record.is_none() && !other.starts_with('-') => {
                record = Some(PathBuf::from(other))
            }
            other => bail!("unknown argument {other:?} for analyze"),
        }
    }
    let record = record.ok_or_else(|| anyhow!("analyze wants a record file; try --help"))?;

    let text =
        fs::read_to_string(&record).with_context(|| format!("reading {}", record.display()))?;
    let points = parse_sweep_csv(&text)?;
    log::info!("{} rows in {}", points.len(), record.display());

    let fit = fit_led(&points).context("fitting the diode model")?;
    if !fit.in_physical_range() {
        log::warn!(
            "fitted parameters look implausible for an LED (Is={:.3e} A, n={:.2})",
            fit.saturation_current_a,
            fit.ideality
        );
    }
    println!("saturation current Is: {:.3e} A", fit.saturation_current_a);
    println!("ideality factor n:     {:.3}", fit.ideality);
    println!("points used:           {}", fit.points_used);
    log::debug!("fit: {}", serde_json::to_string(&fit)?);

    if let Some(path) = chart {
        let png = render_iv_png(&points, Some(&fit), &ChartStyle::default())?;
        fs::write(&path, png).with_context(|| format!("writing {}", path.display()))?;
        log::info!("chart at {}", path.display());
    }
    Ok(())
}
