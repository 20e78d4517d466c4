// src/measure/mod.rs
pub mod error;
pub mod fit;
pub mod plot;
pub mod propagate;
pub mod ranging;
pub mod stats;

pub use fit::{fit_led, parse_sweep_csv, shockley_current};
pub use plot::{render_iv_png, ChartStyle};
pub use propagate::{combine, estimate_current, CurrentEstimate, DiffStats, ErrorModel};
pub use ranging::{dac_code_for_step, map_range, step_target_volts};
pub use stats::SampleStats;
