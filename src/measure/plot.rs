//! PNG chart of a recorded sweep.

use plotters::prelude::*;

use crate::measure::error::MeasureError;
use crate::measure::fit::{shockley_current, LedFit, SweepPoint};

/// Geometry and caption of the rendered chart.
#[derive(Clone, Copy, Debug)]
pub struct ChartStyle {
    pub width: u32,
    pub height: u32,
    pub caption: &'static str,
}

impl Default for ChartStyle {
    fn default() -> Self {
        ChartStyle {
            width: 800,
            height: 500,
            caption: "LED I-V characteristic",
        }
    }
}

/// Renders the measured points, and the fitted Shockley curve when one is
/// given, into an in-memory PNG.
///
/// Rows with non-finite coordinates are skipped here; they carry no drawable
/// position. The record itself is never rewritten.
pub fn render_iv_png(
    points: &[SweepPoint],
    fit: Option<&LedFit>,
    style: &ChartStyle,
) -> Result<Vec<u8>, MeasureError> {
    let finite = finite_points(points);
    if finite.is_empty() {
        return Err(MeasureError::Chart("no finite points to draw".to_string()));
    }
    let v_max = finite.iter().map(|(v, _)| *v).fold(0.0_f64, f64::max);
    let i_max = finite.iter().map(|(_, i)| *i).fold(0.0_f64, f64::max);
    let x_range = 0.0..(v_max * 1.05).max(0.1);
    let y_range = 0.0..(i_max * 1.05).max(0.1);

    let mut buffer = vec![0u8; (style.width * style.height * 3) as usize];
    {
        let root =
            BitMapBackend::with_buffer(&mut buffer, (style.width, style.height)).into_drawing_area();
        root.fill(&WHITE)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(12)
            .caption(style.caption, ("sans-serif", 22))
            .x_label_area_size(40)
            .y_label_area_size(55)
            .build_cartesian_2d(x_range, y_range)?;
        chart
            .configure_mesh()
            .x_desc("LED voltage (V)")
            .y_desc("current (mA)")
            .light_line_style(&BLACK.mix(0.08))
            .draw()?;

        chart
            .draw_series(
                finite
                    .iter()
                    .map(|(v, i)| Circle::new((*v, *i), 3, BLUE.filled())),
            )?
            .label("measured")
            .legend(|(x, y)| Circle::new((x + 10, y), 3, BLUE.filled()));

        if let Some(fit) = fit {
            let steps = 200;
            let curve = (0..=steps).map(|k| {
                let v = v_max * f64::from(k) / f64::from(steps);
                (
                    v,
                    shockley_current(v, fit.saturation_current_a, fit.ideality) * 1000.0,
                )
            });
            chart
                .draw_series(LineSeries::new(curve, &RED))?
                .label(format!("fit: n = {:.2}", fit.ideality))
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));
        }

        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.85))
            .border_style(&BLACK.mix(0.4))
            .draw()?;
        root.present()?;
    }
    encode_png(&buffer, style.width, style.height)
}

fn finite_points(points: &[SweepPoint]) -> Vec<(f64, f64)> {
    points
        .iter()
        .filter(|p| p.led_volts.is_finite() && p.milliamps.is_finite())
        .map(|p| (p.led_volts, p.milliamps))
        .collect()
}

fn encode_png(buffer: &[u8], width: u32, height: u32) -> Result<Vec<u8>, MeasureError> {
    let image = image::RgbImage::from_raw(width, height, buffer.to_vec())
        .ok_or_else(|| MeasureError::Chart("pixel buffer size mismatch".to_string()))?;
    let mut png = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)?;
    Ok(png)
}
