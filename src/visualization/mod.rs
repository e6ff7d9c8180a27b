//! Depth profile plots.
//!
//! Profiles are drawn with depth pointing down (plotted as negative elevation below
//! the surface) and one polyline per series. Undefined samples break the line.
//! No text is rendered, so no font backend is required.

use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Empty profile")]
    EmptyProfile,

    #[error("series '{name}' has {found} samples, depth has {expected}")]
    LengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Default plot width in pixels.
const DEFAULT_WIDTH: u32 = 800;

/// Default plot height in pixels.
const DEFAULT_HEIGHT: u32 = 1200;

/// Series colours, in series order.
const SERIES_COLORS: &[(u8, u8, u8)] = &[
    (228, 26, 28),  // Red
    (55, 126, 184), // Blue
    (77, 175, 74),  // Green
    (152, 78, 163), // Purple
    (255, 127, 0),  // Orange
];

fn plotting_error<E: std::fmt::Display>(e: E) -> VisualizationError {
    VisualizationError::PlottingError(e.to_string())
}

/// Split a series into runs of consecutive defined, finite samples.
fn defined_runs(depth: &[f64], values: &[Option<f64>]) -> Vec<Vec<(f64, f64)>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();

    for (&d, value) in depth.iter().zip(values) {
        match value {
            Some(v) if v.is_finite() => current.push((*v, -d)),
            _ => {
                if !current.is_empty() {
                    runs.push(std::mem::take(&mut current));
                }
            }
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

/// Plot one or more value-versus-depth series and save as PNG.
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `depth` - Sample depths
/// * `series` - `(name, values)` pairs aligned with `depth`
pub fn plot_profile(
    output_path: &Path,
    depth: &[f64],
    series: &[(&str, Vec<Option<f64>>)],
) -> Result<()> {
    if depth.is_empty() {
        return Err(VisualizationError::EmptyProfile);
    }
    if let Some((name, values)) = series.iter().find(|(_, v)| v.len() != depth.len()) {
        return Err(VisualizationError::LengthMismatch {
            name: name.to_string(),
            expected: depth.len(),
            found: values.len(),
        });
    }

    let runs: Vec<Vec<Vec<(f64, f64)>>> = series
        .iter()
        .map(|(_, values)| defined_runs(depth, values))
        .collect();

    // Bounds: values from zero, depth from the surface
    let x_max = runs
        .iter()
        .flatten()
        .flatten()
        .map(|&(x, _)| x)
        .fold(0.0_f64, f64::max);
    let x_max = if x_max > 0.0 { x_max * 1.05 } else { 1.0 };
    let depth_max = depth.iter().copied().fold(0.0_f64, f64::max);
    let y_min = -(if depth_max > 0.0 { depth_max * 1.02 } else { 1.0 });

    let root = BitMapBackend::new(output_path, (DEFAULT_WIDTH, DEFAULT_HEIGHT)).into_drawing_area();

    root.fill(&WHITE).map_err(plotting_error)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .build_cartesian_2d(0.0..x_max, y_min..0.0)
        .map_err(plotting_error)?;

    // Ground surface and zero-strength axis
    chart
        .draw_series([
            PathElement::new(vec![(0.0, 0.0), (x_max, 0.0)], BLACK),
            PathElement::new(vec![(0.0, 0.0), (0.0, y_min)], BLACK),
        ])
        .map_err(plotting_error)?;

    for (index, series_runs) in runs.iter().enumerate() {
        let (r, g, b) = SERIES_COLORS[index % SERIES_COLORS.len()];
        let color = RGBColor(r, g, b);
        for run in series_runs {
            chart
                .draw_series(LineSeries::new(run.iter().copied(), color.stroke_width(2)))
                .map_err(plotting_error)?;
        }
    }

    root.present().map_err(plotting_error)?;

    Ok(())
}
