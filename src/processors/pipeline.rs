//! End-to-end processing of soundings.
//!
//! [`analyze_sounding`] runs the numerical stages on one sounding:
//! optional smoothing and band filtering, cone correction, layer mapping, stresses,
//! soil index and residual strength. [`process_batch`] does the same for many files in
//! parallel and writes one `CPT_<id>.csv` per sounding.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use rayon::prelude::*;

use crate::config::PipelineConfig;
use crate::core::error::{ConvergenceWarning, CptError};
use crate::core::loaders::{
    load_sounding, sounding_id_from_path, GroundwaterTable, LayerTable, Sounding,
};
use crate::core::transforms::corrected_tip_resistance;
use crate::core::writers::{self, Column};
use crate::visualization;

use super::filtering::{band_filter_sounding, smooth_sounding, BandFilterOutcome};
use super::layers::{assign_layers, LayerAssignment};
use super::residual::{residual_strength, ResidualProfile};
use super::soil_index::{soil_index, SoilIndexProfile};
use super::stress::{soil_stresses, StressProfile};

/// Every stage output for one sounding, aligned sample by sample.
#[derive(Debug, Clone)]
pub struct SoundingAnalysis {
    /// The sounding after cleaning; all other arrays follow its samples.
    pub sounding: Sounding,
    /// Present when the band filter ran.
    pub band_filter: Option<BandFilterOutcome>,
    /// Corrected tip resistance.
    pub qt: Vec<f64>,
    pub layers: LayerAssignment,
    pub layer_names: Vec<String>,
    pub stresses: StressProfile,
    pub soil: SoilIndexProfile,
    pub residual: ResidualProfile,
}

impl SoundingAnalysis {
    #[inline]
    pub fn len(&self) -> usize {
        self.sounding.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sounding.is_empty()
    }

    /// Non-convergence warnings of all stages.
    pub fn warnings(&self) -> impl Iterator<Item = &ConvergenceWarning> {
        self.soil.warnings.iter().chain(self.residual.warnings.iter())
    }

    /// Output columns, one row per sample.
    pub fn columns(&self) -> Vec<Column<'_>> {
        let soil = &self.soil.records;
        let res = &self.residual.records;
        let n = self.len();

        vec![
            Column::numbers("depth", &self.sounding.depth),
            Column::numbers("qc", &self.sounding.qc),
            Column::numbers("fs", &self.sounding.fs),
            Column::numbers("u2", &self.sounding.u2),
            Column::numbers("qt", &self.qt),
            Column::labels("layer", self.layer_names.iter().map(String::as_str).collect()),
            Column::numbers("unit_weight", &self.layers.unit_weight),
            Column::numbers("gwt_depth", &self.layers.groundwater_depth),
            Column::numbers("total_stress", self.stresses.total()),
            Column::numbers("pore_pressure", self.stresses.pore_pressure()),
            Column::numbers("effective_stress", self.stresses.effective()),
            Column::optional("Fr", per_sample(n, |i| Some(soil[i].fr))),
            Column::optional("Qt_1", per_sample(n, |i| Some(soil[i].qt_1))),
            Column::optional("Ic_0", per_sample(n, |i| Some(soil[i].ic_0))),
            Column::optional("n", per_sample(n, |i| soil[i].n)),
            Column::optional("Qt_n", per_sample(n, |i| soil[i].qt_n)),
            Column::optional("Ic_n", per_sample(n, |i| soil[i].ic_n)),
            Column::optional("friction_angle", per_sample(n, |i| Some(soil[i].friction_angle))),
            Column::optional("R10_K", per_sample(n, |i| res[i].robertson.map(|r| r.k))),
            Column::optional("R10_Qtn_cs", per_sample(n, |i| res[i].robertson.map(|r| r.qtn_cs))),
            Column::optional("LSR_Rob_2010", per_sample(n, |i| res[i].robertson.map(|r| r.lsr))),
            Column::optional("Sr_Rob_2010", per_sample(n, |i| res[i].robertson_sr)),
            Column::optional("LSR_OS_2002", per_sample(n, |i| Some(res[i].olson_stark_lsr))),
            Column::optional("Sr_OS_2002", per_sample(n, |i| Some(res[i].olson_stark_sr))),
            Column::optional(
                "IB15_FC",
                per_sample(n, |i| res[i].idriss_boulanger.map(|ib| ib.fines_content)),
            ),
            Column::optional("IB15_m", per_sample(n, |i| res[i].idriss_boulanger.map(|ib| ib.m))),
            Column::optional(
                "IB15_qc1N_cs",
                per_sample(n, |i| res[i].idriss_boulanger.map(|ib| ib.qc1n_cs)),
            ),
            Column::optional("IB15_LSR", per_sample(n, |i| res[i].idriss_boulanger.map(|ib| ib.lsr))),
            Column::optional(
                "IB15_LSR_void",
                per_sample(n, |i| res[i].idriss_boulanger.map(|ib| ib.lsr_void)),
            ),
            Column::optional("IB15_Sr", per_sample(n, |i| res[i].idriss_boulanger_sr)),
            Column::optional("IB15_Sr_void", per_sample(n, |i| res[i].idriss_boulanger_sr_void)),
        ]
    }

    /// Residual strength series `(label, Sr per sample)` for plotting.
    pub fn residual_series(&self) -> Vec<(&'static str, Vec<Option<f64>>)> {
        let res = &self.residual.records;
        vec![
            (
                "Olson & Stark 2002",
                res.iter().map(|r| Some(r.olson_stark_sr)).collect(),
            ),
            ("Robertson 2010", res.iter().map(|r| r.robertson_sr).collect()),
            (
                "Idriss & Boulanger 2015",
                res.iter().map(|r| r.idriss_boulanger_sr).collect(),
            ),
        ]
    }
}

fn per_sample(n: usize, value: impl Fn(usize) -> Option<f64>) -> Vec<Option<f64>> {
    (0..n).map(value).collect()
}

/// Run every stage on one sounding.
///
/// # Errors
///
/// Any structural problem aborts the sounding: invalid configuration, malformed
/// channels, a depth above the first layer, or an unknown groundwater id.
/// Non-convergence is logged and recorded in the result instead.
pub fn analyze_sounding(
    sounding: &Sounding,
    layers: &LayerTable,
    groundwater: &GroundwaterTable,
    config: &PipelineConfig,
) -> std::result::Result<SoundingAnalysis, CptError> {
    config.validate()?;
    sounding.validate()?;

    let mut cleaned = match config.filter.smoothing {
        Some(mode) => {
            debug!("{}: {} filter, window {}", sounding.id, mode, config.filter.window_size);
            smooth_sounding(sounding, config.filter.window_size, mode)?
        }
        None => sounding.clone(),
    };

    let band_filter = if config.filter.band_filter {
        let (kept, outcome) = band_filter_sounding(
            &cleaned,
            config.binning.step,
            config.filter.band_multiplier,
            config.binning.closure,
        )?;
        info!(
            "{}: band filter dropped {} of {} samples",
            sounding.id,
            outcome.outliers.len(),
            cleaned.len()
        );
        cleaned = kept;
        Some(outcome)
    } else {
        None
    };

    let geotech = &config.geotech;
    let qt = corrected_tip_resistance(&cleaned.qc, &cleaned.u2, geotech.area_ratio);

    let assignment = assign_layers(&cleaned.depth, layers, groundwater)?;
    let layer_names = (0..assignment.len())
        .map(|i| assignment.layer(layers, i).name.clone())
        .collect();

    let stresses = soil_stresses(
        &cleaned.depth,
        &assignment.unit_weight,
        &assignment.groundwater_depth,
        geotech.gamma_w,
    )?;

    let soil = soil_index(
        &cleaned.depth,
        &qt,
        &cleaned.fs,
        stresses.total(),
        stresses.effective(),
        geotech.pa_atm,
    )?;

    let residual = residual_strength(
        &cleaned.depth,
        &qt,
        stresses.effective(),
        &soil,
        geotech.pa_atm,
        &config.residual,
    )?;

    let analysis = SoundingAnalysis {
        sounding: cleaned,
        band_filter,
        qt,
        layers: assignment,
        layer_names,
        stresses,
        soil,
        residual,
    };

    for warning in analysis.warnings() {
        warn!("{}: {}", analysis.sounding.id, warning);
    }

    Ok(analysis)
}

/// Output file name of a sounding.
pub fn output_file_name(id: &str) -> String {
    format!("CPT_{}.csv", id)
}

/// Summary of one processed file.
#[derive(Debug, Clone)]
pub struct SoundingReport {
    pub id: String,
    pub source: PathBuf,
    pub output_csv: PathBuf,
    pub plot: Option<PathBuf>,
    pub samples: usize,
    pub warnings: usize,
}

/// Load, analyze and write a single sounding file.
pub fn process_file(
    path: &Path,
    layers: &LayerTable,
    groundwater: &GroundwaterTable,
    config: &PipelineConfig,
    output_dir: &Path,
    plot: bool,
) -> Result<SoundingReport> {
    let sounding = load_sounding(path, config.geotech.pressure_unit)
        .with_context(|| format!("Failed to load sounding: {}", path.display()))?;

    let analysis = analyze_sounding(&sounding, layers, groundwater, config)
        .with_context(|| format!("Failed to process sounding {} ({})", sounding.id, path.display()))?;

    let output_csv = output_dir.join(output_file_name(&sounding.id));
    writers::write_columns_csv(&output_csv, &analysis.columns())
        .with_context(|| format!("Failed to write results: {}", output_csv.display()))?;

    let plot_path = if plot {
        let png = output_csv.with_extension("png");
        visualization::plot_profile(&png, &analysis.sounding.depth, &analysis.residual_series())
            .with_context(|| format!("Failed to plot profile: {}", png.display()))?;
        Some(png)
    } else {
        None
    };

    Ok(SoundingReport {
        id: sounding.id,
        source: path.to_path_buf(),
        output_csv,
        plot: plot_path,
        samples: analysis.len(),
        warnings: analysis.warnings().count(),
    })
}

/// Sounding files (`.csv` or `.txt`) in a directory, sorted by name.
pub fn find_sounding_files(directory: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(directory)
        .with_context(|| format!("Failed to read directory: {}", directory.display()))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| ext.eq_ignore_ascii_case("csv") || ext.eq_ignore_ascii_case("txt"))
                    .unwrap_or(false)
        })
        .collect();

    files.sort();
    Ok(files)
}

/// Process many sounding files in parallel.
///
/// Soundings are independent; a failure is logged and returned for that file only.
/// Files whose sounding ids collide would share an output file, so all of them fail
/// without writing anything. Results come back in input order.
pub fn process_batch(
    files: &[PathBuf],
    layers: &LayerTable,
    groundwater: &GroundwaterTable,
    config: &PipelineConfig,
    output_dir: &Path,
    plot: bool,
) -> Vec<(PathBuf, Result<SoundingReport>)> {
    let mut id_counts: HashMap<String, usize> = HashMap::new();
    for path in files {
        *id_counts.entry(sounding_id_from_path(path)).or_insert(0) += 1;
    }

    files
        .par_iter()
        .map(|path| {
            let id = sounding_id_from_path(path);
            let result = match id_counts.get(&id) {
                Some(&count) if count > 1 => Err(anyhow!(
                    "Sounding id {} of {} is shared by {} input files; {} not written",
                    id,
                    path.display(),
                    count,
                    output_file_name(&id)
                )),
                _ => process_file(path, layers, groundwater, config, output_dir, plot),
            };
            match &result {
                Ok(report) => info!(
                    "{} -> {} ({} samples)",
                    path.display(),
                    report.output_csv.display(),
                    report.samples
                ),
                Err(e) => error!("{:#}", e),
            }
            (path.clone(), result)
        })
        .collect()
}
