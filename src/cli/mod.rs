//! Command-line interface for the CPT pipeline.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::SmoothingMode;
use crate::core::loaders::{
    load_groundwater_table, load_layer_table, load_sounding, GroundwaterTable, Layer, LayerTable,
};
use crate::core::writers::{self, Column};
use crate::processors::filtering::{band_filter_sounding, smooth_sounding, BandFilterOutcome};
use crate::processors::pipeline::{find_sounding_files, process_batch};
use crate::PipelineConfig;

/// Groundwater id of the layer built from `--unit-weight` / `--gwt-depth`.
const UNIFORM_GWT_ID: &str = "uniform";

#[derive(Parser)]
#[command(name = "cpt-pipeline")]
#[command(about = "Cone penetration test processing pipeline", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute stresses, soil index and residual strength for soundings
    Process {
        /// Sounding file or directory of soundings (.csv / .txt)
        input_path: PathBuf,
        /// Output directory for CPT_<id>.csv files
        output_dir: PathBuf,
        /// Layer table CSV (name,top_depth,unit_weight,gwt_id)
        #[arg(long, requires = "groundwater")]
        layers: Option<PathBuf>,
        /// Groundwater table CSV (id,depth)
        #[arg(long, requires = "layers")]
        groundwater: Option<PathBuf>,
        /// Unit weight of a single uniform layer when no layer table is given (kN/m3)
        #[arg(long, default_value_t = 18.0)]
        unit_weight: f64,
        /// Groundwater depth of the uniform layer; dry profile when omitted
        #[arg(long)]
        gwt_depth: Option<f64>,
        /// Also write a residual strength profile PNG per sounding
        #[arg(long)]
        plot: bool,
    },

    /// Drop tip resistance outliers with the Settle3D band filter
    Filter {
        /// Input sounding file
        input: PathBuf,
        /// Output CSV of retained samples
        output: PathBuf,
        /// Depth bin width (defaults to binning.step)
        #[arg(short, long)]
        width: Option<f64>,
        /// Band multiplier (defaults to filter.band_multiplier)
        #[arg(short, long)]
        multiplier: Option<f64>,
    },

    /// Apply a rolling median or average to qc and fs
    Smooth {
        /// Input sounding file
        input: PathBuf,
        /// Output CSV
        output: PathBuf,
        /// Window size, odd (defaults to filter.window_size)
        #[arg(short, long)]
        window: Option<usize>,
        /// median or average (defaults to filter.smoothing, else median)
        #[arg(long)]
        mode: Option<SmoothingMode>,
    },

    /// Write the default configuration as YAML
    InitConfig {
        /// Output YAML path
        #[arg(default_value = "cpt-pipeline.yaml")]
        output: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<60} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 38 {
            let head: String = value.chars().take(35).collect();
            format!("{}...", head)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<38} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Process {
            input_path,
            output_dir,
            layers,
            groundwater,
            unit_weight,
            gwt_depth,
            plot,
        } => cmd_process(
            &input_path,
            &output_dir,
            layers.as_deref(),
            groundwater.as_deref(),
            unit_weight,
            gwt_depth,
            plot,
            &config,
        ),
        Commands::Filter {
            input,
            output,
            width,
            multiplier,
        } => cmd_filter(&input, &output, width, multiplier, &config),
        Commands::Smooth {
            input,
            output,
            window,
            mode,
        } => cmd_smooth(&input, &output, window, mode, &config),
        Commands::InitConfig { output } => cmd_init_config(&output, &config),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Configuration from `--config`, or the defaults when none is given.
///
/// An unreadable or invalid file is an error; the run never falls back to defaults.
fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            let config = PipelineConfig::from_yaml(path)
                .map_err(|e| anyhow::anyhow!("Failed to load config {}: {}", path.display(), e))?;
            info!("Loaded config from: {}", path.display());
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}

/// Layer and groundwater tables from files, or a single uniform layer.
fn resolve_profile(
    layers: Option<&Path>,
    groundwater: Option<&Path>,
    unit_weight: f64,
    gwt_depth: Option<f64>,
) -> Result<(LayerTable, GroundwaterTable)> {
    match (layers, groundwater) {
        (Some(layers), Some(groundwater)) => {
            let table = load_layer_table(layers)
                .with_context(|| format!("Failed to load layer table: {}", layers.display()))?;
            let gwt = load_groundwater_table(groundwater).with_context(|| {
                format!("Failed to load groundwater table: {}", groundwater.display())
            })?;
            Ok((table, gwt))
        }
        (None, None) => {
            let table = LayerTable::new(vec![Layer::new(
                "uniform",
                0.0,
                unit_weight,
                UNIFORM_GWT_ID,
            )])?;
            let gwt = GroundwaterTable::single(UNIFORM_GWT_ID, gwt_depth.unwrap_or(f64::INFINITY));
            Ok((table, gwt))
        }
        _ => bail!("--layers and --groundwater must be given together"),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_process(
    input_path: &Path,
    output_dir: &Path,
    layers: Option<&Path>,
    groundwater: Option<&Path>,
    unit_weight: f64,
    gwt_depth: Option<f64>,
    plot: bool,
    config: &PipelineConfig,
) -> Result<()> {
    let start = Instant::now();

    let (layer_table, gwt_table) = resolve_profile(layers, groundwater, unit_weight, gwt_depth)?;

    let files = if input_path.is_dir() {
        find_sounding_files(input_path)?
    } else {
        vec![input_path.to_path_buf()]
    };
    if files.is_empty() {
        bail!("No sounding files found in {}", input_path.display());
    }

    println!("Processing {} sounding(s)...", files.len());
    println!("Input: {}", input_path.display());
    println!("Output directory: {}", output_dir.display());
    println!("Layers: {}", layer_table.len());

    let spinner = create_spinner("Computing soil index and residual strength...");
    let results = process_batch(&files, &layer_table, &gwt_table, config, output_dir, plot);
    spinner.finish_and_clear();

    let succeeded = results.iter().filter(|(_, r)| r.is_ok()).count();
    let samples: usize = results
        .iter()
        .filter_map(|(_, r)| r.as_ref().ok())
        .map(|report| report.samples)
        .sum();
    let warnings: usize = results
        .iter()
        .filter_map(|(_, r)| r.as_ref().ok())
        .map(|report| report.warnings)
        .sum();

    print_summary(
        "Processing Complete",
        &[
            ("Input", input_path.display().to_string()),
            ("Output directory", output_dir.display().to_string()),
            ("Soundings", format!("{} of {}", succeeded, files.len())),
            ("Samples", samples.to_string()),
            ("Non-converged", warnings.to_string()),
            ("Plots", plot.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    if succeeded < files.len() {
        bail!("{} sounding(s) failed", files.len() - succeeded);
    }
    Ok(())
}

/// Sibling path `<stem>_<suffix>.csv`.
fn report_path(output: &Path, suffix: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "filter".to_string());
    output.with_file_name(format!("{}_{}.csv", stem, suffix))
}

fn write_bin_report(path: &Path, outcome: &BandFilterOutcome) -> Result<()> {
    let bins = &outcome.binning.bins;
    let stats = &outcome.stats;

    let index: Vec<f64> = (0..stats.len()).map(|i| i as f64).collect();
    let lo: Vec<f64> = (0..bins.len()).map(|i| bins.bounds(i).0).collect();
    let hi: Vec<f64> = (0..bins.len()).map(|i| bins.bounds(i).1).collect();
    let count: Vec<f64> = stats.iter().map(|s| s.count as f64).collect();
    let mean: Vec<f64> = stats.iter().map(|s| s.mean).collect();
    let std: Vec<f64> = stats.iter().map(|s| s.std).collect();
    let above: Vec<f64> = stats.iter().map(|s| s.sigma_above).collect();
    let below: Vec<f64> = stats.iter().map(|s| s.sigma_below).collect();

    writers::write_columns_csv(
        path,
        &[
            Column::numbers("bin", &index),
            Column::numbers("top", &lo),
            Column::numbers("bottom", &hi),
            Column::numbers("count", &count),
            Column::numbers("mean", &mean),
            Column::numbers("std", &std),
            Column::numbers("sigma_above", &above),
            Column::numbers("sigma_below", &below),
            Column::optional("threshold", stats.iter().map(|s| s.threshold).collect()),
        ],
    )
    .with_context(|| format!("Failed to write bin report: {}", path.display()))
}

fn cmd_filter(
    input: &Path,
    output: &Path,
    width: Option<f64>,
    multiplier: Option<f64>,
    config: &PipelineConfig,
) -> Result<()> {
    let start = Instant::now();
    let width = width.unwrap_or(config.binning.step);
    let multiplier = multiplier.unwrap_or(config.filter.band_multiplier);

    println!("Band filtering {}", input.display());
    println!("Bin width: {}", width);
    println!("Multiplier: {}", multiplier);

    let spinner = create_spinner("Filtering tip resistance...");

    let sounding = load_sounding(input, config.geotech.pressure_unit)
        .with_context(|| format!("Failed to load sounding: {}", input.display()))?;
    let (kept, outcome) = band_filter_sounding(&sounding, width, multiplier, config.binning.closure)
        .with_context(|| format!("Band filter failed for {}", input.display()))?;

    writers::write_sounding_csv(output, &kept)
        .with_context(|| format!("Failed to write output: {}", output.display()))?;

    let bins_path = report_path(output, "bins");
    write_bin_report(&bins_path, &outcome)?;

    let outliers_path = report_path(output, "outliers");
    let depth = outcome.outliers.iter().map(|&i| sounding.depth[i]).collect::<Vec<_>>();
    let qc = outcome.outliers.iter().map(|&i| sounding.qc[i]).collect::<Vec<_>>();
    writers::write_columns_csv(
        &outliers_path,
        &[
            Column::numbers("depth", &depth),
            Column::numbers("qc", &qc),
            Column::optional(
                "threshold",
                outcome.outliers.iter().map(|&i| outcome.threshold_of(i)).collect(),
            ),
        ],
    )
    .with_context(|| format!("Failed to write outlier report: {}", outliers_path.display()))?;

    spinner.finish_and_clear();

    print_summary(
        "Band Filter Complete",
        &[
            ("Input file", input.display().to_string()),
            ("Output file", output.display().to_string()),
            ("Bins", outcome.stats.len().to_string()),
            ("Samples kept", outcome.retained.len().to_string()),
            ("Outliers", outcome.outliers.len().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_smooth(
    input: &Path,
    output: &Path,
    window: Option<usize>,
    mode: Option<SmoothingMode>,
    config: &PipelineConfig,
) -> Result<()> {
    let start = Instant::now();
    let window = window.unwrap_or(config.filter.window_size);
    let mode = mode
        .or(config.filter.smoothing)
        .unwrap_or(SmoothingMode::Median);

    let spinner = create_spinner("Smoothing qc and fs...");

    let sounding = load_sounding(input, config.geotech.pressure_unit)
        .with_context(|| format!("Failed to load sounding: {}", input.display()))?;
    let smoothed = smooth_sounding(&sounding, window, mode)
        .with_context(|| format!("Smoothing failed for {}", input.display()))?;
    writers::write_sounding_csv(output, &smoothed)
        .with_context(|| format!("Failed to write output: {}", output.display()))?;

    spinner.finish_and_clear();

    print_summary(
        "Smoothing Complete",
        &[
            ("Input file", input.display().to_string()),
            ("Output file", output.display().to_string()),
            ("Mode", mode.to_string()),
            ("Window", window.to_string()),
            ("Samples", smoothed.len().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_init_config(output: &Path, config: &PipelineConfig) -> Result<()> {
    config
        .to_yaml(output)
        .map_err(|e| anyhow::anyhow!("Failed to write config {}: {}", output.display(), e))?;
    println!("Wrote configuration to {}", output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::tempdir;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_process_arguments() {
        let cli = Cli::try_parse_from([
            "cpt-pipeline",
            "-vv",
            "process",
            "data",
            "out",
            "--gwt-depth",
            "2.5",
            "--plot",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Process {
                gwt_depth, plot, unit_weight, ..
            } => {
                assert_eq!(gwt_depth, Some(2.5));
                assert!(plot);
                assert_eq!(unit_weight, 18.0);
            }
            _ => panic!("Expected process command"),
        }
    }

    #[test]
    fn test_layers_require_groundwater() {
        let result =
            Cli::try_parse_from(["cpt-pipeline", "process", "data", "out", "--layers", "l.csv"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_smoothing_mode() {
        let cli = Cli::try_parse_from(["cpt-pipeline", "smooth", "a.csv", "b.csv", "--mode", "average"])
            .unwrap();
        match cli.command {
            Commands::Smooth { mode, .. } => assert_eq!(mode, Some(SmoothingMode::Average)),
            _ => panic!("Expected smooth command"),
        }
    }

    #[test]
    fn test_uniform_profile() {
        let (table, gwt) = resolve_profile(None, None, 19.0, None).unwrap();
        assert_eq!(table.layers()[0].unit_weight, 19.0);
        assert_eq!(gwt.depth_of(UNIFORM_GWT_ID).unwrap(), f64::INFINITY);
    }

    #[test]
    fn test_load_config_rejects_invalid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "filter:\n  window_size: 10\n").unwrap();

        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{:#}", err).contains("window size"));
        assert!(load_config(Some(&dir.path().join("missing.yaml"))).is_err());
    }

    #[test]
    fn test_load_config_defaults_without_file() {
        let config = load_config(None).unwrap();
        assert_eq!(config.filter.window_size, 11);
    }

    #[test]
    fn test_report_path() {
        let path = report_path(Path::new("/tmp/out/CPT_01.csv"), "bins");
        assert_eq!(path, PathBuf::from("/tmp/out/CPT_01_bins.csv"));
    }

    #[test]
    fn test_filter_command_writes_reports() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("SITE-CPT01-2021.csv");
        let mut rows = String::from("depth,qc,fs,u2\n");
        for i in 1..=10 {
            let qc = if i == 4 { 50_000.0 } else { 2000.0 };
            rows.push_str(&format!("{},{},20,0\n", i as f64 * 0.5, qc));
        }
        std::fs::write(&input, rows).unwrap();
        let output = dir.path().join("filtered.csv");

        cmd_filter(&input, &output, None, None, &PipelineConfig::default()).unwrap();

        assert!(output.exists());
        let outliers = std::fs::read_to_string(dir.path().join("filtered_outliers.csv")).unwrap();
        assert_eq!(outliers.lines().count(), 2);
        assert!(dir.path().join("filtered_bins.csv").exists());
    }
}
