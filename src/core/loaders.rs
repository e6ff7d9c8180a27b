//! Data types and loaders for CPT soundings and site profiles.
//!
//! This module provides parsers for:
//! - Headed CSV soundings (`depth,qc,fs,u2`, any order, extra columns ignored)
//! - Tab-delimited instrument exports (7 preamble rows, qc in MPa, fs/u2 in kPa)
//! - Layer tables (`name,top_depth,unit_weight,gwt_id`)
//! - Groundwater tables (`id,depth`)

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use regex::Regex;
use thiserror::Error;

use super::error::DomainError;
use super::transforms::to_kpa;
use crate::config::PressureUnit;

/// Rows before the data block in an instrument export.
const INSTRUMENT_PREAMBLE_ROWS: usize = 7;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Missing required column '{column}' in {path}")]
    MissingColumn { column: &'static str, path: PathBuf },

    #[error("Parse error in {path}, row {row}: {message}")]
    ParseError {
        path: PathBuf,
        row: usize,
        message: String,
    },

    #[error("Invalid data in {path}: {source}")]
    Domain {
        path: PathBuf,
        #[source]
        source: DomainError,
    },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// A single CPT sounding in structure-of-arrays form.
///
/// Pressure channels are in kPa, depth in metres below ground surface.
#[derive(Debug, Clone, PartialEq)]
pub struct Sounding {
    /// Sounding identifier (e.g. `CPT07`).
    pub id: String,
    /// Depth of each sample, strictly increasing.
    pub depth: Vec<f64>,
    /// Cone tip resistance.
    pub qc: Vec<f64>,
    /// Sleeve friction.
    pub fs: Vec<f64>,
    /// Pore pressure behind the cone (u2 position).
    pub u2: Vec<f64>,
    /// Source file path.
    pub source_path: Option<PathBuf>,
}

impl Sounding {
    /// Creates a sounding from channel vectors.
    pub fn new(
        id: impl Into<String>,
        depth: Vec<f64>,
        qc: Vec<f64>,
        fs: Vec<f64>,
        u2: Vec<f64>,
    ) -> Self {
        Self {
            id: id.into(),
            depth,
            qc,
            fs,
            u2,
            source_path: None,
        }
    }

    /// Returns the number of samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.depth.len()
    }

    /// Returns true if the sounding has no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.depth.is_empty()
    }

    /// Check channel lengths and depth ordering.
    pub fn validate(&self) -> std::result::Result<(), DomainError> {
        validate_depths(&self.depth)?;
        let n = self.depth.len();
        for (name, channel) in [("qc", &self.qc), ("fs", &self.fs), ("u2", &self.u2)] {
            if channel.len() != n {
                return Err(DomainError::LengthMismatch {
                    left: "depth",
                    left_len: n,
                    right: name,
                    right_len: channel.len(),
                });
            }
        }
        Ok(())
    }

    /// Keep only the samples at `indices`, in the given order.
    pub fn select(&self, indices: &[usize]) -> Sounding {
        let pick = |channel: &[f64]| indices.iter().map(|&i| channel[i]).collect::<Vec<_>>();
        Sounding {
            id: self.id.clone(),
            depth: pick(&self.depth),
            qc: pick(&self.qc),
            fs: pick(&self.fs),
            u2: pick(&self.u2),
            source_path: self.source_path.clone(),
        }
    }
}

/// Require a non-empty, finite, strictly increasing depth array.
pub fn validate_depths(depth: &[f64]) -> std::result::Result<(), DomainError> {
    if depth.is_empty() {
        return Err(DomainError::Empty { what: "depth" });
    }
    for (index, &d) in depth.iter().enumerate() {
        if !d.is_finite() {
            return Err(DomainError::NonFiniteDepth { index, depth: d });
        }
        if index > 0 && d <= depth[index - 1] {
            return Err(DomainError::NonMonotonicDepth {
                index,
                depth: d,
                previous: depth[index - 1],
            });
        }
    }
    Ok(())
}

/// One row of a layer table.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    pub name: String,
    /// Depth of the layer top.
    pub top_depth: f64,
    /// Total unit weight (kN/m3).
    pub unit_weight: f64,
    /// Key into the [`GroundwaterTable`].
    pub groundwater_id: String,
}

impl Layer {
    pub fn new(
        name: impl Into<String>,
        top_depth: f64,
        unit_weight: f64,
        groundwater_id: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            top_depth,
            unit_weight,
            groundwater_id: groundwater_id.into(),
        }
    }
}

/// Layers ordered by strictly increasing top depth. The last layer extends downwards
/// without limit.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerTable {
    layers: Vec<Layer>,
}

impl LayerTable {
    pub fn new(layers: Vec<Layer>) -> std::result::Result<Self, DomainError> {
        if layers.is_empty() {
            return Err(DomainError::EmptyLayerTable);
        }
        for pair in layers.windows(2) {
            if !(pair[1].top_depth > pair[0].top_depth) {
                return Err(DomainError::LayerOrder {
                    name: pair[1].name.clone(),
                    top: pair[1].top_depth,
                    previous: pair[0].top_depth,
                });
            }
        }
        Ok(Self { layers })
    }

    #[inline]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Groundwater depth per groundwater id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroundwaterTable {
    depths: BTreeMap<String, f64>,
}

impl GroundwaterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// A table with a single entry.
    pub fn single(id: impl Into<String>, depth: f64) -> Self {
        let mut table = Self::new();
        table.insert(id, depth);
        table
    }

    pub fn insert(&mut self, id: impl Into<String>, depth: f64) {
        self.depths.insert(id.into(), depth);
    }

    /// Groundwater depth for `id`.
    pub fn depth_of(&self, id: &str) -> std::result::Result<f64, DomainError> {
        self.depths
            .get(id)
            .copied()
            .ok_or_else(|| DomainError::UnknownGroundwater(id.to_string()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.depths.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.depths.is_empty()
    }
}

/// Derive a sounding id from a file name.
///
/// Files are named `<site>-<id>-<rest>`; the second dash-separated token is the id.
/// Falls back to the file stem when there is no dash.
pub fn sounding_id_from_path(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "sounding".to_string());

    match Regex::new(r"^[^-]*-([^-]+)") {
        Ok(pattern) => pattern
            .captures(&stem)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or(stem),
        Err(_) => stem,
    }
}

/// Normalize a header cell: lowercase, units in parentheses dropped, separators to `_`.
fn normalize_header(name: &str) -> String {
    let base = name.split('(').next().unwrap_or(name);
    base.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect::<String>()
        .trim_matches('_')
        .to_string()
}

fn find_column(
    headers: &StringRecord,
    aliases: &[&str],
    column: &'static str,
    path: &Path,
) -> Result<usize> {
    headers
        .iter()
        .map(normalize_header)
        .position(|h| aliases.contains(&h.as_str()))
        .ok_or_else(|| LoaderError::MissingColumn {
            column,
            path: path.to_path_buf(),
        })
}

fn parse_field(record: &StringRecord, idx: usize, path: &Path, row: usize) -> Result<f64> {
    let raw = record.get(idx).unwrap_or("").trim();
    raw.parse::<f64>().map_err(|_| LoaderError::ParseError {
        path: path.to_path_buf(),
        row,
        message: format!("invalid number '{}' in column {}", raw, idx),
    })
}

/// Load a sounding from a headed CSV file.
///
/// Required columns: `depth`, `qc`, `fs`; `u2` is optional (zero when absent or empty).
/// Pressures are converted from `unit` to kPa.
///
/// # Errors
///
/// Returns an error if the file cannot be read, a required column is missing, a value
/// does not parse, or the depths are not strictly increasing.
pub fn load_sounding_csv<P: AsRef<Path>>(path: P, unit: PressureUnit) -> Result<Sounding> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let depth_idx = find_column(&headers, &["depth"], "depth", path)?;
    let qc_idx = find_column(&headers, &["qc"], "qc", path)?;
    let fs_idx = find_column(&headers, &["fs"], "fs", path)?;
    let u2_idx = find_column(&headers, &["u2"], "u2", path).ok();

    let mut depth = Vec::with_capacity(1024);
    let mut qc = Vec::with_capacity(1024);
    let mut fs = Vec::with_capacity(1024);
    let mut u2 = Vec::with_capacity(1024);

    for (row, result) in reader.records().enumerate() {
        let record = result?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }

        depth.push(parse_field(&record, depth_idx, path, row + 1)?);
        qc.push(to_kpa(parse_field(&record, qc_idx, path, row + 1)?, unit));
        fs.push(to_kpa(parse_field(&record, fs_idx, path, row + 1)?, unit));

        let pore = match u2_idx {
            Some(idx) if !record.get(idx).unwrap_or("").is_empty() => {
                parse_field(&record, idx, path, row + 1)?
            }
            _ => 0.0,
        };
        u2.push(to_kpa(pore, unit));
    }

    finish_sounding(path, depth, qc, fs, u2)
}

/// Load a tab-delimited instrument export.
///
/// Layout: 7 preamble lines (blank or not), then columns 0 = depth (m), 3 = u2 (kPa),
/// 4 = qc (MPa), 5 = fs (kPa). Returns all channels in kPa.
///
/// # Errors
///
/// A data row with fewer than six fields is a [`LoaderError::ParseError`].
pub fn load_instrument_export<P: AsRef<Path>>(path: P) -> Result<Sounding> {
    let path = path.as_ref();
    let mut input = BufReader::new(File::open(path)?);

    // Preamble is counted in raw lines; the csv reader would drop blank ones.
    let mut line = String::new();
    for _ in 0..INSTRUMENT_PREAMBLE_ROWS {
        line.clear();
        if input.read_line(&mut line)? == 0 {
            return Err(LoaderError::EmptyFile(path.to_path_buf()));
        }
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(b'\t')
        .quoting(false)
        .trim(csv::Trim::All)
        .from_reader(input);

    let mut depth = Vec::with_capacity(1024);
    let mut qc = Vec::with_capacity(1024);
    let mut fs = Vec::with_capacity(1024);
    let mut u2 = Vec::with_capacity(1024);

    for result in reader.records() {
        let record = result?;
        let row = INSTRUMENT_PREAMBLE_ROWS
            + record.position().map_or(0, |pos| pos.line() as usize);
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        if record.len() < 6 {
            return Err(LoaderError::ParseError {
                path: path.to_path_buf(),
                row,
                message: format!("expected at least 6 fields, found {}", record.len()),
            });
        }

        depth.push(parse_field(&record, 0, path, row)?);
        u2.push(parse_field(&record, 3, path, row)?);
        qc.push(to_kpa(parse_field(&record, 4, path, row)?, PressureUnit::Mpa));
        fs.push(parse_field(&record, 5, path, row)?);
    }

    finish_sounding(path, depth, qc, fs, u2)
}

/// Load a sounding, choosing the reader by extension (`.txt` = instrument export).
pub fn load_sounding<P: AsRef<Path>>(path: P, unit: PressureUnit) -> Result<Sounding> {
    let path = path.as_ref();
    let is_export = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("txt"))
        .unwrap_or(false);

    if is_export {
        load_instrument_export(path)
    } else {
        load_sounding_csv(path, unit)
    }
}

fn finish_sounding(
    path: &Path,
    depth: Vec<f64>,
    qc: Vec<f64>,
    fs: Vec<f64>,
    u2: Vec<f64>,
) -> Result<Sounding> {
    if depth.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    let mut sounding = Sounding::new(sounding_id_from_path(path), depth, qc, fs, u2);
    sounding.source_path = Some(path.to_path_buf());
    sounding.validate().map_err(|source| LoaderError::Domain {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(sounding)
}

/// Load a layer table from CSV (`name,top_depth,unit_weight,gwt_id`).
pub fn load_layer_table<P: AsRef<Path>>(path: P) -> Result<LayerTable> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let name_idx = find_column(&headers, &["name", "layer_name", "layer"], "name", path)?;
    let top_idx = find_column(&headers, &["top_depth", "top"], "top_depth", path)?;
    let weight_idx = find_column(
        &headers,
        &["unit_weight", "total_unit_weight", "gamma"],
        "unit_weight",
        path,
    )?;
    let gwt_idx = find_column(&headers, &["gwt_id", "gwt"], "gwt_id", path)?;

    let mut layers = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        layers.push(Layer {
            name: record.get(name_idx).unwrap_or("").to_string(),
            top_depth: parse_field(&record, top_idx, path, row + 1)?,
            unit_weight: parse_field(&record, weight_idx, path, row + 1)?,
            groundwater_id: record.get(gwt_idx).unwrap_or("").to_string(),
        });
    }

    LayerTable::new(layers).map_err(|source| LoaderError::Domain {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a groundwater table from CSV (`id,depth`).
pub fn load_groundwater_table<P: AsRef<Path>>(path: P) -> Result<GroundwaterTable> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let id_idx = find_column(&headers, &["id", "gwt_id", "gwt"], "id", path)?;
    let depth_idx = find_column(&headers, &["depth", "depth_to"], "depth", path)?;

    let mut table = GroundwaterTable::new();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let id = record.get(id_idx).unwrap_or("").to_string();
        table.insert(id, parse_field(&record, depth_idx, path, row + 1)?);
    }

    if table.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }
    Ok(table)
}
