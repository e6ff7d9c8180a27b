//! Configuration types for the CPT pipeline.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::error::ConfigError;

/// Which side of a depth interval is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalClosure {
    /// `[lo, hi)`
    #[default]
    Left,
    /// `(lo, hi]`
    Right,
}

impl FromStr for IntervalClosure {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(IntervalClosure::Left),
            "right" => Ok(IntervalClosure::Right),
            other => Err(ConfigError::Unrecognized {
                kind: "interval closure",
                value: other.to_string(),
            }),
        }
    }
}

/// Statistic used by the rolling filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmoothingMode {
    Median,
    Average,
}

impl FromStr for SmoothingMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "median" | "rolling median" => Ok(SmoothingMode::Median),
            "average" | "mean" | "rolling average" => Ok(SmoothingMode::Average),
            other => Err(ConfigError::Unrecognized {
                kind: "smoothing mode",
                value: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for SmoothingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SmoothingMode::Median => write!(f, "median"),
            SmoothingMode::Average => write!(f, "average"),
        }
    }
}

/// Unit of the pressure channels (qc, fs, u2) in input files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PressureUnit {
    #[default]
    Kpa,
    Mpa,
    Tsf,
}

impl FromStr for PressureUnit {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kpa" => Ok(PressureUnit::Kpa),
            "mpa" => Ok(PressureUnit::Mpa),
            "tsf" => Ok(PressureUnit::Tsf),
            other => Err(ConfigError::Unrecognized {
                kind: "pressure unit",
                value: other.to_string(),
            }),
        }
    }
}

/// How the Idriss & Boulanger (2015) stress exponent `m` is resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExponentMode {
    /// Iterate to a fixed point.
    #[default]
    Converge,
    /// One update from the 0.52 seed, without checking convergence.
    SingleStep,
}

/// Depth binning parameters, shared by every depth-grouped statistic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinningConfig {
    /// Bin width in depth units
    #[serde(default = "default_bin_step")]
    pub step: f64,

    /// Closed side of each bin
    #[serde(default)]
    pub closure: IntervalClosure,
}

fn default_bin_step() -> f64 {
    5.0
}

impl Default for BinningConfig {
    fn default() -> Self {
        Self {
            step: default_bin_step(),
            closure: IntervalClosure::Left,
        }
    }
}

/// Cleaning filters applied to the raw channels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Rolling window size (odd)
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// Rolling filter applied to qc and fs; `None` disables it
    #[serde(default)]
    pub smoothing: Option<SmoothingMode>,

    /// Drop qc outliers with the Settle3D band filter
    #[serde(default)]
    pub band_filter: bool,

    /// Multiplier `BS` on the neighbouring-bin deviation
    #[serde(default = "default_band_multiplier")]
    pub band_multiplier: f64,
}

fn default_window_size() -> usize {
    11
}

fn default_band_multiplier() -> f64 {
    1.0
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            smoothing: None,
            band_filter: false,
            band_multiplier: default_band_multiplier(),
        }
    }
}

/// Physical constants and input conventions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeotechConfig {
    /// Atmospheric pressure (kPa)
    #[serde(default = "default_pa_atm")]
    pub pa_atm: f64,

    /// Unit weight of water (kN/m3)
    #[serde(default = "default_gamma_w")]
    pub gamma_w: f64,

    /// Cone net area ratio used for qt = qc + (1 - a) u2
    #[serde(default = "default_area_ratio")]
    pub area_ratio: f64,

    /// Unit of qc, fs and u2 in input files
    #[serde(default)]
    pub pressure_unit: PressureUnit,
}

fn default_pa_atm() -> f64 {
    101.325
}

fn default_gamma_w() -> f64 {
    9.81
}

fn default_area_ratio() -> f64 {
    0.8
}

impl Default for GeotechConfig {
    fn default() -> Self {
        Self {
            pa_atm: default_pa_atm(),
            gamma_w: default_gamma_w(),
            area_ratio: default_area_ratio(),
            pressure_unit: PressureUnit::Kpa,
        }
    }
}

/// Residual strength correlation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResidualConfig {
    /// Fines content correction `C_FC` added to Ic (I&B 2015)
    #[serde(default)]
    pub fines_correction: f64,

    /// Resolution of the I&B 2015 exponent
    #[serde(default)]
    pub ib_exponent: ExponentMode,
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub binning: BinningConfig,

    #[serde(default)]
    pub filter: FilterConfig,

    #[serde(default)]
    pub geotech: GeotechConfig,

    #[serde(default)]
    pub residual: ResidualConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject parameters no stage can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.binning.step > 0.0 && self.binning.step.is_finite()) {
            return Err(ConfigError::BinWidth(self.binning.step));
        }
        if self.filter.window_size == 0 || self.filter.window_size % 2 == 0 {
            return Err(ConfigError::WindowSize(self.filter.window_size));
        }
        if !self.filter.band_multiplier.is_finite() {
            return Err(ConfigError::BandMultiplier(self.filter.band_multiplier));
        }
        for (name, value) in [
            ("pa_atm", self.geotech.pa_atm),
            ("gamma_w", self.geotech.gamma_w),
        ] {
            if !(value > 0.0 && value.is_finite()) {
                return Err(ConfigError::NonPositive { name, value });
            }
        }
        Ok(())
    }
}
