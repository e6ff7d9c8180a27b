//! Error taxonomy shared by the numerical stages.
//!
//! Structural problems ([`DomainError`], [`ConfigError`]) abort the sounding being
//! processed. Per-sample numeric trouble never raises: floors and clamps keep the math
//! in its domain, and a failed fixed-point iteration is reported as a
//! [`ConvergenceWarning`] while the rest of the sounding carries on.

use std::fmt;

use thiserror::Error;

use super::loaders::LoaderError;
use super::writers::WriteError;
use crate::visualization::VisualizationError;

/// Malformed or inconsistent input data.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    #[error("empty input: {what} has no samples")]
    Empty { what: &'static str },

    #[error("length mismatch: {left} has {left_len} samples, {right} has {right_len}")]
    LengthMismatch {
        left: &'static str,
        left_len: usize,
        right: &'static str,
        right_len: usize,
    },

    #[error("depth must be strictly increasing: sample {index} ({depth}) follows {previous}")]
    NonMonotonicDepth {
        index: usize,
        depth: f64,
        previous: f64,
    },

    #[error("depth {depth} at sample {index} is not a finite value")]
    NonFiniteDepth { index: usize, depth: f64 },

    #[error("depth {depth} at sample {index} falls outside every depth bin")]
    OutsideBins { index: usize, depth: f64 },

    #[error("depth {depth} at sample {index} is above the first layer top ({first_top})")]
    UnmappedDepth {
        index: usize,
        depth: f64,
        first_top: f64,
    },

    #[error("layer table is empty")]
    EmptyLayerTable,

    #[error("layer tops must be strictly increasing: '{name}' at {top} follows {previous}")]
    LayerOrder {
        name: String,
        top: f64,
        previous: f64,
    },

    #[error("unknown groundwater id '{0}'")]
    UnknownGroundwater(String),

    #[error("bin edges must be strictly increasing and contain at least two values")]
    InvalidBinEdges,
}

/// Invalid processing parameters.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("window size must be odd and positive, got {0}")]
    WindowSize(usize),

    #[error("bin width must be positive and finite, got {0}")]
    BinWidth(f64),

    #[error("bin width {step} over {max_depth} m gives more than {limit} bins")]
    TooManyBins {
        step: f64,
        max_depth: f64,
        limit: usize,
    },

    #[error("band multiplier must be finite, got {0}")]
    BandMultiplier(f64),

    #[error("{name} must be positive and finite, got {value}")]
    NonPositive { name: &'static str, value: f64 },

    #[error("unrecognized {kind} '{value}'")]
    Unrecognized { kind: &'static str, value: String },
}

/// Any failure of the crate: structural input problems plus file I/O.
#[derive(Debug, Error)]
pub enum CptError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoaderError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Plot(#[from] VisualizationError),
}

/// Result type for the numerical stages.
pub type Result<T> = std::result::Result<T, CptError>;

/// Stage that ran a per-sample fixed-point iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterationStage {
    /// Stress exponent `n` of the soil behaviour type index.
    SoilIndexExponent,
    /// Stress exponent `m` of the Idriss & Boulanger (2015) normalization.
    IdrissBoulangerExponent,
}

impl fmt::Display for IterationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IterationStage::SoilIndexExponent => write!(f, "Ic exponent n"),
            IterationStage::IdrissBoulangerExponent => write!(f, "I&B 2015 exponent m"),
        }
    }
}

/// A sample whose iteration hit the cap. Non-fatal; the sample's dependent outputs are
/// left undefined.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvergenceWarning {
    pub stage: IterationStage,
    pub index: usize,
    pub depth: f64,
    pub iterations: usize,
}

impl fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} did not converge after {} iterations at sample {} (depth {})",
            self.stage, self.iterations, self.index, self.depth
        )
    }
}
