//! Numerical processing stages.

pub mod binning;
pub mod filtering;
pub mod layers;
pub mod pipeline;
pub mod residual;
pub mod soil_index;
pub mod stress;

// Re-export key types for convenience
pub use binning::{bin_depths, BinSpec, DepthBinning, DepthBins};
pub use filtering::{band_filter, rolling_filter, BandFilterOutcome, BinStatistics};
pub use layers::{assign_layers, map_layers, LayerAssignment};
pub use pipeline::{analyze_sounding, process_batch, SoundingAnalysis, SoundingReport};
pub use residual::{residual_strength, ResidualProfile, ResidualRecord};
pub use soil_index::{soil_index, SoilIndexProfile, SoilIndexRecord};
pub use stress::{soil_stresses, StressProfile};
