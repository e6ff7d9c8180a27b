//! Cone penetration test (CPT) processing pipeline.
//!
//! This crate provides tools for:
//! - Loading soundings from headed CSV files and tab-delimited instrument exports
//! - Cleaning tip resistance with the Settle3D band filter or a rolling median/average
//! - Mapping samples onto a layer table and integrating overburden stresses
//! - Computing the soil behaviour type index `Ic` by fixed-point iteration
//! - Residual strength from Olson & Stark (2002), Robertson (2010) and
//!   Idriss & Boulanger (2015)
//! - Processing many soundings in parallel
//!
//! # Example
//!
//! ```no_run
//! use cpt_pipeline::core::loaders::{load_sounding, GroundwaterTable, Layer, LayerTable};
//! use cpt_pipeline::processors::pipeline::analyze_sounding;
//! use cpt_pipeline::PipelineConfig;
//!
//! let config = PipelineConfig::default();
//! let sounding = load_sounding("SITE-CPT07-2021.csv", config.geotech.pressure_unit).unwrap();
//! let layers = LayerTable::new(vec![Layer::new("sand", 0.0, 18.0, "gw")]).unwrap();
//! let groundwater = GroundwaterTable::single("gw", 2.5);
//! let analysis = analyze_sounding(&sounding, &layers, &groundwater, &config).unwrap();
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{BinningConfig, FilterConfig, GeotechConfig, PipelineConfig, ResidualConfig};
pub use crate::core::error::{ConfigError, ConvergenceWarning, CptError, DomainError};
pub use crate::core::loaders::{GroundwaterTable, Layer, LayerTable, Sounding};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
