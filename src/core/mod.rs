//! Core data types, numeric helpers and I/O.

pub mod error;
pub mod iteration;
pub mod loaders;
pub mod transforms;
pub mod writers;

pub use error::{ConfigError, ConvergenceWarning, CptError, DomainError};
pub use loaders::{GroundwaterTable, Layer, LayerTable, LoaderError, Sounding};
pub use writers::{write_columns_csv, write_sounding_csv, Column, WriteError};
