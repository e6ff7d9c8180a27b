//! CSV writers for soundings and per-sample results.
//!
//! Results are written column-wise: callers describe each output column with a
//! [`Column`] and [`write_columns_csv`] lays them out as rows. Undefined values
//! (`None`, NaN or infinite, e.g. the groundwater depth of a dry profile) are written as
//! empty cells.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use thiserror::Error;

use super::loaders::Sounding;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to flush data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Columns of unequal length.
    #[error("column '{column}' has {found} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Cell contents of one output column.
#[derive(Debug, Clone)]
pub enum ColumnValues<'a> {
    Numbers(&'a [f64]),
    Optional(Vec<Option<f64>>),
    Labels(Vec<&'a str>),
}

/// A named output column.
#[derive(Debug, Clone)]
pub struct Column<'a> {
    pub name: &'a str,
    pub values: ColumnValues<'a>,
}

impl<'a> Column<'a> {
    pub fn numbers(name: &'a str, values: &'a [f64]) -> Self {
        Self {
            name,
            values: ColumnValues::Numbers(values),
        }
    }

    pub fn optional(name: &'a str, values: Vec<Option<f64>>) -> Self {
        Self {
            name,
            values: ColumnValues::Optional(values),
        }
    }

    pub fn labels(name: &'a str, values: Vec<&'a str>) -> Self {
        Self {
            name,
            values: ColumnValues::Labels(values),
        }
    }

    pub fn len(&self) -> usize {
        match &self.values {
            ColumnValues::Numbers(v) => v.len(),
            ColumnValues::Optional(v) => v.len(),
            ColumnValues::Labels(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn cell(&self, row: usize) -> String {
        match &self.values {
            ColumnValues::Numbers(v) => format_number(Some(v[row])),
            ColumnValues::Optional(v) => format_number(v[row]),
            ColumnValues::Labels(v) => v[row].to_string(),
        }
    }
}

fn format_number(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.6}", v),
        _ => String::new(),
    }
}

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

fn create_csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(csv::Writer::from_writer(BufWriter::new(file)))
}

/// Write columns side by side to a headed CSV file.
///
/// # Errors
///
/// Returns an error if the columns differ in length, or the file cannot be created or
/// written. Parent directories are created as needed.
pub fn write_columns_csv(path: &Path, columns: &[Column<'_>]) -> Result<()> {
    let rows = columns.first().map_or(0, Column::len);
    if let Some(bad) = columns.iter().find(|c| c.len() != rows) {
        return Err(WriteError::LengthMismatch {
            column: bad.name.to_string(),
            expected: rows,
            found: bad.len(),
        });
    }

    ensure_parent_dirs(path)?;
    let mut writer = create_csv_writer(path)?;
    let path_str = path.display().to_string();

    writer
        .write_record(columns.iter().map(|c| c.name))
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for row in 0..rows {
        writer
            .write_record(columns.iter().map(|c| c.cell(row)))
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write the raw channels of a sounding as `depth,qc,fs,u2` (kPa).
pub fn write_sounding_csv(path: &Path, sounding: &Sounding) -> Result<()> {
    write_columns_csv(
        path,
        &[
            Column::numbers("depth", &sounding.depth),
            Column::numbers("qc", &sounding.qc),
            Column::numbers("fs", &sounding.fs),
            Column::numbers("u2", &sounding.u2),
        ],
    )
}
