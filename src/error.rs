//! Error types for loading, normalizing and filtering admission data.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Filter dimension a roster selection applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDimension {
    Year,
    Course,
}

impl fmt::Display for FilterDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterDimension::Year => f.write_str("year"),
            FilterDimension::Course => f.write_str("course"),
        }
    }
}

/// Errors surfaced to the user at the load or roster boundary.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// No source file was found, or the source holds no data rows.
    #[error("no admission data available: {reason}")]
    DataUnavailable { reason: String },

    /// One or more required columns are missing from the source.
    #[error("required column(s) missing: {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    /// The source exists but could not be read as a table in any supported encoding.
    #[error("could not parse {path} as tabular data (tried {}): {message}", tried.join(", "))]
    ParseFailure {
        path: PathBuf,
        tried: Vec<&'static str>,
        message: String,
    },

    /// A roster was requested with nothing selected on one dimension.
    #[error("select at least one {dimension} before generating the list")]
    NoFilterSelected { dimension: FilterDimension },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write export {path}: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

pub type Result<T> = std::result::Result<T, AdmissionError>;
