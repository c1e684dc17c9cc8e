//! Admission register analytics: normalizes an admission register and derives
//! year/course statistics, date-wise admissions and a filterable student roster.

pub mod error;
pub mod loader;
pub mod logging;
pub mod models;
pub mod normalizer;
pub mod render;
pub mod roster;
pub mod stats;

use std::path::Path;

pub use error::{AdmissionError, FilterDimension, Result};
pub use loader::{AdmissionLoader, LoadedSource, SourceFormat};
pub use models::{CanonicalRecord, CanonicalTable, Config, DefaultSelection, RawTable};
pub use normalizer::{Normalized, Normalizer};
pub use roster::{build_roster, FilterSelection, RosterView};
pub use stats::{date_course_stats, year_course_stats, GroupedStats, RowKind};

/// Finds, reads and normalizes the register in `data_dir` using `config`.
pub fn load_register(config: &Config, data_dir: &Path) -> Result<(LoadedSource, Normalized)> {
    let source = AdmissionLoader::new(&config.source_extensions).load_from_directory(data_dir)?;
    let normalized = Normalizer::from_config(config).normalize(&source.table)?;
    Ok((source, normalized))
}
