//! Writer for perf's `mapfile.csv`.

use super::json::{create_parent, validate_output_path};
use crate::arch::Model;
use crate::utils::error::OutputError;
use log::info;
use std::path::Path;

/// Write one mapfile line per model
pub fn write_mapfile(models: &[Model], output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();
    info!("Writing mapfile to {}", output_path.display());

    validate_output_path(output_path)?;
    create_parent(output_path)?;

    let text: String = models
        .iter()
        .map(|model| model.mapfile_line() + "\n")
        .collect();
    std::fs::write(output_path, text).map_err(OutputError::WriteFailed)
}
