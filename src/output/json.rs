//! JSON writers for perf event and metric files.
//!
//! Files use sorted keys, four-space indentation and a trailing newline.

use crate::events::PerfEventJson;
use crate::metrics::Metric;
use crate::utils::error::OutputError;
use log::{debug, info};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Serialize a value the way perf's JSON files are laid out
pub fn to_json_string<T: Serialize + ?Sized>(value: &T) -> Result<String, OutputError> {
    let mut buffer = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    value
        .serialize(&mut serializer)
        .map_err(OutputError::SerializationFailed)?;
    buffer.push(b'\n');

    String::from_utf8(buffer).map_err(|e| OutputError::InvalidPath(e.to_string()))
}

/// Write a value to a JSON file
///
/// **Public** - shared by the event and metric writers
///
/// # Arguments
/// * `value` - data to write
/// * `output_path` - path to output JSON file
///
/// # Errors
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::SerializationFailed` - JSON serialization error
/// * `OutputError::InvalidPath` - path cannot be created or is invalid
pub fn write_json<T: Serialize + ?Sized>(
    value: &T,
    output_path: impl AsRef<Path>,
) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();
    debug!("Writing JSON to: {}", output_path.display());

    validate_output_path(output_path)?;
    create_parent(output_path)?;

    let text = to_json_string(value)?;
    let file = File::create(output_path).map_err(OutputError::WriteFailed)?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(text.as_bytes())
        .map_err(OutputError::WriteFailed)?;
    writer.flush().map_err(OutputError::WriteFailed)?;

    Ok(())
}

/// `Virtual Memory` → `virtual-memory.json`
pub fn topic_file_name(topic: &str) -> String {
    format!("{}.json", topic.to_lowercase().replace(' ', "-"))
}

/// `BDW-DE` → `bdwde-metrics.json`
pub fn metrics_file_name(shortname: &str) -> String {
    format!("{}-metrics.json", shortname.to_lowercase().replace('-', ""))
}

/// Write one file per topic, events sorted by name
///
/// # Returns
/// Number of files written
pub fn write_events(
    dir: impl AsRef<Path>,
    topics: &BTreeMap<String, Vec<PerfEventJson>>,
) -> Result<usize, OutputError> {
    let dir = dir.as_ref();

    for (topic, events) in topics {
        let mut sorted: Vec<&PerfEventJson> = events.iter().collect();
        sorted.sort_by(|a, b| a.get("EventName").cmp(&b.get("EventName")));
        write_json(&sorted, dir.join(topic_file_name(topic)))?;
    }

    info!("Wrote {} event files to {}", topics.len(), dir.display());
    Ok(topics.len())
}

/// Write a model's metrics file
///
/// # Returns
/// Path of the written file
pub fn write_metrics(
    dir: impl AsRef<Path>,
    shortname: &str,
    metrics: &[Metric],
) -> Result<PathBuf, OutputError> {
    let path = dir.as_ref().join(metrics_file_name(shortname));
    write_json(metrics, &path)?;
    info!("Wrote {} metrics to {}", metrics.len(), path.display());
    Ok(path)
}

/// Read a metrics file back
///
/// # Errors
/// * `OutputError::WriteFailed` - file read error (reusing WriteFailed for I/O)
/// * `OutputError::SerializationFailed` - JSON parse error
pub fn read_metrics(input_path: impl AsRef<Path>) -> Result<Vec<Metric>, OutputError> {
    let input_path = input_path.as_ref();
    debug!("Reading metrics from: {}", input_path.display());

    let file = File::open(input_path).map_err(OutputError::WriteFailed)?;
    let metrics: Vec<Metric> =
        serde_json::from_reader(file).map_err(OutputError::SerializationFailed)?;

    debug!("Loaded {} metrics", metrics.len());
    Ok(metrics)
}

pub(crate) fn create_parent(path: &Path) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!(
                    "Cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }
    Ok(())
}

/// Validate that output path is writable
///
/// **Private** - internal validation
pub(crate) fn validate_output_path(path: &Path) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }

    if path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }

    Ok(())
}
