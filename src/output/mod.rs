//! Output writers for perf event, metric and mapfile files.
//!
//! This module handles writing data to disk:
//! - per-topic event JSON
//! - per-model metric JSON
//! - the perf `mapfile.csv`

pub mod json;
pub mod mapfile;

// Re-export main functions
pub use json::{
    metrics_file_name, read_metrics, to_json_string, topic_file_name, write_events, write_json,
    write_metrics,
};
pub use mapfile::write_mapfile;
