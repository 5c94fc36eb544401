//! Configuration and constants for the generator.

use std::time::Duration;

/// Default timeout for HTTP fetches
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Default output directory
pub const DEFAULT_OUTDIR: &str = "perf";

/// Upper bound on whole-formula substitution passes
pub const MAX_RESOLVE_PASSES: usize = 64;

/// Built-in declarative rule set
pub const DEFAULT_RULES: &str = include_str!("../../config/rules.toml");

// Files looked up relative to the base path
pub const MAPFILE_NAME: &str = "mapfile.csv";
pub const TMA_METRICS_PATH: &str = "/TMA_Metrics-full.csv";
pub const ECORE_TMA_METRICS_PATH: &str = "/E-core_TMA_Metrics.csv";

// Keys into a model's file table
pub const FILE_TMA_METRICS: &str = "tma metrics";
pub const FILE_ECORE_TMA_METRICS: &str = "e-core tma metrics";
pub const FILE_UNCORE_CSV: &str = "uncore csv";
pub const FILE_EXTRA_METRICS: &str = "extra metrics";

/// Event file kinds, in processing order
pub const EVENT_FILE_TYPES: &[&str] = &["atom", "core", "uncore", "uncore experimental"];

/// Expected mapfile.csv header
pub const MAPFILE_COLUMNS: &[&str] = &[
    "Family-model",
    "Version",
    "Filename",
    "EventType",
    "Core Type",
    "Native Model ID",
    "Core Role Name",
];

/// Default PMU name; metrics for any other PMU carry a Unit tag
pub const DEFAULT_PMU: &str = "cpu";
