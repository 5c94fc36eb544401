//! Perfmon Metrics
//!
//! Converts perfmon event descriptor files and Top-down Microarchitecture
//! Analysis (TMA) formula tables into the JSON event and metric files
//! consumed by Linux perf.
//!
//! This crate provides the core implementation for the
//! `create-perf-json` CLI tool.
//!
//! ## Pipeline
//!
//! 1. [`arch::parse_mapfile`] lists the CPU models and their source files
//! 2. [`events::ArchEvents`] reads event files into a catalog and per-topic output
//! 3. [`metrics::extract_metrics`] turns one TMA table into validated metrics
//! 4. [`output`] writes the perf JSON files and mapfile

pub mod arch;
pub mod commands;
pub mod diagnostics;
pub mod events;
pub mod fetch;
pub mod formula;
pub mod metrics;
pub mod output;
pub mod rules;
pub mod table;
pub mod utils;
