use crate::output::read_metrics;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::Path;

/// Counts reported for a metrics file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsReport {
    pub metrics: usize,
    pub groups: usize,
    pub with_unit: usize,
    pub topdown: usize,
}

/// Read a metrics file and count what it holds
pub fn validate_metrics_file(file_path: &Path) -> Result<MetricsReport> {
    let metrics = read_metrics(file_path)
        .with_context(|| format!("Failed to read {}", file_path.display()))?;

    let groups: BTreeSet<&str> = metrics
        .iter()
        .filter_map(|m| m.group.as_deref())
        .flat_map(|g| g.split(';'))
        .collect();

    Ok(MetricsReport {
        metrics: metrics.len(),
        groups: groups.len(),
        with_unit: metrics.iter().filter(|m| m.unit.is_some()).count(),
        topdown: metrics.iter().filter(|m| m.name.starts_with("tma_")).count(),
    })
}
