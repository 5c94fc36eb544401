//! Metric records as read from tables and written for perf.
//!
//! Field order on [`Metric`] is alphabetical so the serialized JSON has
//! sorted keys.

use serde::{Deserialize, Serialize};

/// One perf metric definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    #[serde(rename = "BriefDescription")]
    pub brief_description: String,

    #[serde(rename = "MetricConstraint", default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,

    /// Fully resolved formula
    #[serde(rename = "MetricExpr")]
    pub expr: String,

    /// `;`-joined, sorted group names
    #[serde(rename = "MetricGroup", default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(rename = "MetricName")]
    pub name: String,

    #[serde(rename = "PublicDescription", default, skip_serializing_if = "Option::is_none")]
    pub public_description: Option<String>,

    #[serde(rename = "ScaleUnit", default, skip_serializing_if = "Option::is_none")]
    pub scale_unit: Option<String>,

    /// PMU the formula's events belong to, when not the core PMU
    #[serde(rename = "Unit", default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// A metric row taken from a formula table, before resolution
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSpec {
    /// Output name (`tma_*` for topdown nodes)
    pub name: String,

    /// Name as written in the table
    pub table_name: String,

    /// Selected formula cell, if any
    pub formula: Option<String>,

    pub description: String,

    pub groups: Option<String>,

    /// Sampling hint for this architecture
    pub locate: Option<String>,

    pub scale_unit: Option<String>,
}

/// Entry of a per-architecture extra metrics file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExtraMetric {
    #[serde(rename = "MetricName")]
    pub name: String,

    #[serde(rename = "MetricGroup", default)]
    pub group: Option<String>,

    #[serde(rename = "MetricExpr")]
    pub expr: String,

    #[serde(rename = "BriefDescription", default)]
    pub brief_description: String,

    #[serde(rename = "ScaleUnit", default)]
    pub scale_unit: Option<String>,
}
