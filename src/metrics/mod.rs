//! Metric records and the extraction pipeline that produces them.

pub mod emitter;
pub mod extract;
pub mod schema;

pub use emitter::{normalize_groups, split_description, Emitter, MetricDraft};
pub use extract::{extract_metrics, ExtractContext, Extraction};
pub use schema::{ExtraMetric, Metric, MetricSpec};
