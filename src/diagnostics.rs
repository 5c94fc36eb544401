//! Non-fatal findings reported while extracting metrics.
//!
//! Extraction never aborts on a single bad metric. Each problem becomes a
//! [`Diagnostic`] that the caller forwards to the log.

use log::{info, warn};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
}

/// Why a metric (or a whole table) was not emitted as written
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractIssue {
    #[error("No formula for '{metric}' on {arch}")]
    MissingFormula { metric: String, arch: String },

    #[error("Dropping '{metric}': '{symbol}' is not an event, keyword or metric")]
    UnresolvedSymbol { metric: String, symbol: String },

    #[error("Dropping '{metric}': {reason}")]
    InvalidFormula { metric: String, reason: String },

    #[error("Duplicate metric '{metric}' with a different formula\n\tnew: {new}\n\texisting: {existing}")]
    DuplicateMetric {
        metric: String,
        existing: String,
        new: String,
    },

    #[error("Table for {arch} is missing column '{column}'")]
    MalformedTable { arch: String, column: String },

    #[error("Skipping '{metric}': {reason}")]
    Skipped { metric: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub issue: ExtractIssue,
}

impl Diagnostic {
    pub fn info(issue: ExtractIssue) -> Self {
        Self {
            severity: Severity::Info,
            issue,
        }
    }

    pub fn warning(issue: ExtractIssue) -> Self {
        Self {
            severity: Severity::Warning,
            issue,
        }
    }

    /// Forward to the log at the matching level
    pub fn log(&self) {
        match self.severity {
            Severity::Info => info!("{}", self.issue),
            Severity::Warning => warn!("{}", self.issue),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
        };
        write!(f, "{}: {}", level, self.issue)
    }
}
