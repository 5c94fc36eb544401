//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use thiserror::Error;

/// Errors that can occur while retrieving a source file
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    BadStatus { url: String, status: u16 },

    #[error("Failed to read {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Source is not valid UTF-8: {0}")]
    InvalidEncoding(String),
}

/// Errors that can occur while loading the declarative rule set
#[derive(Error, Debug)]
pub enum RulesError {
    #[error("Failed to read rules file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid rules TOML: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Fixup replacement for '{pattern}' has an unescaped '{separator}' at byte {offset}")]
    UnescapedSeparator {
        pattern: String,
        separator: char,
        offset: usize,
    },
}

/// Errors that can occur while reading a formula table
#[derive(Error, Debug)]
pub enum TableError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Table header is missing column '{column}'")]
    MalformedTable { column: String },

    #[error("Table has no header row starting with 'Key'")]
    MissingHeader,
}

/// Errors that can occur while lexing or parsing a formula
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("Unexpected character '{ch}' at byte {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("Unexpected token '{token}' at byte {offset}")]
    UnexpectedToken { token: String, offset: usize },

    #[error("Unexpected end of formula")]
    UnexpectedEnd,

    #[error("Unterminated PMU term group starting at byte {offset}")]
    UnterminatedTerms { offset: usize },
}

/// Errors that can occur while resolving a formula
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("Formula does not parse: {0}")]
    Parse(#[from] FormulaError),

    #[error("Unknown auxiliary symbol '#{0}'")]
    UnknownAux(String),

    #[error("Node '{0}' has no children to expand")]
    NoChildren(String),

    #[error("Formula did not settle after {0} substitution passes")]
    PassLimit(usize),

    #[error("Unresolved symbol '{symbol}'")]
    UnresolvedSymbol { symbol: String },
}

/// Errors that can occur while reading event descriptor files
#[derive(Error, Debug)]
pub enum EventError {
    #[error("JSON deserialization failed: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Uncore CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Errors that can occur while reading mapfile.csv
#[derive(Error, Debug)]
pub enum MapfileError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unexpected mapfile header column {index}: expected '{expected}', found '{found}'")]
    BadHeader {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("Inconsistent {field} for {shortname}: '{existing}' != '{found}'")]
    Inconsistent {
        shortname: String,
        field: &'static str,
        existing: String,
        found: String,
    },

    #[error("Mapfile is empty")]
    Empty,
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}
