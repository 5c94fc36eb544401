use crate::utils::config::DEFAULT_OUTDIR;
use std::path::PathBuf;

/// Arguments for the generate command
///
/// **Public** - used by main.rs to construct from CLI args
#[derive(Debug, Clone)]
pub struct GenerateArgs {
    /// Directory the perf files are written to
    pub outdir: PathBuf,

    /// URL or path of the event repository root
    pub basepath: String,

    /// Only these architecture shortnames (all when empty)
    pub archs: Vec<String>,

    /// Rules TOML replacing the built-in one
    pub rules_path: Option<PathBuf>,
}

impl Default for GenerateArgs {
    fn default() -> Self {
        Self {
            outdir: PathBuf::from(DEFAULT_OUTDIR),
            basepath: String::from("file://.."),
            archs: Vec::new(),
            rules_path: None,
        }
    }
}

impl GenerateArgs {
    /// Is `shortname` selected by the architecture filter?
    pub fn wants(&self, shortname: &str) -> bool {
        self.archs.is_empty() || self.archs.iter().any(|a| a.eq_ignore_ascii_case(shortname))
    }
}

/// What a generate run produced
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateSummary {
    pub models: usize,
    pub failed: Vec<String>,
    pub event_files: usize,
    pub metrics: usize,
}
