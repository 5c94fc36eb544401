//! Declarative rule set.
//!
//! Architecture-specific data (fixups, column fallbacks, keyword allowlist,
//! cstates, overrides) is loaded from TOML. The built-in copy lives in
//! `config/rules.toml`; a different file can be supplied at run time.

pub mod fixups;

use crate::utils::config::DEFAULT_RULES;
use crate::utils::error::RulesError;
use log::debug;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

pub use fixups::{FixupRule, Fixups};

/// The complete rule set
#[derive(Debug, Clone, Deserialize)]
pub struct Rules {
    /// Tokens allowed to remain in a resolved formula
    pub keywords: Vec<String>,

    /// Token prefixes that name perf built-in events
    #[serde(default)]
    pub keyword_prefixes: Vec<String>,

    /// Metrics never emitted, inlined where referenced
    #[serde(default)]
    pub ignored_metrics: HashSet<String>,

    /// Metrics tagged with the NO_NMI_WATCHDOG constraint
    #[serde(default)]
    pub no_nmi_watchdog: HashSet<String>,

    /// Key prefixes of topdown node rows
    pub topdown_prefixes: Vec<String>,

    pub slots: SlotsRule,

    /// Fallback group per metric name
    #[serde(default)]
    pub metric_groups: HashMap<String, String>,

    pub context: ContextRules,

    #[serde(default)]
    pub common_fixups: Vec<FixupRule>,

    #[serde(default)]
    pub fixup_sets: HashMap<String, Vec<FixupRule>>,

    pub tma_columns: Vec<TmaColumn>,

    #[serde(default)]
    pub arch: BTreeMap<String, ArchRules>,

    #[serde(default)]
    pub cstates: Vec<CstateRule>,
}

/// Companion-event rule for the topdown event family
#[derive(Debug, Clone, Deserialize)]
pub struct SlotsRule {
    pub family: String,
    pub token: String,
    pub term: String,
}

/// Handling of `#NAME` runtime constants
#[derive(Debug, Clone, Deserialize)]
pub struct ContextRules {
    /// Constants passed through unchanged (with their `#`)
    pub keep: Vec<String>,

    /// Constants replaced by fixed text
    #[serde(default)]
    pub replace: HashMap<String, String>,
}

/// A TMA table formula column and its fallbacks
#[derive(Debug, Clone, Deserialize)]
pub struct TmaColumn {
    pub column: String,

    /// Columns consulted in order when the own cell is empty
    #[serde(default)]
    pub fallbacks: Vec<String>,

    /// Column used instead when the table lacks `column`
    #[serde(default)]
    pub alternate: Option<String>,
}

impl TmaColumn {
    /// Own column followed by its fallbacks
    pub fn search_order(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.column.as_str()).chain(self.fallbacks.iter().map(String::as_str))
    }
}

/// Per-architecture rules
#[derive(Debug, Clone, Deserialize)]
pub struct ArchRules {
    /// Explicit TMA column, bypassing the name match
    #[serde(default)]
    pub tma_column: Option<String>,

    #[serde(default)]
    pub fixups: Vec<FixupRule>,

    /// Names of shared lists from `fixup_sets`, appended after `fixups`
    #[serde(default)]
    pub fixup_sets: Vec<String>,

    /// Cells mentioning any of these events are treated as empty
    #[serde(default)]
    pub banned_events: Vec<String>,

    #[serde(default)]
    pub dropped_metrics: HashSet<String>,

    #[serde(default)]
    pub forced_formulas: HashMap<String, String>,

    /// Value of `#Memory`
    #[serde(default = "default_memory")]
    pub memory: bool,
}

fn default_memory() -> bool {
    true
}

impl Default for ArchRules {
    fn default() -> Self {
        Self {
            tma_column: None,
            fixups: Vec::new(),
            fixup_sets: Vec::new(),
            banned_events: Vec::new(),
            dropped_metrics: HashSet::new(),
            forced_formulas: HashMap::new(),
            memory: default_memory(),
        }
    }
}

/// C-state residency counters for a group of architectures
#[derive(Debug, Clone, Deserialize)]
pub struct CstateRule {
    pub archs: Vec<String>,
    pub core: Vec<u32>,
    pub pkg: Vec<u32>,
}

impl Rules {
    /// Load the built-in rule set
    pub fn builtin() -> Result<Self, RulesError> {
        Self::from_toml(DEFAULT_RULES)
    }

    /// Load a rule set from a TOML file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RulesError> {
        let path = path.as_ref();
        debug!("Loading rules from: {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Parse and check a rule set
    ///
    /// # Errors
    /// * `RulesError::Toml` - document does not match the schema
    /// * `RulesError::UnescapedSeparator` - an architecture fixup would
    ///   introduce a bare `-`, `=` or `,`
    pub fn from_toml(text: &str) -> Result<Self, RulesError> {
        let rules: Rules = toml::from_str(text)?;

        for rule in rules
            .fixup_sets
            .values()
            .flatten()
            .chain(rules.arch.values().flat_map(|a| a.fixups.iter()))
        {
            rule.check_escaped()?;
        }

        Ok(rules)
    }

    /// Rules for one architecture (defaults when none are declared)
    pub fn arch(&self, shortname: &str) -> ArchRules {
        self.arch.get(shortname).cloned().unwrap_or_default()
    }

    /// Fixups applied to a formula fragment on `shortname`
    ///
    /// Architecture patches come first, in declared order, then the
    /// common patches.
    pub fn fixups_for(&self, shortname: &str) -> Fixups {
        let mut ordered = Vec::new();

        if let Some(arch) = self.arch.get(shortname) {
            ordered.extend(arch.fixups.iter().cloned());
            for set in &arch.fixup_sets {
                match self.fixup_sets.get(set) {
                    Some(rules) => ordered.extend(rules.iter().cloned()),
                    None => log::warn!("Unknown fixup set '{}' for {}", set, shortname),
                }
            }
        }

        ordered.extend(self.common_fixups.iter().cloned());
        Fixups::new(ordered)
    }

    /// TMA column family for an architecture shortname
    ///
    /// An explicit `tma_column` wins; otherwise the first declared column
    /// whose name contains the shortname.
    pub fn tma_column_for(&self, shortname: &str) -> Option<&TmaColumn> {
        let wanted = self.arch.get(shortname).and_then(|a| a.tma_column.as_deref());

        match wanted {
            Some(column) => self.tma_columns.iter().find(|c| c.column == column),
            None => self
                .tma_columns
                .iter()
                .find(|c| c.column.contains(shortname)),
        }
    }

    /// Is `token` allowed to remain in a resolved formula?
    pub fn is_keyword(&self, token: &str) -> bool {
        self.keywords.iter().any(|k| k == token)
            || self.keyword_prefixes.iter().any(|p| token.starts_with(p.as_str()))
    }

    /// C-state residency counters for an architecture
    pub fn cstates_for(&self, shortname: &str) -> Option<&CstateRule> {
        self.cstates
            .iter()
            .find(|c| c.archs.iter().any(|a| a == shortname))
    }
}
