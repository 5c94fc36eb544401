//! Ordered textual patches for irregular event spellings.

use crate::utils::error::RulesError;
use serde::Deserialize;

/// Characters that separate perf PMU terms
const SEPARATORS: [char; 3] = ['-', '=', ','];

/// One `from` → `to` substring patch
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FixupRule {
    pub from: String,
    pub to: String,
}

impl FixupRule {
    /// Verify every separator in the replacement is backslash-escaped
    pub fn check_escaped(&self) -> Result<(), RulesError> {
        let mut prev = None;
        for (offset, ch) in self.to.char_indices() {
            if SEPARATORS.contains(&ch) && offset > 0 && prev != Some('\\') {
                return Err(RulesError::UnescapedSeparator {
                    pattern: self.from.clone(),
                    separator: ch,
                    offset,
                });
            }
            prev = Some(ch);
        }
        Ok(())
    }
}

/// The ordered patch list for one architecture
#[derive(Debug, Clone, Default)]
pub struct Fixups {
    rules: Vec<FixupRule>,
}

impl Fixups {
    pub fn new(rules: Vec<FixupRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[FixupRule] {
        &self.rules
    }

    /// Apply every patch in order
    pub fn apply(&self, text: &str) -> String {
        let mut out = text.to_string();
        for rule in &self.rules {
            if out.contains(rule.from.as_str()) {
                out = out.replace(rule.from.as_str(), &rule.to);
            }
        }
        out
    }
}
