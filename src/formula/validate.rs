//! Referential check of rendered formulas.

use crate::rules::Rules;
use regex::Regex;
use std::sync::OnceLock;

fn token_re() -> &'static Regex {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    // Safety: this regex literal is guaranteed to compile
    TOKEN_RE.get_or_init(|| Regex::new(r"(?:[A-Za-z_0-9.]|\\-)+").unwrap())
}

fn numeric_re() -> &'static Regex {
    static NUMERIC_RE: OnceLock<Regex> = OnceLock::new();
    // Safety: this regex literal is guaranteed to compile
    NUMERIC_RE.get_or_init(|| {
        Regex::new(r"^(?:[0-9]+$|[0-9]*\.[0-9]+|0x[a-fA-F0-9]+|[0-9]+e[0-9]+)").unwrap()
    })
}

/// Tokens of a rendered formula that are neither numbers, keywords nor known
///
/// # Arguments
/// * `formula` - fully resolved formula text
/// * `rules` - source of the reserved keyword allowlist
/// * `known` - true for registered events and accepted metric names
///
/// # Returns
/// Offending tokens in order of appearance, without repeats
pub fn unresolved_tokens<'f>(
    formula: &'f str,
    rules: &Rules,
    known: impl Fn(&str) -> bool,
) -> Vec<&'f str> {
    let mut unresolved: Vec<&str> = Vec::new();

    for token in token_re().find_iter(formula).map(|m| m.as_str()) {
        if numeric_re().is_match(token) || rules.is_keyword(token) || known(token) {
            continue;
        }
        if !unresolved.contains(&token) {
            unresolved.push(token);
        }
    }

    unresolved
}
