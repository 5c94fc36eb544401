//! C-state residency metrics.

use crate::metrics::Metric;
use crate::rules::Rules;

fn residency(scope: &str, label: &str, state: u32) -> Metric {
    Metric {
        brief_description: format!("C{} residency percent per {}", state, label),
        constraint: None,
        expr: format!("cstate_{}@c{}\\-residency@ / TSC", scope, state),
        group: Some("Power".to_string()),
        name: format!("C{}_{}_Residency", state, capitalize(scope)),
        public_description: None,
        scale_unit: Some("100%".to_string()),
        unit: None,
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Core then package residency metrics for an architecture
///
/// **Public** - appended after the TMA metrics of a model
///
/// # Returns
/// An empty list for architectures without declared C-states
pub fn cstate_metrics(rules: &Rules, shortname: &str) -> Vec<Metric> {
    let Some(rule) = rules.cstates_for(shortname) else {
        return Vec::new();
    };

    rule.core
        .iter()
        .map(|&state| residency("core", "core", state))
        .chain(rule.pkg.iter().map(|&state| residency("pkg", "package", state)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_skylake_cstates() {
        let rules = Rules::builtin().unwrap();
        let metrics = cstate_metrics(&rules, "SKL");
        let names: Vec<&str> = metrics.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "C3_Core_Residency",
                "C6_Core_Residency",
                "C7_Core_Residency",
                "C2_Pkg_Residency",
                "C3_Pkg_Residency",
                "C6_Pkg_Residency",
                "C7_Pkg_Residency",
            ]
        );
        assert_eq!(metrics[0].expr, "cstate_core@c3\\-residency@ / TSC");
        assert_eq!(metrics[3].brief_description, "C2 residency percent per package");
        assert_eq!(metrics[3].scale_unit.as_deref(), Some("100%"));
        assert_eq!(metrics[3].group.as_deref(), Some("Power"));
    }

    #[test]
    fn test_unknown_arch_has_none() {
        let rules = Rules::builtin().unwrap();
        assert!(cstate_metrics(&rules, "EHL").is_empty());
    }
}
