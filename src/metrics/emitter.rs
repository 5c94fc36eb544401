//! Metric Emitter: turns accepted formulas into perf metric records.

use super::schema::Metric;
use crate::diagnostics::{Diagnostic, ExtractIssue};
use crate::rules::Rules;
use crate::utils::config::DEFAULT_PMU;
use log::debug;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

const NO_NMI_WATCHDOG: &str = "NO_NMI_WATCHDOG";

/// Everything known about a metric before it becomes a record
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDraft {
    pub name: String,
    pub expr: String,
    pub groups: Option<String>,
    pub description: String,
    pub locate: Option<String>,
    pub scale_unit: Option<String>,
    /// Tag the record with the table's PMU when it is not the core PMU
    pub pmu_scoped: bool,
}

fn tma_level_re() -> &'static Regex {
    static TMA_LEVEL_RE: OnceLock<Regex> = OnceLock::new();
    // Safety: this regex literal is guaranteed to compile
    TMA_LEVEL_RE.get_or_init(|| Regex::new(r"Tma(L[12])").unwrap())
}

/// Canonical group list: renamed, trimmed, deduplicated and sorted
pub fn normalize_groups(groups: &str) -> Option<String> {
    let renamed = tma_level_re().replace_all(groups, "tma_${1}_group");
    let unique: BTreeSet<&str> = renamed
        .split(';')
        .map(str::trim)
        .filter(|g| !g.is_empty())
        .collect();

    if unique.is_empty() {
        None
    } else {
        Some(unique.into_iter().collect::<Vec<_>>().join(";"))
    }
}

/// Split a description into brief and public parts
///
/// Text with more than one `.` is cut at the first `. ` that does not
/// follow `i.e`. The public part is the full text when it differs.
pub fn split_description(description: &str) -> (String, Option<String>) {
    if description.matches('.').count() <= 1 {
        return (description.to_string(), None);
    }

    let cut = description
        .match_indices(". ")
        .map(|(i, _)| i)
        .find(|&i| !description[..i].ends_with("i.e"));

    match cut {
        Some(i) => (description[..i].to_string(), Some(description.to_string())),
        None => (description.to_string(), None),
    }
}

/// Collects records for one table, keeping the first of each name
pub struct Emitter<'a> {
    rules: &'a Rules,
    pmu: String,
    metrics: Vec<Metric>,
    index: HashMap<String, usize>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Emitter<'a> {
    pub fn new(rules: &'a Rules, pmu: &str) -> Self {
        Self {
            rules,
            pmu: pmu.to_string(),
            metrics: Vec::new(),
            index: HashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Build the record for a draft without adding it
    pub fn build(&self, draft: MetricDraft) -> Metric {
        let mut description = draft.description;
        if let Some(locate) = &draft.locate {
            description.push_str(" Sample with: ");
            description.push_str(locate);
        }
        let (brief_description, public_description) = split_description(&description);

        let constraint = self
            .rules
            .no_nmi_watchdog
            .contains(&draft.name)
            .then(|| NO_NMI_WATCHDOG.to_string());
        let unit = (draft.pmu_scoped && self.pmu != DEFAULT_PMU).then(|| self.pmu.clone());

        Metric {
            brief_description,
            constraint,
            expr: draft.expr,
            group: draft.groups.as_deref().and_then(normalize_groups),
            name: draft.name,
            public_description,
            scale_unit: draft.scale_unit,
            unit,
        }
    }

    /// Build and add a draft
    pub fn emit(&mut self, draft: MetricDraft) -> bool {
        let metric = self.build(draft);
        self.push(metric)
    }

    /// Add a record unless its name is taken
    ///
    /// A repeat with the same formula is dropped quietly; a repeat with a
    /// different formula is dropped with a warning.
    pub fn push(&mut self, metric: Metric) -> bool {
        if let Some(&i) = self.index.get(&metric.name) {
            let existing = &self.metrics[i];
            if existing.expr == metric.expr {
                debug!("Dropping duplicate metric {}", metric.name);
            } else {
                self.diagnostics
                    .push(Diagnostic::warning(ExtractIssue::DuplicateMetric {
                        metric: metric.name.clone(),
                        existing: existing.expr.clone(),
                        new: metric.expr,
                    }));
            }
            return false;
        }

        self.index.insert(metric.name.clone(), self.metrics.len());
        self.metrics.push(metric);
        true
    }

    /// Records in emission order, plus the duplicate diagnostics
    pub fn finish(self) -> (Vec<Metric>, Vec<Diagnostic>) {
        (self.metrics, self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn draft(name: &str, expr: &str) -> MetricDraft {
        MetricDraft {
            name: name.to_string(),
            expr: expr.to_string(),
            groups: None,
            description: "Test metric.".to_string(),
            locate: None,
            scale_unit: None,
            pmu_scoped: true,
        }
    }

    #[test]
    fn test_normalize_groups() {
        assert_eq!(
            normalize_groups("TopdownL1;TmaL1; PGO;TmaL1").as_deref(),
            Some("PGO;TopdownL1;tma_L1_group")
        );
        assert_eq!(normalize_groups(" ; "), None);
    }

    #[test]
    fn test_split_description() {
        let (brief, public) =
            split_description("Fraction of slots stalled. Higher is worse. See docs.");
        assert_eq!(brief, "Fraction of slots stalled");
        assert_eq!(
            public.as_deref(),
            Some("Fraction of slots stalled. Higher is worse. See docs.")
        );

        let (brief, public) = split_description("Cycles i.e. clocks. More text.");
        assert_eq!(brief, "Cycles i.e. clocks");
        assert!(public.is_some());

        let (brief, public) = split_description("Instructions per cycle.");
        assert_eq!(brief, "Instructions per cycle.");
        assert_eq!(public, None);
    }

    #[test]
    fn test_locate_hint_appended() {
        let rules = Rules::builtin().unwrap();
        let emitter = Emitter::new(&rules, "cpu");
        let mut d = draft("tma_icache_misses", "ICACHE.IFDATA_STALL / CLKS");
        d.description = "Icache misses".to_string();
        d.locate = Some("FRONTEND_RETIRED.L2_MISS:pp".to_string());
        let metric = emitter.build(d);
        assert_eq!(
            metric.brief_description,
            "Icache misses Sample with: FRONTEND_RETIRED.L2_MISS:pp"
        );
    }

    #[test]
    fn test_constraint_and_unit() {
        let rules = Rules::builtin().unwrap();
        let emitter = Emitter::new(&rules, "cpu_core");
        let metric = emitter.build(draft("Page_Walks_Utilization", "x"));
        assert_eq!(metric.constraint.as_deref(), Some("NO_NMI_WATCHDOG"));
        assert_eq!(metric.unit.as_deref(), Some("cpu_core"));

        let mut unscoped = draft("UNCORE_FREQ", "x");
        unscoped.pmu_scoped = false;
        assert_eq!(emitter.build(unscoped).unit, None);

        let core = Emitter::new(&rules, "cpu");
        assert_eq!(core.build(draft("IPC", "x")).unit, None);
    }

    #[test]
    fn test_duplicates() {
        let rules = Rules::builtin().unwrap();
        let mut emitter = Emitter::new(&rules, "cpu");
        assert!(emitter.emit(draft("IPC", "INST_RETIRED.ANY / CLKS")));
        assert!(!emitter.emit(draft("IPC", "INST_RETIRED.ANY / CLKS")));
        assert!(!emitter.emit(draft("IPC", "INST_RETIRED.ANY / CYCLES")));

        let (metrics, diagnostics) = emitter.finish();
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].expr, "INST_RETIRED.ANY / CLKS");
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(
            diagnostics[0].issue,
            ExtractIssue::DuplicateMetric { .. }
        ));
    }
}
