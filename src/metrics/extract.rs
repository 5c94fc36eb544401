//! Per-architecture metric extraction.
//!
//! Table → symbol table → resolved candidates → referential check →
//! emitted records. Every problem on the way is recorded as a diagnostic
//! and only the affected metric is dropped.

use super::emitter::{Emitter, MetricDraft};
use super::schema::{ExtraMetric, Metric, MetricSpec};
use crate::diagnostics::{Diagnostic, ExtractIssue};
use crate::events::EventCatalog;
use crate::formula::{unresolved_tokens, with_companion_slots, Resolver};
use crate::rules::Rules;
use crate::table::{build_table, BuiltTable};
use crate::utils::error::{ResolveError, TableError};
use log::{debug, info};
use std::collections::HashMap;

const UNCORE_FREQ_SOURCE: &str = "Socket_CLKS";
const UNCORE_FREQ_FORMULA: &str = "Socket_CLKS / #num_dies / duration_time / 1000000000";

/// Output of one table extraction
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub metrics: Vec<Metric>,
    pub diagnostics: Vec<Diagnostic>,
}

/// What an extraction runs against
pub struct ExtractContext<'a> {
    pub rules: &'a Rules,
    pub catalog: &'a EventCatalog,
    pub shortname: &'a str,
    /// PMU the table's events are counted on
    pub pmu: &'a str,
}

/// Extract the metrics of one TMA table for one architecture
///
/// **Public** - main entry point of the metric pipeline
///
/// # Arguments
/// * `table_text` - raw CSV text of the TMA table
/// * `extra` - per-architecture extra metrics, checked like table metrics
/// * `ctx` - rules, events and architecture
///
/// # Returns
/// Accepted records in row order and the diagnostics raised on the way.
/// A table that cannot be read yields no records and one diagnostic.
pub fn extract_metrics(
    table_text: &str,
    extra: &[ExtraMetric],
    ctx: &ExtractContext<'_>,
) -> Extraction {
    let mut extraction = Extraction::default();

    let Some(tma) = ctx.rules.tma_column_for(ctx.shortname) else {
        info!("No TMA column for {}", ctx.shortname);
        return extraction;
    };

    let built = match build_table(table_text, ctx.shortname, tma, ctx.rules) {
        Ok(built) => built,
        Err(TableError::MalformedTable { column }) => {
            extraction
                .diagnostics
                .push(Diagnostic::warning(ExtractIssue::MalformedTable {
                    arch: ctx.shortname.to_string(),
                    column,
                }));
            return extraction;
        }
        Err(err) => {
            extraction
                .diagnostics
                .push(Diagnostic::warning(ExtractIssue::MalformedTable {
                    arch: ctx.shortname.to_string(),
                    column: err.to_string(),
                }));
            return extraction;
        }
    };
    debug!(
        "{}: {} table metrics from column {}",
        ctx.shortname,
        built.metrics.len(),
        built.column
    );

    let BuiltTable {
        symbols,
        metrics: specs,
        diagnostics,
        ..
    } = built;
    extraction.diagnostics.extend(diagnostics);

    let resolver = Resolver::new(&symbols, ctx.rules, ctx.shortname, ctx.pmu);
    let arch = ctx.rules.arch(ctx.shortname);
    let mut candidates: Vec<MetricDraft> = Vec::new();

    for spec in &specs {
        if ctx.rules.ignored_metrics.contains(&spec.name) {
            extraction.diagnostics.push(Diagnostic::info(ExtractIssue::Skipped {
                metric: spec.name.clone(),
                reason: "ignored metric".to_string(),
            }));
            continue;
        }
        if arch.dropped_metrics.contains(&spec.name) {
            extraction.diagnostics.push(Diagnostic::info(ExtractIssue::Skipped {
                metric: spec.name.clone(),
                reason: format!("not supported on {}", ctx.shortname),
            }));
            continue;
        }

        let formula = arch
            .forced_formulas
            .get(&spec.name)
            .cloned()
            .or_else(|| spec.formula.clone())
            .filter(|f| f != "#NA" && f != "N/A");
        let Some(formula) = formula else {
            extraction.diagnostics.push(Diagnostic::info(ExtractIssue::MissingFormula {
                metric: spec.name.clone(),
                arch: ctx.shortname.to_string(),
            }));
            continue;
        };

        match resolve_with_slots(&resolver, ctx.rules, &formula) {
            Ok(expr) => candidates.push(draft_from_spec(spec, expr)),
            Err(err) => extraction.diagnostics.push(resolve_diagnostic(&spec.name, err)),
        }
    }

    if symbols.info.contains_key(UNCORE_FREQ_SOURCE) {
        match resolver.resolve(UNCORE_FREQ_FORMULA) {
            Ok(expr) => candidates.push(MetricDraft {
                name: "UNCORE_FREQ".to_string(),
                expr: expr.to_string(),
                groups: Some("SoC".to_string()),
                description: "Uncore frequency per die [GHZ]".to_string(),
                locate: None,
                scale_unit: None,
                pmu_scoped: false,
            }),
            Err(err) => extraction.diagnostics.push(resolve_diagnostic("UNCORE_FREQ", err)),
        }
    }

    candidates.extend(extra.iter().map(|m| MetricDraft {
        name: m.name.clone(),
        expr: m.expr.clone(),
        groups: m.group.clone(),
        description: m.brief_description.clone(),
        locate: None,
        scale_unit: m.scale_unit.clone(),
        pmu_scoped: true,
    }));

    let accepted = check_references(candidates, ctx, &mut extraction.diagnostics);

    let mut emitter = Emitter::new(ctx.rules, ctx.pmu);
    for draft in accepted {
        emitter.emit(draft);
    }
    let (metrics, duplicates) = emitter.finish();
    extraction.metrics = metrics;
    extraction.diagnostics.extend(duplicates);

    extraction
}

fn resolve_with_slots(
    resolver: &Resolver<'_>,
    rules: &Rules,
    formula: &str,
) -> Result<String, ResolveError> {
    let expr = resolver.resolve(formula)?;
    Ok(with_companion_slots(expr, rules)?.to_string())
}

fn draft_from_spec(spec: &MetricSpec, expr: String) -> MetricDraft {
    MetricDraft {
        name: spec.name.clone(),
        expr,
        groups: spec.groups.clone(),
        description: spec.description.clone(),
        locate: spec.locate.clone(),
        scale_unit: spec.scale_unit.clone(),
        pmu_scoped: true,
    }
}

fn resolve_diagnostic(metric: &str, err: ResolveError) -> Diagnostic {
    match err {
        ResolveError::UnresolvedSymbol { symbol } => {
            Diagnostic::warning(ExtractIssue::UnresolvedSymbol {
                metric: metric.to_string(),
                symbol,
            })
        }
        other => Diagnostic::warning(ExtractIssue::InvalidFormula {
            metric: metric.to_string(),
            reason: other.to_string(),
        }),
    }
}

/// Drop candidates whose formulas name something unknown
///
/// A candidate may refer to another candidate by name. Dropping one can
/// orphan others, so the check repeats until the accepted set is stable.
fn check_references(
    candidates: Vec<MetricDraft>,
    ctx: &ExtractContext<'_>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<MetricDraft> {
    let mut alive: HashMap<String, usize> = HashMap::new();
    for draft in &candidates {
        *alive.entry(draft.name.clone()).or_default() += 1;
    }

    let mut accepted = vec![true; candidates.len()];
    loop {
        let mut changed = false;

        for (i, draft) in candidates.iter().enumerate() {
            if !accepted[i] {
                continue;
            }
            let known = |token: &str| {
                ctx.catalog.contains(token) || alive.get(token).map_or(false, |n| *n > 0)
            };
            let unresolved = unresolved_tokens(&draft.expr, ctx.rules, known);
            let Some(symbol) = unresolved.first() else {
                continue;
            };

            diagnostics.push(Diagnostic::warning(ExtractIssue::UnresolvedSymbol {
                metric: draft.name.clone(),
                symbol: symbol.to_string(),
            }));
            accepted[i] = false;
            if let Some(count) = alive.get_mut(&draft.name) {
                *count -= 1;
            }
            changed = true;
        }

        if !changed {
            break;
        }
    }

    candidates
        .into_iter()
        .zip(accepted)
        .filter_map(|(draft, keep)| keep.then_some(draft))
        .collect()
}
