use perfmon_metrics::diagnostics::ExtractIssue;
use perfmon_metrics::events::{ArchEvents, EventCatalog};
use perfmon_metrics::formula::unresolved_tokens;
use perfmon_metrics::metrics::{extract_metrics, ExtractContext, Extraction, Metric};
use perfmon_metrics::rules::Rules;
use pretty_assertions::assert_eq;

const EVENTS: &str = r#"[
    {"EventName": "INST_RETIRED.ANY", "EventCode": "0xc0"},
    {"EventName": "CPU_CLK_UNHALTED.THREAD", "EventCode": "0x3c"},
    {"EventName": "IDQ_UOPS_NOT_DELIVERED.CORE", "EventCode": "0x9c", "UMask": "0x1"},
    {"EventName": "IDQ_UOPS_NOT_DELIVERED.CYCLES_0_UOPS_DELIV.CORE", "EventCode": "0x9c", "UMask": "0x1", "CounterMask": "4"}
]"#;

const TABLE: &str = "\
Key,Level1,Level2,Metric Description,Metric Group,SKL/KBL,BDW,HSW
FE,Frontend_Bound,,Frontend stalls,TmaL1,IDQ_UOPS_NOT_DELIVERED.CORE / SLOTS,,
FE,,Fetch_Latency,Fetch latency,Frontend,4 * IDQ_UOPS_NOT_DELIVERED.CYCLES_0_UOPS_DELIV.CORE / SLOTS,,
FE,,Fetch_Bandwidth,Fetch bandwidth,,#Frontend_Bound - #Fetch_Latency,,
Info.Thread,Frontend_Max,,Frontend bound or its children,,##?Frontend_Bound,,
Info.Thread,Frontend_Sum,,Frontend children,,##Frontend_Bound,,
Info.Thread,Fallback_IPC,,Instructions per cycle,,,INST_RETIRED.ANY / CLKS,CPU_CLK_UNHALTED.THREAD / CLKS
Info.Thread,No_Formula,,Nowhere,,,,
Info.Thread,Picked,,Conditional,,INST_RETIRED.ANY if 1 else CPU_CLK_UNHALTED.THREAD,,
Info.Thread,Not_Picked,,Conditional,,INST_RETIRED.ANY if 0 else CPU_CLK_UNHALTED.THREAD,,
Info.Thread,Linear,,Folded,,(2 * INST_RETIRED.ANY) - (1 * INST_RETIRED.ANY),,
Info.Thread,Retiring_Share,,Topdown share,,topdown\\-retiring / (topdown\\-fe\\-bound + topdown\\-retiring),,
Info.Thread,Retiring_Per_Slot,,Topdown per slot,,topdown\\-retiring / SLOTS,,
Info.Thread,Same_Twice,,First copy,,INST_RETIRED.ANY / CLKS,,
Info.Thread,Same_Twice,,Second copy,,INST_RETIRED.ANY / CLKS,,
Info.Thread,Differs,,First copy,,INST_RETIRED.ANY / CLKS,,
Info.Thread,Differs,,Second copy,,CPU_CLK_UNHALTED.THREAD / CLKS,,
Info.Thread,SLOTS,,Total issue slots,TmaL1,#Pipeline_Width * CLKS,,
Info.Thread,CLKS,,Core cycles,,CPU_CLK_UNHALTED.THREAD,,
Aux,#Pipeline_Width,,,,4,,
";

fn catalog() -> EventCatalog {
    let mut events = ArchEvents::new();
    events.add_file("core", "core.json", EVENTS, false).unwrap();
    events.catalog
}

fn extract() -> Extraction {
    let rules = Rules::builtin().unwrap();
    let catalog = catalog();
    let ctx = ExtractContext {
        rules: &rules,
        catalog: &catalog,
        shortname: "SKL",
        pmu: "cpu",
    };
    extract_metrics(TABLE, &[], &ctx)
}

fn metric<'a>(extraction: &'a Extraction, name: &str) -> &'a Metric {
    extraction
        .metrics
        .iter()
        .find(|m| m.name == name)
        .unwrap_or_else(|| panic!("{} was not emitted", name))
}

#[test]
fn test_extraction_is_deterministic() {
    assert_eq!(extract().metrics, extract().metrics);
}

#[test]
fn test_referential_closure() {
    let rules = Rules::builtin().unwrap();
    let catalog = catalog();
    let extraction = extract();
    let emitted: Vec<&str> = extraction.metrics.iter().map(|m| m.name.as_str()).collect();

    for metric in &extraction.metrics {
        let known = |token: &str| catalog.contains(token) || emitted.contains(&token);
        assert_eq!(
            unresolved_tokens(&metric.expr, &rules, known),
            Vec::<&str>::new(),
            "{}",
            metric.name
        );
    }
}

#[test]
fn test_expansion_operators() {
    let extraction = extract();
    assert_eq!(
        metric(&extraction, "Frontend_Max").expr,
        "max(tma_frontend_bound, tma_fetch_bandwidth + tma_fetch_latency)"
    );
    assert_eq!(
        metric(&extraction, "Frontend_Sum").expr,
        "(tma_fetch_bandwidth + tma_fetch_latency)"
    );
}

#[test]
fn test_topdown_nodes() {
    let extraction = extract();
    let latency = metric(&extraction, "tma_fetch_latency");
    assert_eq!(
        latency.expr,
        "4 * IDQ_UOPS_NOT_DELIVERED.CYCLES_0_UOPS_DELIV.CORE / SLOTS"
    );
    assert_eq!(
        latency.group.as_deref(),
        Some("Frontend;TopdownL2;tma_frontend_bound_group")
    );
    assert_eq!(latency.scale_unit.as_deref(), Some("100%"));

    let bandwidth = metric(&extraction, "tma_fetch_bandwidth");
    assert_eq!(
        bandwidth.expr,
        "(IDQ_UOPS_NOT_DELIVERED.CORE / SLOTS) - (4 * IDQ_UOPS_NOT_DELIVERED.CYCLES_0_UOPS_DELIV.CORE / SLOTS)"
    );
}

#[test]
fn test_ternary_and_linear_folds() {
    let extraction = extract();
    assert_eq!(metric(&extraction, "Picked").expr, "INST_RETIRED.ANY");
    assert_eq!(metric(&extraction, "Not_Picked").expr, "CPU_CLK_UNHALTED.THREAD");
    assert_eq!(metric(&extraction, "Linear").expr, "1 * INST_RETIRED.ANY");
}

#[test]
fn test_companion_slots_term() {
    let extraction = extract();
    assert_eq!(
        metric(&extraction, "Retiring_Share").expr,
        "topdown\\-retiring / (topdown\\-fe\\-bound + topdown\\-retiring) + 0 * SLOTS"
    );
    assert_eq!(
        metric(&extraction, "Retiring_Per_Slot").expr,
        "topdown\\-retiring / SLOTS"
    );
}

#[test]
fn test_duplicate_handling() {
    let extraction = extract();
    let count = |name: &str| extraction.metrics.iter().filter(|m| m.name == name).count();
    assert_eq!(count("Same_Twice"), 1);
    assert_eq!(count("Differs"), 1);
    assert_eq!(metric(&extraction, "Differs").expr, "INST_RETIRED.ANY / CLKS");

    let duplicates: Vec<&str> = extraction
        .diagnostics
        .iter()
        .filter_map(|d| match &d.issue {
            ExtractIssue::DuplicateMetric { metric, .. } => Some(metric.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(duplicates, vec!["Differs"]);
}

#[test]
fn test_fallback_chain() {
    let extraction = extract();
    assert_eq!(metric(&extraction, "Fallback_IPC").expr, "INST_RETIRED.ANY / CLKS");

    assert!(extraction.metrics.iter().all(|m| m.name != "No_Formula"));
    assert!(extraction.diagnostics.iter().any(|d| d.issue
        == ExtractIssue::MissingFormula {
            metric: "No_Formula".to_string(),
            arch: "SKL".to_string(),
        }));
}

#[test]
fn test_hybrid_pmu_tags_unit() {
    let rules = Rules::builtin().unwrap();
    let catalog = catalog();
    let ctx = ExtractContext {
        rules: &rules,
        catalog: &catalog,
        shortname: "SKL",
        pmu: "cpu_core",
    };
    let extraction = extract_metrics(TABLE, &[], &ctx);
    assert!(extraction
        .metrics
        .iter()
        .all(|m| m.unit.as_deref() == Some("cpu_core")));
}

const PERF_METRICS_TABLE: &str = "\
Key,Level1,Metric Description,Metric Group,ICX,SKL/KBL
RET,Retiring,Retiring slots,TmaL1,PERF_METRICS.RETIRING / TOPDOWN.SLOTS:perf_metrics,PERF_METRICS.RETIRING / TOPDOWN.SLOTS:perf_metrics
Info.Thread,Heavy_Share,Heavy operations share,,#Heavy_Fraction * 2,#Heavy_Fraction * 2
Aux,#Heavy_Fraction,,,PERF_METRICS.HEAVY_OPERATIONS / TOPDOWN.SLOTS:perf_metrics,PERF_METRICS.HEAVY_OPERATIONS / TOPDOWN.SLOTS:perf_metrics
";

fn extract_perf_metrics(shortname: &str) -> Extraction {
    let rules = Rules::builtin().unwrap();
    let mut events = ArchEvents::new();
    events
        .add_file(
            "core",
            "core.json",
            r#"[{"EventName": "TOPDOWN.SLOTS", "EventCode": "0x00", "UMask": "0x4"}]"#,
            false,
        )
        .unwrap();
    let ctx = ExtractContext {
        rules: &rules,
        catalog: &events.catalog,
        shortname,
        pmu: "cpu",
    };
    extract_metrics(PERF_METRICS_TABLE, &[], &ctx)
}

#[test]
fn test_arch_fixups_rewrite_perf_metrics() {
    let extraction = extract_perf_metrics("ICX");
    assert_eq!(
        metric(&extraction, "tma_retiring").expr,
        "topdown\\-retiring / TOPDOWN.SLOTS"
    );
    assert_eq!(
        metric(&extraction, "Heavy_Share").expr,
        "(topdown\\-heavy\\-ops / TOPDOWN.SLOTS) * 2"
    );
}

#[test]
fn test_arch_fixups_only_apply_to_their_arch() {
    let extraction = extract_perf_metrics("SKL");
    assert!(extraction.metrics.is_empty());

    let unresolved: Vec<(&str, &str)> = extraction
        .diagnostics
        .iter()
        .filter_map(|d| match &d.issue {
            ExtractIssue::UnresolvedSymbol { metric, symbol } => {
                Some((metric.as_str(), symbol.as_str()))
            }
            _ => None,
        })
        .collect();
    assert_eq!(
        unresolved,
        vec![
            ("tma_retiring", "TOPDOWN.SLOTS:perf_metrics"),
            ("Heavy_Share", "TOPDOWN.SLOTS:perf_metrics"),
        ]
    );
}

#[test]
fn test_substituted_zeros_are_cleaned_up() {
    let table = "\
Key,Level1,Metric Description,SKL/KBL
Info.Thread,Empty,Not available here,#NA
Info.Thread,Sum,Sum with an empty term,(Empty + INST_RETIRED.ANY) / CPU_CLK_UNHALTED.THREAD
Info.Thread,Na_Sum,Sum with an unavailable term,(CPU_CLK_UNHALTED.THREAD + #NA) / 2
Info.Thread,Chained,Linear tail of a sum,CPU_CLK_UNHALTED.THREAD + (2 * INST_RETIRED.ANY) - (1 * INST_RETIRED.ANY)
";
    let rules = Rules::builtin().unwrap();
    let catalog = catalog();
    let ctx = ExtractContext {
        rules: &rules,
        catalog: &catalog,
        shortname: "SKL",
        pmu: "cpu",
    };
    let extraction = extract_metrics(table, &[], &ctx);
    assert_eq!(
        metric(&extraction, "Sum").expr,
        "(INST_RETIRED.ANY) / CPU_CLK_UNHALTED.THREAD"
    );
    assert_eq!(metric(&extraction, "Na_Sum").expr, "(CPU_CLK_UNHALTED.THREAD) / 2");
    assert_eq!(
        metric(&extraction, "Chained").expr,
        "CPU_CLK_UNHALTED.THREAD + 1 * INST_RETIRED.ANY"
    );
}
