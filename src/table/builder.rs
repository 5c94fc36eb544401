//! Symbol Table Builder: one TMA table, one architecture.
//!
//! Rows are classified by their key column. Topdown rows build the node
//! hierarchy; info rows become standalone metrics; aux rows only feed
//! other formulas.

use super::symbols::SymbolTable;
use crate::diagnostics::{Diagnostic, ExtractIssue};
use crate::metrics::schema::MetricSpec;
use crate::rules::{Rules, TmaColumn};
use crate::utils::error::TableError;
use log::{debug, trace};
use std::collections::HashMap;

/// Result of reading one table for one architecture
#[derive(Debug, Clone, Default)]
pub struct BuiltTable {
    pub symbols: SymbolTable,

    /// Topdown and info metrics in row order
    pub metrics: Vec<MetricSpec>,

    /// Formula column the cells were taken from
    pub column: String,

    pub diagnostics: Vec<Diagnostic>,
}

const KEY_COLUMN: &str = "Key";
const DESCRIPTION_COLUMN: &str = "Metric Description";
const GROUP_COLUMN: &str = "Metric Group";
const LOCATE_COLUMN: &str = "Locate-with";
const FIRST_LEVEL: &str = "Level1";

/// Column positions from the header row
struct Header {
    index: HashMap<String, usize>,
    levels: Vec<String>,
}

impl Header {
    fn parse(row: &[String]) -> Self {
        let mut index = HashMap::new();
        let mut levels = Vec::new();
        for (i, name) in row.iter().enumerate() {
            index.insert(name.clone(), i);
            if name.starts_with("Level") {
                levels.push(name.clone());
            }
        }
        Self { index, levels }
    }

    fn has(&self, column: &str) -> bool {
        self.index.contains_key(column)
    }

    fn require(&self, column: &str) -> Result<(), TableError> {
        if self.has(column) {
            Ok(())
        } else {
            Err(TableError::MalformedTable {
                column: column.to_string(),
            })
        }
    }

    /// Cell text, empty when the column or cell is absent
    fn field<'r>(&self, row: &'r [String], column: &str) -> &'r str {
        self.index
            .get(column)
            .and_then(|&i| row.get(i))
            .map(|s| s.trim())
            .unwrap_or("")
    }
}

/// Read table rows, keeping cells as owned strings
pub fn read_rows(text: &str) -> Result<Vec<Vec<String>>, TableError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

/// Build the symbol table and metric list for one architecture
///
/// **Public** - first stage of metric extraction
///
/// # Arguments
/// * `text` - raw CSV text of the TMA table
/// * `shortname` - architecture being extracted
/// * `tma` - formula column family for the architecture
/// * `rules` - topdown prefixes, banned events, default groups
///
/// # Errors
/// * `TableError::Csv` - the text is not CSV
/// * `TableError::MissingHeader` - no row starts with `Key`
/// * `TableError::MalformedTable` - a required column is missing
pub fn build_table(
    text: &str,
    shortname: &str,
    tma: &TmaColumn,
    rules: &Rules,
) -> Result<BuiltTable, TableError> {
    let rows = read_rows(text)?;

    let header_at = rows
        .iter()
        .position(|row| row.first().map(String::as_str) == Some(KEY_COLUMN))
        .ok_or(TableError::MissingHeader)?;
    let header = Header::parse(&rows[header_at]);
    debug!("Table columns: {}, levels: {:?}", header.index.len(), header.levels);

    header.require(FIRST_LEVEL)?;
    header.require(DESCRIPTION_COLUMN)?;

    let column = if header.has(&tma.column) {
        tma.column.clone()
    } else {
        match tma.alternate.as_deref() {
            Some(alternate) if header.has(alternate) => alternate.to_string(),
            _ => {
                return Err(TableError::MalformedTable {
                    column: tma.column.clone(),
                })
            }
        }
    };
    let search: Vec<&str> = if column == tma.column {
        tma.search_order().collect()
    } else {
        rules
            .tma_columns
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.search_order().collect())
            .unwrap_or_else(|| vec![column.as_str()])
    };

    let arch = rules.arch(shortname);
    let mut built = BuiltTable {
        column: column.clone(),
        ..Default::default()
    };

    for row in &rows[header_at + 1..] {
        let key = header.field(row, KEY_COLUMN);

        let formula = search
            .iter()
            .filter(|c| header.has(c))
            .map(|c| header.field(row, c))
            .find(|cell| !cell.is_empty())
            .filter(|cell| !arch.banned_events.iter().any(|e| cell.contains(e.as_str())))
            .map(str::to_string);

        let locate = match locate_hint(header.field(row, LOCATE_COLUMN), shortname) {
            Ok(hint) => hint,
            Err(reason) => {
                built.diagnostics.push(Diagnostic::info(ExtractIssue::InvalidFormula {
                    metric: header.field(row, FIRST_LEVEL).to_string(),
                    reason,
                }));
                None
            }
        };

        let table_group = header.field(row, GROUP_COLUMN);

        if rules.topdown_prefixes.iter().any(|p| key.starts_with(p.as_str())) {
            add_topdown_row(&mut built, &header, row, formula, locate, table_group, shortname);
        } else if key.starts_with("Info") {
            let name = header.field(row, FIRST_LEVEL);
            let Some(formula) = formula else {
                built.diagnostics.push(Diagnostic::info(ExtractIssue::MissingFormula {
                    metric: name.to_string(),
                    arch: shortname.to_string(),
                }));
                continue;
            };
            built.symbols.add_info(name, &formula);
            built.metrics.push(MetricSpec {
                name: name.to_string(),
                table_name: name.to_string(),
                formula: Some(formula),
                description: header.field(row, DESCRIPTION_COLUMN).to_string(),
                groups: metric_group(table_group, name, rules),
                locate,
                scale_unit: None,
            });
        } else if key.starts_with("Aux") {
            if let Some(formula) = formula.filter(|f| f != "#NA") {
                let name = header.field(row, FIRST_LEVEL);
                trace!("Adding aux {}: {}", name, formula);
                built.symbols.add_aux(name, &formula);
            }
        }
    }

    Ok(built)
}

fn add_topdown_row(
    built: &mut BuiltTable,
    header: &Header,
    row: &[String],
    formula: Option<String>,
    locate: Option<String>,
    table_group: &str,
    shortname: &str,
) {
    let found = header
        .levels
        .iter()
        .map(|level| (level, header.field(row, level)))
        .find(|(_, name)| !name.is_empty());
    let Some((level_column, name)) = found else {
        built.diagnostics.push(Diagnostic::warning(ExtractIssue::Skipped {
            metric: header.field(row, KEY_COLUMN).to_string(),
            reason: "topdown row names no metric".to_string(),
        }));
        return;
    };

    let level: usize = level_column
        .trim_start_matches("Level")
        .parse()
        .unwrap_or(1)
        .max(1);

    // The stack holds one ancestor per level above this one.
    let parents = &mut built.symbols.parents;
    if level > parents.len() + 1 {
        built.diagnostics.push(Diagnostic::warning(ExtractIssue::Skipped {
            metric: name.to_string(),
            reason: format!("level {} has no level {} parent", level, level - 1),
        }));
        return;
    }
    if level > parents.len() {
        parents.push(name.to_string());
    } else {
        parents.truncate(level);
        if let Some(top) = parents.last_mut() {
            *top = name.to_string();
        }
    }
    trace!("{} => {:?}", name, parents);

    let parent = (level > 1)
        .then(|| parents.get(level - 2).cloned())
        .flatten();

    let Some(formula) = formula else {
        built.diagnostics.push(Diagnostic::info(ExtractIssue::MissingFormula {
            metric: name.to_string(),
            arch: shortname.to_string(),
        }));
        return;
    };

    let mut groups = format!("TopdownL{}", level);
    if !table_group.is_empty() {
        groups.push(';');
        groups.push_str(table_group);
    }
    if let Some(parent) = &parent {
        groups.push_str(&format!(";tma_{}_group", parent.to_lowercase()));
        built.symbols.add_child(parent, name);
    }

    let metric_name = built.symbols.add_node(name, &formula);
    built.metrics.push(MetricSpec {
        name: metric_name,
        table_name: name.to_string(),
        formula: Some(formula),
        description: header.field(row, DESCRIPTION_COLUMN).to_string(),
        groups: Some(groups),
        locate,
        scale_unit: Some("100%".to_string()),
    });
}

fn metric_group(table_group: &str, name: &str, rules: &Rules) -> Option<String> {
    if table_group.is_empty() {
        rules.metric_groups.get(name).cloned()
    } else {
        Some(table_group.to_string())
    }
}

/// Pick the sampling hint that applies to `shortname`
///
/// `cond ? a : b` yields `a` when `cond` mentions the architecture and
/// `b` otherwise. `#NA` means no hint.
///
/// # Errors
/// Returns a reason when the cell uses `?` without the full conditional shape.
pub fn locate_hint(cell: &str, shortname: &str) -> Result<Option<String>, String> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(None);
    }

    let hint = if cell.contains('?') {
        let (cond, branches) = cell
            .split_once('?')
            .ok_or_else(|| format!("malformed locate hint '{}'", cell))?;
        let (then, otherwise) = branches
            .split_once(':')
            .filter(|(a, b)| !cond.trim().is_empty() && !a.trim().is_empty() && !b.trim().is_empty())
            .ok_or_else(|| format!("malformed locate hint '{}'", cell))?;

        if cond.contains(shortname) {
            then.trim()
        } else {
            otherwise.trim()
        }
    } else {
        cell
    };

    Ok((hint != "#NA").then(|| hint.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TABLE: &str = "\
Version,4.5,,,,,,,,
Key,Level1,Level2,Level3,Metric Description,Metric Group,Locate-with,SKL/KBL,BDW,HSW
FE,Frontend_Bound,,,Frontend stalls.,TmaL1;PGO,FRONTEND_RETIRED.LATENCY_GE_4:pp,IDQ_UOPS_NOT_DELIVERED.CORE / SLOTS,,
FE,,Fetch_Latency,,Fetch latency.,Frontend,,,4 * CYCLES / SLOTS,
FE,,,ICache_Misses,Icache misses.,,SKL ? ICACHE_16B.IFDATA_STALL : #NA,,,ICACHE.IFDATA_STALL / CLKS
FE,,Fetch_Bandwidth,,Fetch bandwidth.,,,#Frontend_Bound - #Fetch_Latency,,
BE,Backend_Bound,,,Backend stalls.,TmaL1,,,,
Info.Thread,IPC,,,Instructions per cycle.,Ret;Summary,,INST_RETIRED.ANY / CLKS,,
Info.System,Kernel_Utilization,,,Kernel fraction.,,,CPU_CLK_UNHALTED.THREAD:sup / CPU_CLK_UNHALTED.THREAD,,
Aux,#Pipeline_Width,,,,,,4,,
Aux,#Unused,,,,,,#NA,,
";

    fn build(shortname: &str) -> BuiltTable {
        let rules = Rules::builtin().unwrap();
        let tma = rules.tma_column_for(shortname).unwrap().clone();
        build_table(TABLE, shortname, &tma, &rules).unwrap()
    }

    #[test]
    fn test_row_classification() {
        let built = build("SKL");
        let names: Vec<&str> = built.metrics.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "tma_frontend_bound",
                "tma_fetch_latency",
                "tma_icache_misses",
                "tma_fetch_bandwidth",
                "IPC",
                "Kernel_Utilization"
            ]
        );
        assert_eq!(built.symbols.aux["Pipeline_Width"], "4");
        assert!(!built.symbols.aux.contains_key("Unused"));
    }

    #[test]
    fn test_fallback_chain_order() {
        let built = build("SKL");
        // Own cell empty; BDW comes before HSW in the chain.
        assert_eq!(built.symbols.nodes["Fetch_Latency"], "4 * CYCLES / SLOTS");
        assert_eq!(built.symbols.nodes["ICache_Misses"], "ICACHE.IFDATA_STALL / CLKS");
    }

    #[test]
    fn test_missing_formula_reported() {
        let built = build("SKL");
        assert!(built.diagnostics.iter().any(|d| d.issue
            == ExtractIssue::MissingFormula {
                metric: "Backend_Bound".to_string(),
                arch: "SKL".to_string()
            }));
        assert!(!built.symbols.nodes.contains_key("Backend_Bound"));
    }

    #[test]
    fn test_hierarchy_and_groups() {
        let built = build("SKL");
        assert_eq!(
            built.symbols.children_of("Frontend_Bound"),
            vec!["Fetch_Bandwidth", "Fetch_Latency"]
        );
        assert_eq!(built.symbols.children_of("Fetch_Latency"), vec!["ICache_Misses"]);

        let latency = &built.metrics[1];
        assert_eq!(
            latency.groups.as_deref(),
            Some("TopdownL2;Frontend;tma_frontend_bound_group")
        );
        assert_eq!(latency.scale_unit.as_deref(), Some("100%"));
        assert_eq!(built.metrics[0].groups.as_deref(), Some("TopdownL1;TmaL1;PGO"));
    }

    #[test]
    fn test_default_metric_group() {
        let built = build("SKL");
        let kernel = built.metrics.iter().find(|m| m.name == "Kernel_Utilization").unwrap();
        assert_eq!(kernel.groups.as_deref(), Some("Summary"));
    }

    #[test]
    fn test_locate_hint_selection() {
        let built = build("SKL");
        assert_eq!(built.metrics[2].locate.as_deref(), Some("ICACHE_16B.IFDATA_STALL"));
        assert_eq!(
            built.metrics[0].locate.as_deref(),
            Some("FRONTEND_RETIRED.LATENCY_GE_4:pp")
        );
    }

    #[test]
    fn test_locate_hint_cases() {
        assert_eq!(locate_hint("SKL ? A : B", "HSW").unwrap(), Some("B".to_string()));
        assert_eq!(locate_hint("SKL ? A : #NA", "HSW").unwrap(), None);
        assert_eq!(locate_hint("#NA", "HSW").unwrap(), None);
        assert!(locate_hint("SKL ? A", "SKL").is_err());
    }

    #[test]
    fn test_missing_column_is_malformed() {
        let rules = Rules::builtin().unwrap();
        let tma = rules.tma_column_for("ICX").unwrap().clone();
        let err = build_table(TABLE, "ICX", &tma, &rules).unwrap_err();
        assert!(matches!(err, TableError::MalformedTable { column } if column == "ICX"));
    }

    #[test]
    fn test_missing_header() {
        let rules = Rules::builtin().unwrap();
        let tma = rules.tma_column_for("SKL").unwrap().clone();
        let err = build_table("a,b\n1,2\n", "SKL", &tma, &rules).unwrap_err();
        assert!(matches!(err, TableError::MissingHeader));
    }

    #[test]
    fn test_orphan_level_skipped() {
        let rules = Rules::builtin().unwrap();
        let tma = rules.tma_column_for("SKL").unwrap().clone();
        let text = "Key,Level1,Level2,Level3,Metric Description,SKL/KBL\nBE,,,Deep,Orphan.,X / Y\n";
        let built = build_table(text, "SKL", &tma, &rules).unwrap();
        assert!(built.metrics.is_empty());
        assert_eq!(built.diagnostics.len(), 1);
    }
}
