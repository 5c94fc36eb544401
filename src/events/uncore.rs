//! Uncore event rewrites from a per-architecture CSV.
//!
//! Columns: name, newname, desc, filter, scale, formula, comment. Rows
//! rename, redescribe or re-filter existing uncore events, and may attach
//! a metric formula to them.

use super::ArchEvents;
use crate::utils::error::EventError;
use log::{debug, warn};
use regex::Regex;
use std::sync::OnceLock;

const COLUMNS: usize = 7;

/// Filter spellings and their perf term
const FILTER_TERMS: [(&str, &str); 8] = [
    ("State=", ",filter_state="),
    ("Match=", ",filter_opc="),
    (":opc=", ",filter_opc="),
    (":nc=", ",filter_nc="),
    (":tid=", ",filter_tid="),
    (":state=", ",filter_state="),
    (":filter1=", ",config1="),
    ("fc, chnl", ""),
];

fn umask_re() -> &'static Regex {
    static UMASK_RE: OnceLock<Regex> = OnceLock::new();
    // Safety: this regex literal is guaranteed to compile
    UMASK_RE.get_or_init(|| Regex::new(r"^:u([0-9xa-f]+)").unwrap())
}

fn unit_prefix_re() -> &'static Regex {
    static UNIT_PREFIX_RE: OnceLock<Regex> = OnceLock::new();
    // Safety: this regex literal is guaranteed to compile
    UNIT_PREFIX_RE.get_or_init(|| Regex::new(r"UNC_[A-Z]_").unwrap())
}

/// Apply an uncore rewrite table to an architecture's events
///
/// Rows naming unknown events are ignored.
///
/// # Returns
/// Number of rows that matched an event
///
/// # Errors
/// * `EventError::Csv` - the text is not CSV
pub fn apply_uncore_csv(events: &mut ArchEvents, text: &str) -> Result<usize, EventError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut applied = 0;
    for record in reader.records() {
        let record = record?;
        let mut cells: Vec<String> = record.iter().map(|c| c.trim().to_string()).collect();
        cells.resize(COLUMNS, String::new());

        if apply_row(events, &cells) {
            applied += 1;
        }
    }

    Ok(applied)
}

fn apply_row(events: &mut ArchEvents, cells: &[String]) -> bool {
    let (newname, desc, filter, scale, formula) = (&cells[1], &cells[2], &cells[3], &cells[4], &cells[5]);

    let (mut name, mut umask) = match cells[0].split_once(':') {
        Some((name, umask)) => (name.to_string(), umask.get(1..).map(str::to_string)),
        None => (cells[0].clone(), None),
    };

    let usable = |events: &ArchEvents, n: &str| {
        events
            .catalog
            .lookup(n)
            .map_or(false, |e| !e.is_deprecated())
    };
    if !usable(events, &name) {
        let renamed = name.replace("_C_", "_CHA_").replace("_H_", "_CHA_");
        if renamed != name && events.catalog.lookup(&renamed).is_some() {
            name = renamed;
        }
    }
    let Some(source) = events.catalog.lookup(&name) else {
        return false;
    };
    let filter_value = source.filter_value.clone().unwrap_or_default();

    let mut description = desc.clone();
    let target = if newname.is_empty() {
        name.clone()
    } else {
        if events.clone_as(&name, newname).is_none() {
            warn!("Cannot clone {} as {}", name, newname);
            return false;
        }
        if !description.is_empty() {
            description.push_str(&format!(". Derived from {}", name.to_lowercase()));
        }
        newname.clone()
    };

    let mut updates: Vec<(&str, String)> = Vec::new();

    if !description.is_empty() {
        updates.push(("BriefDescription", description));
    }

    if !filter.is_empty() {
        let mut filter = if filter == "Filter1" {
            format!("config1={}", filter_value)
        } else {
            filter.clone()
        };
        for (before, after) in FILTER_TERMS {
            filter = filter.replace(before, after);
        }
        let leading_umask = umask_re()
            .captures(&filter)
            .map(|m| (m[0].to_string(), m[1].to_string()));
        if let Some((whole, digits)) = leading_umask {
            if let Ok(value) = u64::from_str_radix(digits.trim_start_matches("0x"), 16) {
                umask = Some(format!("0x{:x}", value));
            }
            filter = filter.replacen(&whole, "", 1);
        }
        let filter = filter.trim_matches(',');
        if !filter.is_empty() {
            updates.push(("Filter", filter.to_string()));
        }
    }

    if let Some(umask) = umask {
        updates.push(("UMask", umask));
    }

    if !scale.is_empty() {
        let unit = if scale.contains('(') {
            scale.replace(['(', ')'], "")
        } else {
            format!("{}Bytes", scale)
        };
        updates.push(("ScaleUnit", unit));
    }

    if !formula.is_empty() {
        if !scale.is_empty() {
            debug!("Scale for {} applies to both event and metric", target);
        }
        let (metric_name, expr) = if formula.contains('/') && !target.contains("LATENCY") {
            let expr = formula.replace("X/", &format!("{}/", target));
            (
                unit_prefix_re().replace_all(&target, "").to_lowercase(),
                format!("({}) * 100", expr.replace('/', " / ")),
            )
        } else {
            (target.clone(), formula.clone())
        };
        updates.push(("MetricName", metric_name));
        updates.push(("MetricExpr", expr));
    }

    let Some(json) = events.json_mut(&target) else {
        return false;
    };
    for (key, value) in updates {
        json.insert(key.to_string(), value);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const UNCORE: &str = r#"[
        {"EventName": "UNC_CHA_TOR_INSERTS.IA_MISS", "Unit": "CHA", "EventCode": "0x35", "UMask": "0x21", "BriefDescription": "TOR inserts"},
        {"EventName": "UNC_M_CAS_COUNT.RD", "Unit": "iMC", "EventCode": "0x4", "UMask": "0x3"},
        {"EventName": "UNC_C_TOR_OCCUPANCY.MISS_OPCODE", "Unit": "CBO", "EventCode": "0x36", "Filter": "Filter1", "FILTER_VALUE": "0x182", "Deprecated": "1"}
    ]"#;

    fn events() -> ArchEvents {
        let mut events = ArchEvents::new();
        events.add_file("uncore", "uncore.json", UNCORE, false).unwrap();
        events
    }

    #[test]
    fn test_rename_with_description() {
        let mut events = events();
        let csv = "UNC_M_CAS_COUNT.RD,LLC_MISSES.MEM_READ,read requests to memory,,64,,\n";
        assert_eq!(apply_uncore_csv(&mut events, csv).unwrap(), 1);

        let copy = events.json_mut("LLC_MISSES.MEM_READ").unwrap().clone();
        assert_eq!(
            copy["BriefDescription"],
            "read requests to memory. Derived from unc_m_cas_count.rd"
        );
        assert_eq!(copy["ScaleUnit"], "64Bytes");
        assert_eq!(copy["UMask"], "0x3");
    }

    #[test]
    fn test_filter_translation_and_umask() {
        let mut events = events();
        let csv = "UNC_CHA_TOR_INSERTS.IA_MISS,,,:u0x21:opc=0x202,,,\n";
        apply_uncore_csv(&mut events, csv).unwrap();

        let json = events.json_mut("UNC_CHA_TOR_INSERTS.IA_MISS").unwrap();
        assert_eq!(json["Filter"], "filter_opc=0x202");
        assert_eq!(json["UMask"], "0x21");
    }

    #[test]
    fn test_umask_in_name() {
        let mut events = events();
        apply_uncore_csv(&mut events, "UNC_M_CAS_COUNT.RD:u0xf,,,,,,\n").unwrap();
        assert_eq!(events.json_mut("UNC_M_CAS_COUNT.RD").unwrap()["UMask"], "0xf");
    }

    #[test]
    fn test_formula_becomes_percentage_metric() {
        let mut events = events();
        let csv = "UNC_M_CAS_COUNT.RD,,,,,X/UNC_M_CLOCKTICKS,\n";
        apply_uncore_csv(&mut events, csv).unwrap();

        let json = events.json_mut("UNC_M_CAS_COUNT.RD").unwrap();
        assert_eq!(json["MetricName"], "cas_count.rd");
        assert_eq!(json["MetricExpr"], "(UNC_M_CAS_COUNT.RD / UNC_M_CLOCKTICKS) * 100");
    }

    #[test]
    fn test_deprecated_name_retried_as_cha() {
        let mut events = events();
        events
            .add_file(
                "uncore experimental",
                "exp.json",
                r#"[{"EventName": "UNC_CHA_TOR_OCCUPANCY.MISS_OPCODE", "Unit": "CHA", "EventCode": "0x36"}]"#,
                false,
            )
            .unwrap();
        let csv = "UNC_C_TOR_OCCUPANCY.MISS_OPCODE,,Occupancy of misses,,,,\n";
        apply_uncore_csv(&mut events, csv).unwrap();

        let json = events.json_mut("UNC_CHA_TOR_OCCUPANCY.MISS_OPCODE").unwrap();
        assert_eq!(json["BriefDescription"], "Occupancy of misses");
    }

    #[test]
    fn test_unknown_rows_ignored() {
        let mut events = events();
        let csv = "name,newname,desc,filter,scale,formula,comment\nUNC_NOPE,,x,,,,\n";
        assert_eq!(apply_uncore_csv(&mut events, csv).unwrap(), 0);
    }
}
