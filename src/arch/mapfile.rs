//! Reader for the event repository's `mapfile.csv`.

use super::model::Model;
use crate::utils::config::{
    ECORE_TMA_METRICS_PATH, FILE_ECORE_TMA_METRICS, FILE_EXTRA_METRICS, FILE_TMA_METRICS,
    FILE_UNCORE_CSV, MAPFILE_COLUMNS, TMA_METRICS_PATH,
};
use crate::utils::error::MapfileError;
use log::{debug, trace};
use std::collections::{BTreeMap, BTreeSet};

/// One mapfile row with its workarounds applied
#[derive(Debug, Clone, PartialEq)]
struct Row {
    family_model: String,
    version: String,
    path: String,
    event_type: String,
}

/// Shortname and longname encoded in an event file path
///
/// `/SKL/events/skylake_core.json` → `("SKL", "skylake")`
pub fn names_from_path(path: &str) -> (String, String) {
    let trimmed = path.trim_start_matches('/');
    let shortname = trimmed.split('/').next().unwrap_or_default().to_string();

    let marker = format!("/{}/events/", shortname);
    let longname = match path.find(&marker) {
        Some(at) => {
            let rest = &path[at + marker.len()..];
            rest.split('_').next().unwrap_or(rest).to_string()
        }
        None => path.to_string(),
    };

    (shortname, longname)
}

fn read_row(cells: &[String]) -> (String, Row) {
    let (family_model, version, path, event_type, core_role) =
        (&cells[0], &cells[1], &cells[2], &cells[3], &cells[6]);
    let (shortname, _) = names_from_path(path);

    let mut event_type = event_type.clone();
    // ADL's atom-only model says `core` instead of `hybridcore`.
    if shortname == "ADL" && event_type == "core" {
        event_type = "atom".to_string();
    }
    if event_type == "hybridcore" {
        event_type = if core_role == "Core" { "core" } else { "atom" }.to_string();
    }

    (
        shortname,
        Row {
            family_model: family_model.clone(),
            version: version.clone(),
            path: path.clone(),
            event_type,
        },
    )
}

/// Parse `mapfile.csv` into models sorted by long name
///
/// **Public** - the first step of generation
///
/// # Arguments
/// * `text` - mapfile contents
/// * `base_path` - URL prefix joined with each file path
/// * `exists` - tells whether an optional per-model file is present
///
/// # Errors
/// * `MapfileError::Empty` - no header row
/// * `MapfileError::BadHeader` - a header column is not the expected one
/// * `MapfileError::Inconsistent` - rows of one model disagree
pub fn parse_mapfile(
    text: &str,
    base_path: &str,
    exists: impl Fn(&str) -> bool,
) -> Result<Vec<Model>, MapfileError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = reader.records();
    let header = records.next().ok_or(MapfileError::Empty)??;
    let mut header: Vec<String> = header.iter().map(|c| c.trim().to_string()).collect();
    header.resize(MAPFILE_COLUMNS.len(), String::new());
    for (index, expected) in MAPFILE_COLUMNS.iter().enumerate() {
        if header[index] != *expected {
            return Err(MapfileError::BadHeader {
                index,
                expected: expected.to_string(),
                found: header[index].clone(),
            });
        }
    }

    let mut longnames: BTreeMap<String, String> = BTreeMap::new();
    let mut versions: BTreeMap<String, String> = BTreeMap::new();
    let mut ids: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut files: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();

    for record in records {
        let record = record?;
        let mut cells: Vec<String> = record.iter().map(|c| c.trim().to_string()).collect();
        cells.resize(MAPFILE_COLUMNS.len(), String::new());
        trace!("Read mapfile line: {:?}", cells);

        let (shortname, row) = read_row(&cells);

        // KNM shares KNL's files; only its model id is kept.
        if shortname == "KNM" {
            ids.entry("KNL".to_string()).or_default().insert(row.family_model);
            continue;
        }

        let (_, longname) = names_from_path(&row.path);
        check_same(&mut longnames, &shortname, "longname", &longname)?;
        check_same(&mut versions, &shortname, "version", &row.version)?;
        ids.entry(shortname.clone()).or_default().insert(row.family_model);

        let url = format!("{}{}", base_path, row.path);
        let model_files = files.entry(shortname.clone()).or_default();
        match model_files.get(&row.event_type) {
            Some(existing) if *existing != url => {
                return Err(MapfileError::Inconsistent {
                    shortname,
                    field: "event file",
                    existing: existing.clone(),
                    found: url,
                })
            }
            Some(_) => {}
            None => {
                model_files.insert(row.event_type, url);
            }
        }
    }

    let mut models = Vec::new();
    for (shortname, longname) in &longnames {
        let mut model_files = files.remove(shortname).unwrap_or_default();
        let short_lower = shortname.to_lowercase();

        let uncore_csv = format!(
            "{}/scripts/config/perf-uncore-events-{}.csv",
            base_path, short_lower
        );
        if exists(&uncore_csv) {
            model_files.insert(FILE_UNCORE_CSV.to_string(), uncore_csv);
        }

        model_files.insert(
            FILE_TMA_METRICS.to_string(),
            format!("{}{}", base_path, TMA_METRICS_PATH),
        );
        if model_files.contains_key("atom") {
            model_files.insert(
                FILE_ECORE_TMA_METRICS.to_string(),
                format!("{}{}", base_path, ECORE_TMA_METRICS_PATH),
            );
        }

        let extra = format!(
            "{}/{}/metrics/perf/{}_metric_perf.json",
            base_path, shortname, short_lower
        );
        if exists(&extra) {
            model_files.insert(FILE_EXTRA_METRICS.to_string(), extra);
        }

        models.push(Model::new(
            shortname,
            longname,
            versions.get(shortname).map(String::as_str).unwrap_or_default(),
            ids.remove(shortname).unwrap_or_default(),
            model_files,
        ));
    }

    models.sort_by(|a, b| a.longname.cmp(&b.longname));
    debug!("Parsed {} models", models.len());
    Ok(models)
}

fn check_same(
    seen: &mut BTreeMap<String, String>,
    shortname: &str,
    field: &'static str,
    value: &str,
) -> Result<(), MapfileError> {
    match seen.get(shortname) {
        Some(existing) if existing != value => Err(MapfileError::Inconsistent {
            shortname: shortname.to_string(),
            field,
            existing: existing.clone(),
            found: value.to_string(),
        }),
        Some(_) => Ok(()),
        None => {
            seen.insert(shortname.to_string(), value.to_string());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const MAPFILE: &str = "\
Family-model,Version,Filename,EventType,Core Type,Native Model ID,Core Role Name
GenuineIntel-6-55-[01234],V1.28,/SKX/events/skylakex_core.json,core,,,
GenuineIntel-6-55-[01234],V1.28,/SKX/events/skylakex_uncore.json,uncore,,,
GenuineIntel-6-4E,V57,/SKL/events/skylake_core.json,core,,,
GenuineIntel-6-5E,V57,/SKL/events/skylake_core.json,core,,,
GenuineIntel-6-97,V1.19,/ADL/events/alderlake_gracemont_core.json,hybridcore,0x20,0x0,Atom
GenuineIntel-6-97,V1.19,/ADL/events/alderlake_goldencove_core.json,hybridcore,0x40,0x1,Core
GenuineIntel-6-BE,V1.19,/ADL/events/alderlake_gracemont_core.json,core,,,
GenuineIntel-6-57,V9,/KNL/events/knightslanding_core.json,core,,,
GenuineIntel-6-85,V9,/KNM/events/knightslanding_core.json,core,,,
";

    fn parse(exists: impl Fn(&str) -> bool) -> Vec<Model> {
        parse_mapfile(MAPFILE, "file:///repo", exists).unwrap()
    }

    #[test]
    fn test_names_from_path() {
        assert_eq!(
            names_from_path("/SKX/events/skylakex_uncore.json"),
            ("SKX".to_string(), "skylakex".to_string())
        );
    }

    #[test]
    fn test_models_sorted_by_longname() {
        let models = parse(|_| false);
        let names: Vec<&str> = models.iter().map(|m| m.longname.as_str()).collect();
        assert_eq!(names, vec!["alderlake", "knightslanding", "skylake", "skylakex"]);
    }

    #[test]
    fn test_hybrid_and_workarounds() {
        let models = parse(|_| false);
        let adl = &models[0];
        assert!(adl.is_hybrid());
        assert_eq!(adl.files["atom"], "file:///repo/ADL/events/alderlake_gracemont_core.json");
        assert_eq!(adl.files["core"], "file:///repo/ADL/events/alderlake_goldencove_core.json");
        assert!(adl.has_file(FILE_ECORE_TMA_METRICS));

        let knl = &models[1];
        assert_eq!(knl.models, vec!["GenuineIntel-6-57", "GenuineIntel-6-85"]);
    }

    #[test]
    fn test_optional_files_detected() {
        let models = parse(|url| url.ends_with("perf-uncore-events-skx.csv"));
        let skx = models.iter().find(|m| m.shortname == "SKX").unwrap();
        assert_eq!(
            skx.files[FILE_UNCORE_CSV],
            "file:///repo/scripts/config/perf-uncore-events-skx.csv"
        );
        assert!(!skx.has_file(FILE_EXTRA_METRICS));
        assert_eq!(skx.files[FILE_TMA_METRICS], "file:///repo/TMA_Metrics-full.csv");
    }

    #[test]
    fn test_bad_header() {
        let err = parse_mapfile("Family,Version\n", "x", |_| false).unwrap_err();
        assert!(matches!(err, MapfileError::BadHeader { index: 0, .. }));
    }

    #[test]
    fn test_inconsistent_version() {
        let text = "\
Family-model,Version,Filename,EventType,Core Type,Native Model ID,Core Role Name
GenuineIntel-6-4E,V57,/SKL/events/skylake_core.json,core,,,
GenuineIntel-6-5E,V58,/SKL/events/skylake_core.json,core,,,
";
        let err = parse_mapfile(text, "x", |_| false).unwrap_err();
        assert!(matches!(err, MapfileError::Inconsistent { field: "version", .. }));
    }
}
