//! Generate command implementation.
//!
//! The generate command:
//! 1. Loads the rule set
//! 2. Reads mapfile.csv into models
//! 3. Writes perf's mapfile.csv
//! 4. Writes event and metric JSON per model

use super::models::{GenerateArgs, GenerateSummary};
use crate::arch::{cstate_metrics, parse_mapfile, Model};
use crate::events::{apply_uncore_csv, ArchEvents};
use crate::fetch::SourceClient;
use crate::metrics::{extract_metrics, ExtraMetric, ExtractContext, Metric};
use crate::output::{write_events, write_mapfile, write_metrics};
use crate::rules::Rules;
use crate::utils::config::{
    EVENT_FILE_TYPES, FILE_ECORE_TMA_METRICS, FILE_EXTRA_METRICS, FILE_TMA_METRICS,
    FILE_UNCORE_CSV, MAPFILE_NAME,
};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::Path;
use std::time::Instant;

/// Metric tables and the PMU their events count on in a hybrid model
const METRIC_TABLES: &[(&str, &str)] = &[
    (FILE_TMA_METRICS, "cpu_core"),
    (FILE_ECORE_TMA_METRICS, "cpu_atom"),
];

/// Execute the generate command
///
/// **Public** - main entry point called from main.rs
///
/// # Arguments
/// * `args` - Generate command arguments
///
/// # Returns
/// Counts of what was written. A model that fails is logged, listed in
/// the summary and skipped.
///
/// # Errors
/// * Rules file cannot be loaded
/// * mapfile.csv cannot be fetched or parsed
/// * perf's mapfile.csv cannot be written
pub fn execute_generate(args: GenerateArgs) -> Result<GenerateSummary> {
    let start_time = Instant::now();
    info!("Generating perf JSON from {}", args.basepath);

    // Step 1: Rules
    info!("Step 1/4: Loading rules...");
    let rules = match &args.rules_path {
        Some(path) => Rules::from_path(path)
            .with_context(|| format!("Failed to load rules from {}", path.display()))?,
        None => Rules::builtin().context("Failed to load built-in rules")?,
    };

    // Step 2: Models
    info!("Step 2/4: Reading {}...", MAPFILE_NAME);
    let client = SourceClient::new().context("Failed to create source client")?;
    let mapfile_url = format!("{}/{}", args.basepath, MAPFILE_NAME);
    let text = client
        .fetch_text(&mapfile_url)
        .with_context(|| format!("Failed to fetch {}", mapfile_url))?;
    let models: Vec<Model> = parse_mapfile(&text, &args.basepath, |url| client.exists(url))
        .context("Failed to parse mapfile.csv")?
        .into_iter()
        .filter(|m| args.wants(&m.shortname))
        .collect();
    for model in &models {
        debug!("Parsed model:\n{}", model);
    }

    // Step 3: perf mapfile
    info!("Step 3/4: Writing {}...", MAPFILE_NAME);
    let mapfile_path = args.outdir.join(MAPFILE_NAME);
    write_mapfile(&models, &mapfile_path).context("Failed to write mapfile.csv")?;
    info!("✓ Mapfile written to: {}", mapfile_path.display());

    // Step 4: per model output
    info!("Step 4/4: Writing {} models...", models.len());
    let mut summary = GenerateSummary {
        models: models.len(),
        ..Default::default()
    };
    for model in &models {
        match generate_model(&client, &rules, model, &args.outdir) {
            Ok((event_files, metrics)) => {
                summary.event_files += event_files;
                summary.metrics += metrics;
            }
            Err(err) => {
                warn!("Skipping {}: {:#}", model.shortname, err);
                summary.failed.push(model.shortname.clone());
            }
        }
    }

    info!(
        "Generated {} event files and {} metrics for {} models in {:.2}s",
        summary.event_files,
        summary.metrics,
        summary.models - summary.failed.len(),
        start_time.elapsed().as_secs_f64()
    );
    Ok(summary)
}

/// Write the event and metric files of one model
///
/// **Private** - internal helper for execute_generate
///
/// # Returns
/// Number of event files and metrics written
fn generate_model(
    client: &SourceClient,
    rules: &Rules,
    model: &Model,
    outdir: &Path,
) -> Result<(usize, usize)> {
    let modeldir = outdir.join(&model.longname);
    info!("Creating event json for {} in {}", model.shortname, modeldir.display());

    let events = load_events(client, model)?;
    let event_files = write_events(&modeldir, &events.topics)
        .with_context(|| format!("Failed to write events for {}", model.shortname))?;

    let extra = load_extra_metrics(client, model);
    let mut metrics: Vec<Metric> = Vec::new();
    for (key, hybrid_pmu) in METRIC_TABLES {
        let Some(url) = model.files.get(*key) else {
            continue;
        };
        let pmu = if model.has_file("atom") { *hybrid_pmu } else { "cpu" };
        let table = client
            .fetch_text(url)
            .with_context(|| format!("Failed to fetch {}", url))?;

        let ctx = ExtractContext {
            rules,
            catalog: &events.catalog,
            shortname: &model.shortname,
            pmu,
        };
        // Extra metrics belong to the main table only.
        let table_extra: &[ExtraMetric] = if *key == FILE_TMA_METRICS { &extra } else { &[] };
        let extraction = extract_metrics(&table, table_extra, &ctx);
        for diagnostic in &extraction.diagnostics {
            diagnostic.log();
        }
        debug!("{}: {} metrics from {}", model.shortname, extraction.metrics.len(), key);
        metrics.extend(extraction.metrics);
    }

    if metrics.is_empty() {
        debug!("No metrics for {}", model.shortname);
        return Ok((event_files, 0));
    }

    metrics.extend(cstate_metrics(rules, &model.shortname));
    let path = write_metrics(&modeldir, &model.shortname, &metrics)
        .with_context(|| format!("Failed to write metrics for {}", model.shortname))?;
    info!("✓ Metrics written to: {}", path.display());

    Ok((event_files, metrics.len()))
}

/// Read a model's event files and apply its uncore CSV
///
/// **Private** - internal helper for generate_model
fn load_events(client: &SourceClient, model: &Model) -> Result<ArchEvents> {
    let mut events = ArchEvents::new();
    let hybrid = model.is_hybrid();

    for kind in EVENT_FILE_TYPES {
        let Some(url) = model.files.get(*kind) else {
            continue;
        };
        let text = client
            .fetch_text(url)
            .with_context(|| format!("Failed to fetch {}", url))?;
        let added = events
            .add_file(kind, url, &text, hybrid)
            .with_context(|| format!("Failed to read events from {}", url))?;
        debug!("{}: {} {} events", model.shortname, added, kind);
    }

    if let Some(url) = model.files.get(FILE_UNCORE_CSV) {
        match client.fetch_text(url) {
            Ok(text) => {
                let rewritten = apply_uncore_csv(&mut events, &text)
                    .with_context(|| format!("Failed to apply {}", url))?;
                debug!("{}: {} uncore rows applied", model.shortname, rewritten);
            }
            Err(err) => warn!("Ignoring uncore csv {}: {}", url, err),
        }
    }

    Ok(events)
}

/// Read a model's extra metrics; an unreadable file counts as absent
///
/// **Private** - internal helper for generate_model
fn load_extra_metrics(client: &SourceClient, model: &Model) -> Vec<ExtraMetric> {
    let Some(url) = model.files.get(FILE_EXTRA_METRICS) else {
        return Vec::new();
    };

    let parsed = client
        .fetch_text(url)
        .map_err(anyhow::Error::from)
        .and_then(|text| Ok(serde_json::from_str::<Vec<ExtraMetric>>(&text)?));

    match parsed {
        Ok(extra) => extra,
        Err(err) => {
            warn!("Ignoring extra metrics {}: {:#}", url, err);
            Vec::new()
        }
    }
}

/// Validate generate arguments
///
/// **Public** - can be called before execute_generate for early validation
///
/// # Arguments
/// * `args` - Arguments to validate
///
/// # Returns
/// Ok if arguments are valid, Err with message if not
pub fn validate_args(args: &GenerateArgs) -> Result<()> {
    if args.basepath.is_empty() {
        anyhow::bail!("Base path cannot be empty");
    }

    if args.outdir.as_os_str().is_empty() {
        anyhow::bail!("Output directory cannot be empty");
    }

    if args.outdir.is_file() {
        anyhow::bail!("Output directory is a file: {}", args.outdir.display());
    }

    if let Some(path) = &args.rules_path {
        if !path.is_file() {
            anyhow::bail!("Rules file not found: {}", path.display());
        }
    }

    if let Some(bad) = args.archs.iter().find(|a| a.trim().is_empty()) {
        anyhow::bail!("Architecture filter cannot be empty: '{}'", bad);
    }

    Ok(())
}
