//! Perfmon Metrics CLI
//!
//! Generates perf JSON event and metric files from a perfmon event
//! repository.

use anyhow::Result;
use clap::{Parser, Subcommand};
use env_logger::Env;
use std::path::PathBuf;

use perfmon_metrics::commands::{
    execute_generate, validate_args, validate_metrics_file, GenerateArgs,
};
use perfmon_metrics::utils::config::DEFAULT_OUTDIR;

/// Perfmon Metrics - perf JSON generation from perfmon sources
#[derive(Parser, Debug)]
#[command(name = "create-perf-json")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Additional output when running (repeat for more)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate perf event and metric JSON
    Generate {
        /// Directory to write output to
        #[arg(long, default_value = DEFAULT_OUTDIR)]
        outdir: PathBuf,

        /// Base directory or URL containing event, metric and other files
        /// (defaults to the parent of the current directory)
        #[arg(long, env = "PERFMON_BASEPATH")]
        basepath: Option<String>,

        /// Only generate these architectures (repeatable)
        #[arg(long = "arch")]
        archs: Vec<String>,

        /// Rules TOML to use instead of the built-in rules
        #[arg(long = "rules")]
        rules_path: Option<PathBuf>,
    },

    /// Validate a generated metrics JSON file
    Validate {
        /// Path to metrics JSON file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Display version information
    Version,
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    // Execute command
    match cli.command {
        Commands::Generate {
            outdir,
            basepath,
            archs,
            rules_path,
        } => {
            let basepath = match basepath {
                Some(basepath) => basepath,
                None => default_basepath()?,
            };

            let args = GenerateArgs {
                outdir,
                basepath,
                archs,
                rules_path,
            };

            // Validate args first
            validate_args(&args)?;

            let summary = execute_generate(args)?;
            if !summary.failed.is_empty() {
                eprintln!("Skipped models: {}", summary.failed.join(", "));
            }
        }

        Commands::Validate { file } => {
            validate_file(file)?;
        }

        Commands::Version => {
            display_version();
        }
    }

    Ok(())
}

/// `file://<cwd>/..`
///
/// **Private** - default for --basepath
fn default_basepath() -> Result<String> {
    let cwd = std::env::current_dir()?;
    Ok(format!("file://{}/..", cwd.display()))
}

/// Validate a metrics JSON file
///
/// **Private** - internal command implementation
fn validate_file(file_path: PathBuf) -> Result<()> {
    println!("Validating metrics: {}", file_path.display());

    let report = validate_metrics_file(&file_path)?;

    println!("✓ Valid metrics JSON");
    println!("  Metrics: {}", report.metrics);
    println!("  Topdown: {}", report.topdown);
    println!("  Groups: {}", report.groups);
    println!("  PMU-scoped: {}", report.with_unit);

    Ok(())
}

/// Display version information
///
/// **Private** - internal command implementation
fn display_version() {
    println!("create-perf-json v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Converts perfmon event files and TMA metric tables into perf JSON.");
}
