use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sparkify_core::{Config, Report, Severity};
use sparkify_sql::{CatalogChecker, Phase, QueryCatalog};
use sparkify_warehouse::{EtlPipeline, MemoryWarehouse, RunMode, RunReport};

const DEFAULT_CONFIG: &str = "dwh.toml";

/// Sparkify - star schema ETL for the song play warehouse
#[derive(Parser)]
#[command(name = "sparkify")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: dwh.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the SQL script for one phase or the whole run
    Script {
        /// drop, create, copy or insert (default: all phases)
        #[arg(short, long)]
        phase: Option<Phase>,

        /// Write the script to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check statement order and form
    Check {
        /// Output file for the JSON report
        #[arg(short, long, default_value = "report.json")]
        output: PathBuf,
    },

    /// Run the pipeline against an in-memory warehouse fed from local JSON
    Simulate {
        /// Directory mounted at S3.LOG_DATA
        #[arg(long)]
        log_dir: PathBuf,

        /// Directory mounted at S3.SONG_DATA
        #[arg(long)]
        song_dir: PathBuf,

        /// File mounted at S3.LOG_JSONPATH
        #[arg(long)]
        jsonpaths: PathBuf,

        /// full, reset, load or incremental
        #[arg(short, long, default_value = "full")]
        mode: RunMode,

        /// Number of consecutive runs
        #[arg(long, default_value_t = 1)]
        runs: usize,

        /// Output file for the last run report
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref(), cli.verbose)?;
    let catalog = QueryCatalog::build(&config);

    match cli.command {
        Commands::Script { phase, output } => script_command(&catalog, phase, output.as_deref(), cli.verbose),
        Commands::Check { output } => check_command(&catalog, &output, cli.verbose),
        Commands::Simulate {
            log_dir,
            song_dir,
            jsonpaths,
            mode,
            runs,
            output,
        } => {
            let sources = LocalSources {
                log_dir,
                song_dir,
                jsonpaths,
            };
            simulate_command(&config, catalog, &sources, mode, runs, output.as_deref()).await
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Load the config file, apply environment overrides, then validate
fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(path)?,
        None if Path::new(DEFAULT_CONFIG).exists() => Config::from_file(Path::new(DEFAULT_CONFIG))?,
        None => {
            if verbose {
                eprintln!("{}", "No config file found, using defaults".yellow());
            }
            Config::default()
        }
    };

    config.apply_env_overrides();
    config.validate().context("Invalid configuration")?;

    if verbose {
        for (label, value) in describe_sources(&config) {
            eprintln!("{} {}", label.cyan(), value);
        }
    }

    Ok(config)
}

/// Labelled object storage locations read by the COPY statements
fn describe_sources(config: &Config) -> [(&'static str, &str); 4] {
    [
        ("Event logs:", config.s3.log_data.as_str()),
        ("Event JSONPaths:", config.s3.log_jsonpath.as_str()),
        ("Song data:", config.s3.song_data.as_str()),
        ("Region:", config.s3.region.as_str()),
    ]
}

/// Script command - render SQL
fn script_command(catalog: &QueryCatalog, phase: Option<Phase>, output: Option<&Path>, verbose: bool) -> Result<()> {
    let phases = match phase {
        Some(phase) => vec![phase],
        None => Phase::ORDER.to_vec(),
    };
    let script = catalog.to_script(&phases);

    match output {
        Some(path) => {
            std::fs::write(path, &script).with_context(|| format!("Failed to write {}", path.display()))?;
            if verbose {
                eprintln!("{} {}", "Script saved to:".green(), path.display());
            }
        }
        None => print!("{}", script),
    }

    Ok(())
}

/// Check command - lint the catalog
fn check_command(catalog: &QueryCatalog, output: &Path, verbose: bool) -> Result<()> {
    if verbose {
        eprintln!("{}", "Checking query catalog...".cyan());
    }

    let report = CatalogChecker::new().report(catalog);
    report.save_to_file(output)?;

    if verbose {
        eprintln!("{} {}", "Report saved to:".green(), output.display());
    }

    print_report_summary(&report);

    if report.has_errors() {
        std::process::exit(1);
    }

    Ok(())
}

/// Local directories standing in for the configured object storage
struct LocalSources {
    log_dir: PathBuf,
    song_dir: PathBuf,
    jsonpaths: PathBuf,
}

/// Simulate command - run the pipeline in memory
async fn simulate_command(
    config: &Config,
    catalog: QueryCatalog,
    sources: &LocalSources,
    mode: RunMode,
    runs: usize,
    output: Option<&Path>,
) -> Result<()> {
    let warehouse = MemoryWarehouse::new();

    let jsonpaths = std::fs::read_to_string(&sources.jsonpaths)
        .with_context(|| format!("Failed to read {}", sources.jsonpaths.display()))?;
    warehouse.put_object(config.s3.log_jsonpath.clone(), jsonpaths).await;

    let mut mounted = 0;
    for (dir, prefix) in [
        (&sources.log_dir, &config.s3.log_data),
        (&sources.song_dir, &config.s3.song_data),
    ] {
        for (uri, body) in collect_objects(dir, prefix)? {
            tracing::debug!(uri = %uri, "Mounted object");
            warehouse.put_object(uri, body).await;
            mounted += 1;
        }
    }
    eprintln!("{} {} objects", "Mounted".cyan(), mounted);

    let pipeline = EtlPipeline::new(catalog);
    let mut last = None;
    for run in 1..=runs {
        let report = pipeline.run(&warehouse, mode).await?;
        print_run_report(run, &report);
        last = Some(report);
    }

    print_table_counts(&warehouse).await;

    if let (Some(path), Some(report)) = (output, last) {
        std::fs::write(path, report.to_json()?)?;
        eprintln!("{} {}", "Run report saved to:".green(), path.display());
    }

    Ok(())
}

/// Read every `.json` file under `dir` keyed by `prefix/<relative path>`
fn collect_objects(dir: &Path, prefix: &str) -> Result<Vec<(String, String)>> {
    let mut objects = Vec::new();

    for entry in walkdir::WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }

        let relative = path.strip_prefix(dir)?;
        let key: Vec<String> = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let uri = format!("{}/{}", prefix.trim_end_matches('/'), key.join("/"));

        let body = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
        objects.push((uri, body));
    }

    Ok(objects)
}

fn print_report_summary(report: &Report) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Query Catalog Check Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("Version: {}", report.version);
    println!("Timestamp: {}", report.timestamp);
    if let Some(fingerprint) = &report.fingerprint {
        println!("Catalog: {}", fingerprint);
    }
    println!();

    println!("{}", "Summary:".bold());
    println!("  Statements checked: {}", report.summary.statements_checked);
    println!("  Total diagnostics:  {}", report.summary.total);

    if report.summary.errors > 0 {
        println!("  Errors:   {}", format!("{}", report.summary.errors).red().bold());
    } else {
        println!("  Errors:   {}", format!("{}", report.summary.errors).green());
    }

    if report.summary.warnings > 0 {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).yellow());
    } else {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).green());
    }

    println!("  Info:     {}", report.summary.info);
    println!();

    if report.diagnostics.is_empty() {
        println!("{}", "✓ No issues found!".green().bold());
        return;
    }

    println!("{}", "Diagnostics:".bold());
    for diag in &report.diagnostics {
        let severity_str = match diag.severity {
            Severity::Error => "ERROR".red().bold(),
            Severity::Warn => "WARN".yellow().bold(),
            Severity::Info => "INFO".cyan(),
        };

        println!("  [{}] {}: {}", severity_str, diag.code, diag.message);

        if let Some(loc) = &diag.location {
            println!("    at {}", loc);
        }
        if let Some(exp) = &diag.expected {
            println!("    Expected: {}", exp);
        }
        if let Some(act) = &diag.actual {
            println!("    Actual:   {}", act);
        }
    }
}

fn print_run_report(run: usize, report: &RunReport) {
    println!(
        "\n{} {} ({} mode, {} statements)",
        "Run".bold().bright_blue(),
        run,
        report.mode,
        report.steps.len()
    );

    for step in &report.steps {
        if matches!(step.phase, Phase::Copy | Phase::Insert) {
            println!(
                "  {:<28} {:>8} rows  {:>5} ms",
                step.label,
                step.rows_affected.to_string().green(),
                step.elapsed_ms
            );
        }
    }
}

async fn print_table_counts(warehouse: &MemoryWarehouse) {
    println!("\n{}", "Table row counts:".bold());
    for table in sparkify_core::schema::warehouse_tables() {
        match warehouse.row_count(&table.name).await {
            Some(count) => println!("  {:<16} {}", table.name, count),
            None => println!("  {:<16} {}", table.name, "absent".yellow()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objects_are_keyed_under_the_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("2018").join("11");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("2018-11-12-events.json"), "{}").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "skip").unwrap();

        let objects = collect_objects(dir.path(), "s3://bucket/log_data/").unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].0, "s3://bucket/log_data/2018/11/2018-11-12-events.json");
        assert_eq!(objects[0].1, "{}");
    }

    #[test]
    fn sources_are_labelled_distinctly() {
        let config = Config::default();
        let sources = describe_sources(&config);

        let labels: std::collections::HashSet<&str> = sources.iter().map(|(label, _)| *label).collect();
        assert_eq!(labels.len(), sources.len());
        assert!(sources.contains(&("Event logs:", config.s3.log_data.as_str())));
        assert!(sources.contains(&("Song data:", config.s3.song_data.as_str())));
    }

    #[test]
    fn cli_parses_simulate() {
        let cli = Cli::try_parse_from([
            "sparkify",
            "simulate",
            "--log-dir",
            "data/log_data",
            "--song-dir",
            "data/song_data",
            "--jsonpaths",
            "data/log_json_path.json",
            "--mode",
            "incremental",
            "--runs",
            "2",
        ])
        .unwrap();

        match cli.command {
            Commands::Simulate { mode, runs, .. } => {
                assert_eq!(mode, RunMode::Incremental);
                assert_eq!(runs, 2);
            }
            _ => panic!("expected simulate"),
        }
    }

    #[test]
    fn cli_parses_script_phase() {
        let cli = Cli::try_parse_from(["sparkify", "script", "--phase", "copy"]).unwrap();
        assert!(matches!(cli.command, Commands::Script { phase: Some(Phase::Copy), .. }));
    }
}
