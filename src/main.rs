use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use medical_warehouse_rust::config::AppConfig;
use medical_warehouse_rust::loader::{load_detection_csv, load_message_lake};
use medical_warehouse_rust::logging::{init_logging, OperationTimer};
use medical_warehouse_rust::quality::run_quality_checks;
use medical_warehouse_rust::validation::InputValidator;
use medical_warehouse_rust::{PipelineRunner, Warehouse};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load scraper JSON exports from the data lake into the raw layer
    LoadMessages {
        /// Root of the date-partitioned exports (defaults to configuration)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Load a single date partition (YYYY-MM-DD)
        #[arg(long)]
        date: Option<String>,
    },
    /// Load detector results from CSV into the raw layer
    LoadDetections {
        /// Path to the detector CSV export (defaults to configuration)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Run the full transform pipeline
    Run,
    /// Run the data quality checks without transforming
    Check,
    /// Write a YAML data-quality report
    Report {
        /// Report destination
        #[arg(short, long, default_value = "reports/data_quality_report.yaml")]
        output: PathBuf,
    },
    /// Show warehouse row counts
    Stats,
}

fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;

    // Initialize logging; the guard must outlive all logging calls
    let _log_guard = init_logging(
        Some(&config.logging.level),
        config.logging.file_path.as_deref().map(std::path::Path::new),
    )?;

    info!("Starting medical-warehouse application");

    // Parse command line arguments
    let cli = Cli::parse();

    InputValidator::validate_database_url(&config.database.url)?;
    let warehouse = Warehouse::new(&config.database.url)?;

    match &cli.command {
        Commands::LoadMessages { data_dir, date } => {
            load_messages(&config, &warehouse, data_dir.as_deref(), date.as_deref())?;
        }
        Commands::LoadDetections { file } => {
            load_detections(&config, &warehouse, file.as_deref())?;
        }
        Commands::Run => run_pipeline(&config, &warehouse)?,
        Commands::Check => check_quality(&config, &warehouse)?,
        Commands::Report { output } => write_report(&config, &warehouse, output)?,
        Commands::Stats => show_stats(&warehouse)?,
    }

    Ok(())
}

/// Load scraper JSON exports into the raw layer
fn load_messages(
    config: &AppConfig,
    warehouse: &Warehouse,
    data_dir: Option<&std::path::Path>,
    date: Option<&str>,
) -> Result<()> {
    let effective_dir = data_dir
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&config.lake.messages_dir));
    let partition_date = date
        .map(InputValidator::validate_partition_date)
        .transpose()?;

    let timer = OperationTimer::new("load_messages");
    let summary = load_message_lake(warehouse, &effective_dir, partition_date)?;
    timer.finish();

    info!(
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        skipped = summary.skipped,
        "Message load complete"
    );
    Ok(())
}

/// Load detector CSV results into the raw layer
fn load_detections(
    config: &AppConfig,
    warehouse: &Warehouse,
    file: Option<&std::path::Path>,
) -> Result<()> {
    let effective_file = file
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&config.lake.detections_csv));
    InputValidator::validate_file_path(&effective_file)?;

    let timer = OperationTimer::new("load_detections");
    let summary = load_detection_csv(warehouse, &effective_file)?;
    timer.finish();

    info!(
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        skipped = summary.skipped,
        "Detection load complete"
    );
    Ok(())
}

/// Run the full transform pipeline
fn run_pipeline(config: &AppConfig, warehouse: &Warehouse) -> Result<()> {
    let runner =
        PipelineRunner::new(warehouse).with_future_grace_hours(config.quality.future_grace_hours);
    let report = runner.run()?;

    info!(
        staged = report.staged,
        dropped = report.dropped,
        channels = report.channels,
        facts_inserted = report.facts_inserted,
        facts_replaced = report.facts_replaced,
        detection_facts = report.detection_facts,
        "Pipeline complete"
    );
    Ok(())
}

/// Run the quality suite against the current warehouse contents
fn check_quality(config: &AppConfig, warehouse: &Warehouse) -> Result<()> {
    let facts = warehouse.fetch_message_facts()?;
    let channels = warehouse.fetch_channel_dimensions()?;
    let dates = warehouse.fetch_date_dimensions()?;

    let report = run_quality_checks(
        warehouse,
        &facts,
        &channels,
        &dates,
        config.quality.future_grace_hours,
    )?;

    for check in &report.checks {
        if check.passed() {
            info!(check = check.name, "PASS");
        } else {
            warn!(
                check = check.name,
                failures = check.failures,
                detail = check.detail.as_deref().unwrap_or(""),
                "FAIL"
            );
        }
    }

    if report.passed() {
        info!("All quality checks passed");
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "quality checks failed: {}",
            report.failed_checks().join(", ")
        ))
    }
}

/// Serializable envelope for the YAML quality report
#[derive(serde::Serialize)]
struct ReportDocument {
    generated_at: String,
    row_counts: std::collections::BTreeMap<&'static str, i64>,
    checks: Vec<medical_warehouse_rust::quality::CheckResult>,
    passed: bool,
}

/// Write a YAML data-quality report
fn write_report(config: &AppConfig, warehouse: &Warehouse, output: &std::path::Path) -> Result<()> {
    let facts = warehouse.fetch_message_facts()?;
    let channels = warehouse.fetch_channel_dimensions()?;
    let dates = warehouse.fetch_date_dimensions()?;
    let report = run_quality_checks(
        warehouse,
        &facts,
        &channels,
        &dates,
        config.quality.future_grace_hours,
    )?;
    let stats = warehouse.stats()?;

    let mut row_counts = std::collections::BTreeMap::new();
    row_counts.insert("raw_telegram_messages", stats.raw_messages);
    row_counts.insert("raw_image_detections", stats.raw_detections);
    row_counts.insert("dim_channels", stats.channels);
    row_counts.insert("dim_dates", stats.dates);
    row_counts.insert("fct_messages", stats.message_facts);
    row_counts.insert("fct_image_detections", stats.detection_facts);

    let document = ReportDocument {
        generated_at: chrono::Utc::now().to_rfc3339(),
        row_counts,
        passed: report.passed(),
        checks: report.checks,
    };

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(output, serde_yaml::to_string(&document)?)?;

    info!(output = %output.display(), passed = document.passed, "Quality report written");
    Ok(())
}

/// Print warehouse row counts
#[allow(clippy::print_stdout)]
fn show_stats(warehouse: &Warehouse) -> Result<()> {
    let stats = warehouse.stats()?;
    println!("raw_telegram_messages  {}", stats.raw_messages);
    println!("raw_image_detections   {}", stats.raw_detections);
    println!("dim_channels           {}", stats.channels);
    println!("dim_dates              {}", stats.dates);
    println!("fct_messages           {}", stats.message_facts);
    println!("fct_image_detections   {}", stats.detection_facts);
    Ok(())
}
