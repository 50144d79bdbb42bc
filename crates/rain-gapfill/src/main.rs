//! CLI entry point for the rain gauge gap filler.

use anyhow::{Result, anyhow};
use clap::{Parser, ValueEnum};
use dotenv::dotenv;
use rain_gapfill::io::{read_observations, read_stations, write_outputs};
use rain_gapfill::{
    FillConfig, FillMethod, FillReport, FillRequest, GapFiller, ObservationMatrix, Station,
};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// CLI-compatible fill method enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliFillMethod {
    /// Donor values scaled by the ratio of long-run means
    MeanRatio,
    /// Standardized donor anomalies weighted by correlation
    Correlation,
    /// Donor values weighted by normalized inverse distance
    InverseDistance,
}

impl From<CliFillMethod> for FillMethod {
    fn from(cli: CliFillMethod) -> Self {
        match cli {
            CliFillMethod::MeanRatio => FillMethod::MeanRatio,
            CliFillMethod::Correlation => FillMethod::Correlation,
            CliFillMethod::InverseDistance => FillMethod::InverseDistance,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Rain gauge gap filling from neighbouring stations",
    long_about = "Fills missing rain gauge observations using correlated, nearby stations.\n\n\
                  EXAMPLES:\n  \
                  # Show network size and the suggested threshold range\n  \
                  rain-gapfill -d rain.csv -s gauges.csv --inspect\n\n  \
                  # Inverse distance weighting with up to 3 donors within 25 km\n  \
                  rain-gapfill -d rain.csv -s gauges.csv --threshold 25000 --max-donors 3\n\n  \
                  # Correlation method, JSON summary for other tools\n  \
                  rain-gapfill -d rain.csv -s gauges.csv --threshold 25000 --method correlation --json"
)]
struct Args {
    /// Observation table: one timestamp column, one column per station
    #[arg(short, long)]
    data: PathBuf,

    /// Station table: join-key column and projected coordinates
    #[arg(short, long)]
    stations: PathBuf,

    /// Timestamp column of the observation table (default: first column)
    #[arg(long)]
    date_column: Option<String>,

    /// Station table column matched against observation column names
    #[arg(long, default_value = "code")]
    code_column: String,

    /// Station table column holding the projected easting
    #[arg(long, default_value = "x")]
    x_column: String,

    /// Station table column holding the projected northing
    #[arg(long, default_value = "y")]
    y_column: String,

    /// Maximum donor distance, in the projection's units
    #[arg(short, long, default_value = "0")]
    threshold: f64,

    /// Maximum number of donors per missing cell
    #[arg(short = 'k', long, default_value = "1")]
    max_donors: usize,

    /// Interpolation formula
    #[arg(short, long, value_enum, default_value = "inverse-distance")]
    method: CliFillMethod,

    /// Numeric sentinel marking a missing observation (e.g. -9999)
    #[arg(long, allow_hyphen_values = true)]
    missing_value: Option<f64>,

    /// Path of the filled table
    ///
    /// Defaults to "<data>_filled.csv" next to the observation table.
    /// The provenance log is written next to it with a ".log" extension.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print network size and distance range, then exit without filling
    #[arg(long)]
    inspect: bool,

    /// Build correlations and resolve stations on a single thread
    #[arg(long)]
    sequential: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all progress logs; only outputs the final JSON report.
    #[arg(long)]
    json: bool,

    /// Write a JSON report next to the filled table
    ///
    /// The report will be saved as <output_name>_report.json
    #[arg(short = 'r', long)]
    emit_report: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    dotenv().ok();

    for path in [&args.data, &args.stations] {
        if !path.exists() {
            return Err(anyhow!("Input file not found: {}", path.display()));
        }
    }

    let mut config_builder = FillConfig::builder()
        .distance_threshold(args.threshold)
        .max_donors(args.max_donors)
        .method(args.method.into())
        .code_column(&args.code_column)
        .coordinate_columns(&args.x_column, &args.y_column)
        .parallel(!args.sequential);

    if let Some(ref column) = args.date_column {
        config_builder = config_builder.date_column(column);
    }
    if let Some(sentinel) = args.missing_value {
        config_builder = config_builder.missing_value(sentinel);
    }

    let config = config_builder.build()?;

    info!("Loading observations from: {}", args.data.display());
    let observations = read_observations(&args.data, &config)?;
    info!("Loading stations from: {}", args.stations.display());
    let stations = read_stations(&args.stations, &config)?;

    if args.inspect {
        return run_inspect(&args, &observations, &stations);
    }

    if config.distance_threshold == 0.0 {
        warn!("Distance threshold is 0: only co-located stations can donate");
    }

    let filler = build_filler(&args);
    let request = FillRequest::new(observations, stations, config);

    let result = filler.run(&request).map_err(|e| {
        error!("Gap filling failed: {}", e);
        anyhow!("Gap filling failed: {}", e)
    })?;

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output_path(&args.data));
    let log_path = write_outputs(&result, &output)?;

    let report = FillReport::from_result(&result)
        .with_inputs(&args.data, &args.stations)
        .with_outputs(&output, &log_path);

    if args.emit_report {
        let report_path = report.write_next_to(&output)?;
        info!("Report written to: {}", report_path.display());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_human_readable_summary(&report);
    Ok(())
}

fn build_filler(args: &Args) -> GapFiller {
    let mut builder = GapFiller::builder();
    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }
    builder.build()
}

/// `<stem>_filled.csv` next to the observation table.
fn default_output_path(data: &Path) -> PathBuf {
    let stem = data
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    data.with_file_name(format!("{}_filled.csv", stem))
}

/// Show the network the fill would run on.
///
/// Uses `println!` intentionally: this is the primary output of `--inspect`
/// and must be visible regardless of log level.
fn run_inspect(args: &Args, observations: &ObservationMatrix, stations: &[Station]) -> Result<()> {
    let prepared =
        GapFiller::default().prepare_with(observations, stations, !args.sequential)?;
    let distance = prepared.distance();

    println!("\n{}", "=".repeat(80));
    println!("NETWORK INSPECTION");
    println!("{}\n", "=".repeat(80));

    println!("  Observations: {}", args.data.display());
    println!("  Stations:     {}", args.stations.display());
    println!(
        "  Timestamps: {}  Stations: {}  Missing cells: {}",
        observations.n_timestamps(),
        observations.n_stations(),
        observations.missing_count()
    );
    println!("  Located stations: {}", prepared.network().len());
    println!();

    println!("PARAMETER RANGES");
    println!("{}", "-".repeat(40));
    println!("  Max donors: 1 - {}", observations.n_stations());
    println!(
        "  Threshold:  0 - {:.0} (largest distance {:.1})",
        distance.suggested_threshold_ceiling(),
        distance.max_distance()
    );
    println!();

    let unlocated = prepared.network().unlocated();
    if !unlocated.is_empty() {
        println!("STATIONS WITHOUT GEOMETRY (never filled, never donors)");
        println!("{}", "-".repeat(40));
        for code in unlocated {
            println!("  - {}", code);
        }
        println!();
    }

    println!("STATION STATISTICS");
    println!("{}", "-".repeat(40));
    println!("{:<20} {:>8} {:>8} {:>12} {:>12}", "Station", "Valid", "Missing", "Mean", "Std");
    println!("{}", "-".repeat(64));
    for (name, stats) in observations.stations().iter().zip(prepared.statistics()) {
        println!(
            "{:<20} {:>8} {:>8} {:>12} {:>12}",
            truncate_str(name, 19),
            stats.valid_count,
            stats.missing_count,
            format_optional(stats.mean),
            format_optional(stats.std)
        );
    }
    println!();
    println!("{}", "=".repeat(80));

    Ok(())
}

fn format_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.3}", v))
}

/// Truncate a string to max length with ellipsis
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

/// Print a human-readable summary of the fill run.
fn print_human_readable_summary(report: &FillReport) {
    println!();
    println!("{}", "=".repeat(80));
    println!("GAP FILLING COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    if let Some(ref input) = report.input_file {
        println!(
            "Input:  {} ({} timestamps x {} stations)",
            input, report.timestamps, report.stations
        );
    }
    if let Some(ref output) = report.output_file {
        println!("Output: {}", output);
    }
    if let Some(ref log) = report.log_file {
        println!("Log:    {}", log);
    }
    println!();

    println!("Parameters:");
    println!("  Method: {}", report.method.display_name());
    println!("  Distance threshold: {}", report.distance_threshold);
    println!("  Max donors: {}", report.max_donors);
    println!();

    println!("Fill Summary:");
    println!("  Duration: {}ms", report.duration_ms);
    println!("  Missing cells: {}", report.missing_cells);
    println!(
        "  Filled: {} ({:.1}%)",
        report.filled_cells,
        report.fill_rate * 100.0
    );
    println!("  Not filled: {}", report.unfilled_cells);
    for reason in &report.unfilled_reasons {
        println!("    - {}: {}", reason.reason.description(), reason.count);
    }
    println!();

    if !report.excluded_stations.is_empty() {
        println!(
            "Stations without geometry: {}",
            report.excluded_stations.join(", ")
        );
        println!();
    }

    println!("{}", "=".repeat(80));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_path() {
        assert_eq!(
            default_output_path(Path::new("data/rain.csv")),
            PathBuf::from("data/rain_filled.csv")
        );
    }

    #[test]
    fn test_truncate_str() {
        assert_eq!(truncate_str("short", 10), "short");
        assert_eq!(truncate_str("a_very_long_station_name", 10), "a_very_...");
    }

    #[test]
    fn test_cli_method_mapping() {
        assert_eq!(FillMethod::from(CliFillMethod::MeanRatio), FillMethod::MeanRatio);
        assert_eq!(
            FillMethod::from(CliFillMethod::InverseDistance),
            FillMethod::InverseDistance
        );
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "rain-gapfill",
            "-d",
            "rain.csv",
            "-s",
            "gauges.csv",
            "--threshold",
            "25000",
            "-k",
            "3",
            "--method",
            "correlation",
            "--missing-value",
            "-9999",
        ])
        .unwrap();
        assert_eq!(args.threshold, 25000.0);
        assert_eq!(args.max_donors, 3);
        assert!(matches!(args.method, CliFillMethod::Correlation));
        assert_eq!(args.missing_value, Some(-9999.0));
    }
}
