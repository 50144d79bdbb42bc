//! Serializable summary of a fill run.
//!
//! Used for JSON output to stdout (`--json` CLI flag), for the report file
//! written next to the filled table, and for programmatic access.

use crate::config::FillMethod;
use crate::error::{Result, ResultExt};
use crate::pipeline::FillResult;
use crate::provenance::{DonorTrail, UnfilledReason};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Run summary for the CLI and library callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillReport {
    // Metadata
    /// Timestamp when the report was generated
    pub generated_at: String,
    /// Path to the observation table
    pub input_file: Option<String>,
    /// Path to the station table
    pub stations_file: Option<String>,
    /// Path to the filled table (if written)
    pub output_file: Option<String>,
    /// Path to the provenance log (if written)
    pub log_file: Option<String>,

    // Parameters
    pub method: FillMethod,
    pub distance_threshold: f64,
    pub max_donors: usize,

    // Counts
    /// Total execution time in milliseconds
    pub duration_ms: u64,
    pub timestamps: usize,
    pub stations: usize,
    pub missing_cells: usize,
    pub filled_cells: usize,
    pub unfilled_cells: usize,
    /// Share of missing cells that were filled (0.0-1.0)
    pub fill_rate: f32,
    /// Unfilled cells grouped by reason
    pub unfilled_reasons: Vec<ReasonCount>,
    /// Stations left out of the donor network for lack of geometry
    pub excluded_stations: Vec<String>,

    /// Per-station breakdown, in column order
    pub station_summaries: Vec<StationFillSummary>,
}

/// Number of unfilled cells for one reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasonCount {
    pub reason: UnfilledReason,
    pub count: usize,
}

/// Fill outcome of one station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationFillSummary {
    pub station: String,
    /// Whether the station had a usable geometry
    pub located: bool,
    /// Present values in the input
    pub valid: usize,
    /// Missing values in the input
    pub missing: usize,
    pub filled: usize,
    pub unfilled: usize,
    /// Mean of the original series
    pub mean: Option<f64>,
    /// Sample standard deviation of the original series
    pub std: Option<f64>,
}

impl FillReport {
    /// Summarize a completed run.
    pub fn from_result(result: &FillResult) -> Self {
        let matrix = &result.filled;

        let mut per_station: HashMap<&str, (usize, usize)> = HashMap::new();
        let mut reasons: Vec<ReasonCount> = Vec::new();
        for entry in result.record.entries() {
            let counts = per_station.entry(entry.cell.station.as_str()).or_default();
            match &entry.trail {
                DonorTrail::Filled { .. } => counts.0 += 1,
                DonorTrail::Unfilled { reason } => {
                    counts.1 += 1;
                    match reasons.iter_mut().find(|r| r.reason == *reason) {
                        Some(existing) => existing.count += 1,
                        None => reasons.push(ReasonCount {
                            reason: *reason,
                            count: 1,
                        }),
                    }
                }
            }
        }

        let station_summaries = matrix
            .stations()
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let (filled, unfilled) = per_station.get(name.as_str()).copied().unwrap_or_default();
                let stats = result.statistics.get(idx);
                StationFillSummary {
                    station: name.clone(),
                    located: !result.excluded_stations.contains(name),
                    valid: stats.map_or(0, |s| s.valid_count),
                    missing: result.original_missing.count_for_station(idx),
                    filled,
                    unfilled,
                    mean: stats.and_then(|s| s.mean),
                    std: stats.and_then(|s| s.std),
                }
            })
            .collect();

        let missing_cells = result.original_missing.count();
        let filled_cells = result.record.filled_count();
        Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            input_file: None,
            stations_file: None,
            output_file: None,
            log_file: None,
            method: result.config.method,
            distance_threshold: result.config.distance_threshold,
            max_donors: result.config.max_donors,
            duration_ms: result.duration_ms,
            timestamps: matrix.n_timestamps(),
            stations: matrix.n_stations(),
            missing_cells,
            filled_cells,
            unfilled_cells: result.record.unfilled_count(),
            fill_rate: if missing_cells > 0 {
                filled_cells as f32 / missing_cells as f32
            } else {
                1.0
            },
            unfilled_reasons: reasons,
            excluded_stations: result.excluded_stations.clone(),
            station_summaries,
        }
    }

    /// Record the input files the run was loaded from.
    pub fn with_inputs(mut self, observations: impl AsRef<Path>, stations: impl AsRef<Path>) -> Self {
        self.input_file = Some(observations.as_ref().display().to_string());
        self.stations_file = Some(stations.as_ref().display().to_string());
        self
    }

    /// Record where the filled table and its log were written.
    pub fn with_outputs(mut self, table: impl AsRef<Path>, log: impl AsRef<Path>) -> Self {
        self.output_file = Some(table.as_ref().display().to_string());
        self.log_file = Some(log.as_ref().display().to_string());
        self
    }

    /// Write the report as pretty JSON to `<stem>_report.json` next to
    /// `table_path`.
    pub fn write_next_to(&self, table_path: impl AsRef<Path>) -> Result<PathBuf> {
        let table_path = table_path.as_ref();
        let stem = table_path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "filled".to_string());
        let report_path = table_path.with_file_name(format!("{}_report.json", stem));

        let mut file =
            File::create(&report_path).context(format!("Could not create {}", report_path.display()))?;
        file.write_all(serde_json::to_string_pretty(self)?.as_bytes())?;

        info!("Report saved: {}", report_path.display());
        Ok(report_path)
    }
}
