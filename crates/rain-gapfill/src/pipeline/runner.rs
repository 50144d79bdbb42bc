//! Fill run orchestration.
//!
//! This module provides the pure [`run_fill`] entry point and the
//! [`GapFiller`] builder that adds progress reporting and cancellation.

use crate::config::FillConfig;
use crate::error::{GapFillError, Result};
use crate::imputers::{DonorSelector, ImputationEngine};
use crate::matrices::ScoreMatrix;
use crate::pipeline::prepared::PreparedNetwork;
use crate::pipeline::progress::{
    CancellationToken, ClosureProgressReporter, FillStage, ProgressReporter, ProgressUpdate,
};
use crate::profiler::StationStatistics;
use crate::provenance::{DonorTrail, FillRecord, UnfilledReason};
use crate::types::{MissingMask, ObservationMatrix, Station};
use rayon::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Everything one fill run needs, passed by value.
#[derive(Debug, Clone)]
pub struct FillRequest {
    pub observations: ObservationMatrix,
    pub stations: Vec<Station>,
    pub config: FillConfig,
}

impl FillRequest {
    pub fn new(observations: ObservationMatrix, stations: Vec<Station>, config: FillConfig) -> Self {
        Self {
            observations,
            stations,
            config,
        }
    }
}

/// Output of a completed fill run.
#[derive(Debug, Clone)]
pub struct FillResult {
    /// Input matrix with every fillable cell replaced by its estimate.
    pub filled: ObservationMatrix,
    /// Cells that were missing in the input.
    pub original_missing: MissingMask,
    /// Donors used (or the unfilled reason) for every originally-missing cell.
    pub record: FillRecord,
    /// Observation columns left out of the network for lack of geometry.
    pub excluded_stations: Vec<String>,
    /// Statistics of the original series, per observation column.
    pub statistics: Vec<StationStatistics>,
    pub config: FillConfig,
    pub duration_ms: u64,
}

impl FillResult {
    pub fn filled_count(&self) -> usize {
        self.record.filled_count()
    }

    pub fn unfilled_count(&self) -> usize {
        self.record.unfilled_count()
    }
}

/// Outcome of one originally-missing cell, produced by a worker.
#[derive(Debug, Clone, PartialEq)]
struct CellOutcome {
    row: usize,
    value: Option<f64>,
    trail: DonorTrail,
}

/// Outcomes of every missing cell of one station, rows ascending.
#[derive(Debug)]
struct StationOutcome {
    column: usize,
    cells: Vec<CellOutcome>,
}

/// Fill every missing cell of a request.
///
/// Pure: the request is not modified and nothing is published anywhere.
///
/// # Example
///
/// ```rust,ignore
/// use rain_gapfill::{FillConfig, FillRequest, run_fill};
///
/// let request = FillRequest::new(observations, stations, FillConfig::default());
/// let result = run_fill(&request)?;
/// println!("{} cells filled", result.filled_count());
/// ```
pub fn run_fill(request: &FillRequest) -> Result<FillResult> {
    GapFiller::default().run(request)
}

/// Fill runner with optional progress reporting and cancellation.
///
/// Use [`GapFiller::builder()`] to attach a progress callback or a
/// cancellation token.
///
/// # Example
///
/// ```rust,ignore
/// use rain_gapfill::{CancellationToken, GapFiller};
///
/// let token = CancellationToken::new();
/// let result = GapFiller::builder()
///     .cancellation_token(token.clone())
///     .on_progress(|update| {
///         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
///     })
///     .build()
///     .run(&request)?;
/// ```
#[derive(Default)]
pub struct GapFiller {
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: CancellationToken,
}

static_assertions::assert_impl_all!(GapFiller: Send, Sync);

impl GapFiller {
    /// Create a new runner builder.
    pub fn builder() -> GapFillerBuilder {
        GapFillerBuilder::default()
    }

    /// Validate, build all matrices and fill every missing cell.
    ///
    /// # Errors
    ///
    /// Returns `Err(GapFillError::Cancelled)` if the run was cancelled,
    /// a configuration error for an invalid config, and
    /// `Err(GapFillError::EmptyNetwork)` when no station can be located.
    pub fn run(&self, request: &FillRequest) -> Result<FillResult> {
        self.finish(self.run_internal(request, None))
    }

    /// Fill a request against a network prepared earlier from the same
    /// observations and stations, rebuilding only the score matrix if the
    /// threshold changed.
    ///
    /// Fails with `GapFillError::ShapeMismatch` if the request's
    /// observations or stations differ in any way from the prepared ones.
    pub fn run_prepared(
        &self,
        request: &FillRequest,
        prepared: &PreparedNetwork,
    ) -> Result<FillResult> {
        self.finish(self.run_internal(request, Some(prepared)))
    }

    /// Join geometries and build the data-dependent matrices, reporting
    /// progress and honouring cancellation.
    pub fn prepare(
        &self,
        observations: &ObservationMatrix,
        stations: &[Station],
    ) -> Result<PreparedNetwork> {
        self.prepare_with(observations, stations, true)
    }

    /// Same as [`prepare`](Self::prepare), building the correlation matrix
    /// on the calling thread unless `parallel` is set.
    pub fn prepare_with(
        &self,
        observations: &ObservationMatrix,
        stations: &[Station],
        parallel: bool,
    ) -> Result<PreparedNetwork> {
        PreparedNetwork::prepare_staged(observations, stations, parallel, |stage| {
            self.check_cancelled()?;
            self.report_progress(ProgressUpdate::new(
                stage,
                0.0,
                format!("{}...", stage.display_name()),
            ));
            Ok(())
        })
    }

    fn finish(&self, result: Result<FillResult>) -> Result<FillResult> {
        match result {
            Ok(result) => {
                self.report_progress(ProgressUpdate::complete(format!(
                    "Filled {} of {} missing cells",
                    result.filled_count(),
                    result.record.len()
                )));
                Ok(result)
            }
            Err(e) => {
                if e.is_cancelled() {
                    self.report_progress(ProgressUpdate::cancelled());
                } else {
                    self.report_progress(ProgressUpdate::failed(e.to_string()));
                }
                error!("Fill run error: {}", e);
                Err(e)
            }
        }
    }

    /// Check if cancellation has been requested.
    fn check_cancelled(&self) -> Result<()> {
        if self.cancellation_token.is_cancelled() {
            return Err(GapFillError::Cancelled);
        }
        Ok(())
    }

    /// Report progress if a reporter is configured.
    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn run_internal(
        &self,
        request: &FillRequest,
        prepared: Option<&PreparedNetwork>,
    ) -> Result<FillResult> {
        let start_time = Instant::now();
        let config = &request.config;
        let observations = &request.observations;

        info!(
            "Starting fill run ({}, threshold {}, up to {} donors)",
            config.method, config.distance_threshold, config.max_donors
        );
        self.report_progress(ProgressUpdate::new(
            FillStage::Initializing,
            0.0,
            "Validating configuration...",
        ));
        config.validate()?;
        self.check_cancelled()?;

        let owned;
        let prepared = match prepared {
            Some(prepared) => {
                prepared.check_matches(observations, &request.stations)?;
                prepared
            }
            None => {
                owned = self.prepare_with(observations, &request.stations, config.parallel)?;
                &owned
            }
        };

        self.check_cancelled()?;
        self.report_progress(ProgressUpdate::new(
            FillStage::Scores,
            0.0,
            "Scoring donors...",
        ));
        let scores = prepared.score_matrix(config.distance_threshold);

        self.check_cancelled()?;
        let original_missing = observations.missing_mask();
        info!(
            "Filling {} missing cells across {} stations",
            original_missing.count(),
            observations.n_stations()
        );

        let outcomes = self.fill_stations(observations, prepared, &scores, config)?;

        // Single writer: values go into a copy, donors always read the input.
        let mut filled = observations.clone();
        let mut record = FillRecord::new();
        for outcome in outcomes {
            for cell in outcome.cells {
                if let Some(value) = cell.value {
                    filled.set(cell.row, outcome.column, value);
                }
                record.record(observations.cell_key(cell.row, outcome.column), cell.trail);
            }
        }

        let excluded_stations = prepared.network().unlocated().to_vec();
        if !excluded_stations.is_empty() {
            warn!(
                "{} stations without geometry were not filled: {}",
                excluded_stations.len(),
                excluded_stations.join(", ")
            );
        }
        info!(
            "Fill run complete: {} filled, {} not filled",
            record.filled_count(),
            record.unfilled_count()
        );

        Ok(FillResult {
            filled,
            original_missing,
            record,
            excluded_stations,
            statistics: prepared.statistics().to_vec(),
            config: config.clone(),
            duration_ms: start_time.elapsed().as_millis() as u64,
        })
    }

    /// Resolve every station's missing cells, in column order.
    fn fill_stations(
        &self,
        observations: &ObservationMatrix,
        prepared: &PreparedNetwork,
        scores: &ScoreMatrix,
        config: &FillConfig,
    ) -> Result<Vec<StationOutcome>> {
        let selector = DonorSelector::new(
            scores,
            prepared.correlation(),
            prepared.node_statistics(),
            prepared.node_codes(),
            config.method,
            config.max_donors,
        );
        let engine = ImputationEngine::new(config.method);
        let total = observations.n_stations();
        let done = AtomicUsize::new(0);

        let resolve = |column: usize| -> Result<StationOutcome> {
            self.check_cancelled()?;
            let outcome = fill_station(observations, prepared, &selector, &engine, column);
            let processed = done.fetch_add(1, Ordering::Relaxed) + 1;
            let name = &observations.stations()[column];
            self.report_progress(ProgressUpdate::with_items(
                FillStage::Imputation,
                format!("Station: {}", name),
                processed,
                total,
                format!("Filled station {}", name),
            ));
            Ok(outcome)
        };

        if config.parallel {
            (0..total).into_par_iter().map(resolve).collect()
        } else {
            (0..total).map(resolve).collect()
        }
    }
}

/// Resolve the missing cells of one observation column.
fn fill_station(
    observations: &ObservationMatrix,
    prepared: &PreparedNetwork,
    selector: &DonorSelector<'_>,
    engine: &ImputationEngine,
    column: usize,
) -> StationOutcome {
    let missing_rows = observations
        .column(column)
        .iter()
        .enumerate()
        .filter(|(_, v)| v.is_none())
        .map(|(row, _)| row);

    let network = prepared.network();
    let Some(target) = network.node_of(column) else {
        let cells = missing_rows
            .map(|row| CellOutcome {
                row,
                value: None,
                trail: DonorTrail::Unfilled {
                    reason: UnfilledReason::StationNotLocated,
                },
            })
            .collect();
        return StationOutcome { column, cells };
    };

    let target_stats = &prepared.node_statistics()[target];
    let mut values_at_row = vec![None; network.len()];
    let cells: Vec<CellOutcome> = missing_rows
        .map(|row| {
            for (node, slot) in values_at_row.iter_mut().enumerate() {
                *slot = observations.get(row, network.column_of(node));
            }
            let donors = selector.select(target, &values_at_row);
            match engine.estimate(target_stats, &donors) {
                Ok(value) => CellOutcome {
                    row,
                    value: Some(value),
                    trail: DonorTrail::Filled {
                        donors: donors.into_iter().map(|d| d.code).collect(),
                    },
                },
                Err(reason) => CellOutcome {
                    row,
                    value: None,
                    trail: DonorTrail::Unfilled { reason },
                },
            }
        })
        .collect();

    let unfilled = cells.iter().filter(|c| c.value.is_none()).count();
    if unfilled > 0 {
        debug!(
            "Station '{}': {} of {} missing cells not filled",
            observations.stations()[column],
            unfilled,
            cells.len()
        );
    }
    StationOutcome { column, cells }
}

/// Builder for [`GapFiller`] with fluent API.
#[derive(Default)]
pub struct GapFillerBuilder {
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: Option<CancellationToken>,
}

impl GapFillerBuilder {
    /// Set a progress reporter.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Set the cancellation token checked between stages and per station.
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    pub fn build(self) -> GapFiller {
        GapFiller {
            progress_reporter: self.progress_reporter,
            cancellation_token: self.cancellation_token.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FillMethod;
    use crate::types::CellKey;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    // ========================================================================
    // Fixtures
    // ========================================================================

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// A, B and C along a line; A misses t3, C misses t1.
    fn request(method: FillMethod, max_donors: usize) -> FillRequest {
        let observations = ObservationMatrix::new(
            "date",
            labels(&["t1", "t2", "t3", "t4", "t5"]),
            labels(&["A", "B", "C"]),
            vec![
                vec![Some(2.0), Some(4.0), None, Some(1.0), Some(3.0)],
                vec![Some(2.2), Some(4.1), Some(5.0), Some(1.1), Some(2.9)],
                vec![None, Some(3.0), Some(4.0), Some(2.0), Some(2.5)],
            ],
        )
        .unwrap();
        let stations = vec![
            Station::new("A", 0.0, 0.0),
            Station::new("B", 1000.0, 0.0),
            Station::new("C", 3000.0, 0.0),
        ];
        let config = FillConfig::builder()
            .distance_threshold(10_000.0)
            .max_donors(max_donors)
            .method(method)
            .build()
            .unwrap();
        FillRequest::new(observations, stations, config)
    }

    // ========================================================================
    // Runs
    // ========================================================================

    #[test]
    fn test_run_fill_fills_every_missing_cell() {
        let result = run_fill(&request(FillMethod::InverseDistance, 1)).unwrap();

        assert_eq!(result.record.len(), 2);
        assert_eq!(result.filled_count(), 2);
        assert_eq!(result.filled.get(2, 0), Some(5.0));
        assert_eq!(
            result.record.get(&CellKey::new("t3", "A")).unwrap().donors(),
            &["B".to_string()]
        );
        assert_eq!(result.filled.missing_count(), 0);
    }

    #[test]
    fn test_original_mask_is_kept() {
        let result = run_fill(&request(FillMethod::InverseDistance, 1)).unwrap();
        assert!(result.original_missing.was_missing(2, 0));
        assert!(result.original_missing.was_missing(0, 2));
        assert!(!result.original_missing.was_missing(0, 0));
        assert_eq!(result.original_missing.count(), 2);
    }

    #[test]
    fn test_record_is_column_major() {
        let result = run_fill(&request(FillMethod::InverseDistance, 2)).unwrap();
        let lines: Vec<String> = result.record.log_lines().collect();
        assert_eq!(lines, vec!["t3, A: B, C".to_string(), "t1, C: B, A".to_string()]);
    }

    #[test]
    fn test_filled_values_never_feed_back() {
        // B is missing at t3 too: A must not use a freshly filled B.
        let mut req = request(FillMethod::InverseDistance, 1);
        req.observations = ObservationMatrix::new(
            "date",
            labels(&["t1", "t2", "t3"]),
            labels(&["A", "B"]),
            vec![
                vec![Some(1.0), Some(2.0), None],
                vec![Some(1.0), Some(2.5), None],
            ],
        )
        .unwrap();
        req.stations.truncate(2);

        let result = run_fill(&req).unwrap();
        assert_eq!(result.filled_count(), 0);
        assert_eq!(
            result.record.get(&CellKey::new("t3", "A")),
            Some(&DonorTrail::Unfilled {
                reason: UnfilledReason::NoEligibleDonors
            })
        );
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let parallel = run_fill(&request(FillMethod::Correlation, 2)).unwrap();
        let mut req = request(FillMethod::Correlation, 2);
        req.config.parallel = false;
        let sequential = run_fill(&req).unwrap();

        assert_eq!(parallel.filled, sequential.filled);
        assert_eq!(parallel.record, sequential.record);
    }

    #[test]
    fn test_invalid_config_rejected_before_work() {
        let mut req = request(FillMethod::MeanRatio, 1);
        req.config.distance_threshold = -1.0;

        let err = run_fill(&req).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_unlocated_station_is_reported() {
        let mut req = request(FillMethod::InverseDistance, 1);
        req.stations.retain(|s| s.code != "C");

        let result = run_fill(&req).unwrap();
        assert_eq!(result.excluded_stations, vec!["C".to_string()]);
        assert_eq!(
            result.record.get(&CellKey::new("t1", "C")),
            Some(&DonorTrail::Unfilled {
                reason: UnfilledReason::StationNotLocated
            })
        );
        assert_eq!(result.filled.get(0, 2), None);
        assert_eq!(result.filled.get(2, 0), Some(5.0));
    }

    #[test]
    fn test_run_prepared_reuses_network() {
        let filler = GapFiller::default();
        let req = request(FillMethod::InverseDistance, 1);
        let prepared = filler.prepare(&req.observations, &req.stations).unwrap();

        let near = filler.run_prepared(&req, &prepared).unwrap();
        assert_eq!(near.filled_count(), 2);

        let mut tight = req.clone();
        tight.config.distance_threshold = 0.0;
        let none = filler.run_prepared(&tight, &prepared).unwrap();
        assert_eq!(none.filled_count(), 0);
    }

    #[test]
    fn test_run_prepared_rejects_changed_data() {
        let filler = GapFiller::default();
        let req = request(FillMethod::InverseDistance, 1);
        let prepared = filler.prepare(&req.observations, &req.stations).unwrap();

        // Same stations and timestamps, different values.
        let columns: Vec<Vec<Option<f64>>> = (0..req.observations.n_stations())
            .map(|c| {
                req.observations
                    .column(c)
                    .iter()
                    .map(|v| v.map(|x| x * 2.0 + 1.0))
                    .collect()
            })
            .collect();
        let changed = ObservationMatrix::new(
            req.observations.date_column(),
            req.observations.timestamps().to_vec(),
            req.observations.stations().to_vec(),
            columns,
        )
        .unwrap();
        let stale = FillRequest::new(changed, req.stations.clone(), req.config.clone());

        assert!(matches!(
            filler.run_prepared(&stale, &prepared),
            Err(GapFillError::ShapeMismatch(_))
        ));
        // A fresh run on the changed data still works.
        assert!(filler.run(&stale).is_ok());
    }

    // ========================================================================
    // Progress and cancellation
    // ========================================================================

    #[test]
    fn test_cancelled_run_returns_error() {
        let token = CancellationToken::new();
        token.cancel();
        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&stages);

        let filler = GapFiller::builder()
            .cancellation_token(token)
            .on_progress(move |update| sink.lock().push(update.stage))
            .build();

        let err = filler.run(&request(FillMethod::InverseDistance, 1)).unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(stages.lock().last(), Some(&FillStage::Cancelled));
    }

    #[test]
    fn test_progress_reaches_complete() {
        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&updates);

        GapFiller::builder()
            .on_progress(move |update| sink.lock().push(update))
            .build()
            .run(&request(FillMethod::InverseDistance, 1))
            .unwrap();

        let updates = updates.lock();
        let imputation = updates
            .iter()
            .filter(|u| u.stage == FillStage::Imputation)
            .count();
        assert_eq!(imputation, 3);
        assert_eq!(updates.last().map(|u| u.stage), Some(FillStage::Complete));
    }
}
