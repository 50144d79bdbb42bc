//! Progress reporting and cancellation support for fill runs.
//!
//! This module provides types for tracking a run's progress and for
//! cancelling it from another thread (e.g. a UI cancel button or a
//! Ctrl-C handler).
//!
//! # Example
//!
//! ```rust,ignore
//! use rain_gapfill::{CancellationToken, GapFiller};
//!
//! let token = CancellationToken::new();
//! let token_clone = token.clone();
//!
//! std::thread::spawn(move || {
//!     std::thread::sleep(std::time::Duration::from_secs(5));
//!     token_clone.cancel();
//! });
//!
//! let result = GapFiller::builder()
//!     .cancellation_token(token)
//!     .on_progress(|update| {
//!         println!("[{:?}] {}", update.stage, update.message);
//!     })
//!     .build()
//!     .run(&request);
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Stages of a fill run.
///
/// Matrix stages are single batch computations; only imputation reports
/// per-station progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStage {
    /// Validating configuration and input shape
    Initializing,
    /// Matching observation columns to station geometries
    Joining,
    /// Computing per-station means and deviations
    Profiling,
    /// Building the distance matrix
    Distances,
    /// Building the correlation matrix
    Correlations,
    /// Building the score matrix for the threshold
    Scores,
    /// Selecting donors and filling cells
    Imputation,
    /// Run completed successfully
    Complete,
    /// Run was cancelled by the caller
    Cancelled,
    /// Run failed with an error
    Failed,
}

impl FillStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Initializing => "Initializing",
            Self::Joining => "Locating Stations",
            Self::Profiling => "Profiling Stations",
            Self::Distances => "Computing Distances",
            Self::Correlations => "Computing Correlations",
            Self::Scores => "Scoring Donors",
            Self::Imputation => "Filling Gaps",
            Self::Complete => "Complete",
            Self::Cancelled => "Cancelled",
            Self::Failed => "Failed",
        }
    }

    /// Returns the typical weight of this stage in the overall run (0.0 - 1.0).
    ///
    /// Weights sum to 1.0 over the working stages.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Initializing => 0.02,
            Self::Joining => 0.03,
            Self::Profiling => 0.05,
            Self::Distances => 0.05,
            Self::Correlations => 0.30,
            Self::Scores => 0.05,
            Self::Imputation => 0.50,
            Self::Complete | Self::Cancelled | Self::Failed => 0.0,
        }
    }

    /// Returns the cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Initializing => 0.0,
            Self::Joining => 0.02,
            Self::Profiling => 0.05,
            Self::Distances => 0.10,
            Self::Correlations => 0.15,
            Self::Scores => 0.45,
            Self::Imputation => 0.50,
            Self::Complete => 1.0,
            Self::Cancelled | Self::Failed => 0.0,
        }
    }
}

/// Progress update with optional sub-stage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Current stage
    pub stage: FillStage,

    /// Optional sub-stage description (e.g. "Station: A123")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_stage: Option<String>,

    /// Overall progress (0.0 - 1.0)
    pub progress: f32,

    /// Progress within current stage (0.0 - 1.0)
    pub stage_progress: f32,

    /// Human-readable message describing current activity
    pub message: String,

    /// Number of items processed in current stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,

    /// Total items in current stage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<usize>,
}

impl ProgressUpdate {
    /// Creates a new progress update for a stage without sub-stage info.
    pub fn new(stage: FillStage, stage_progress: f32, message: impl Into<String>) -> Self {
        Self::build(stage, None, stage_progress, message, None)
    }

    /// Creates a new progress update with item counts.
    pub fn with_items(
        stage: FillStage,
        sub_stage: impl Into<String>,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let stage_progress = if total > 0 {
            current as f32 / total as f32
        } else {
            0.0
        };
        Self::build(
            stage,
            Some(sub_stage.into()),
            stage_progress,
            message,
            Some((current, total)),
        )
    }

    fn build(
        stage: FillStage,
        sub_stage: Option<String>,
        stage_progress: f32,
        message: impl Into<String>,
        items: Option<(usize, usize)>,
    ) -> Self {
        let progress = stage.base_progress() + (stage.weight() * stage_progress);
        Self {
            stage,
            sub_stage,
            progress: progress.clamp(0.0, 1.0),
            stage_progress: stage_progress.clamp(0.0, 1.0),
            message: message.into(),
            items_processed: items.map(|(current, _)| current),
            items_total: items.map(|(_, total)| total),
        }
    }

    /// Creates a completion progress update.
    pub fn complete(message: impl Into<String>) -> Self {
        let mut update = Self::build(FillStage::Complete, None, 1.0, message, None);
        update.progress = 1.0;
        update
    }

    /// Creates a cancelled progress update.
    pub fn cancelled() -> Self {
        Self::build(FillStage::Cancelled, None, 0.0, "Fill cancelled by user", None)
    }

    /// Creates a failed progress update.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::build(FillStage::Failed, None, 0.0, message, None)
    }
}

/// Trait for receiving progress updates during a fill run.
///
/// Implementations must be `Send + Sync`: imputation reports from rayon
/// worker threads.
pub trait ProgressReporter: Send + Sync {
    /// Called when progress is made. May be called once per station, so
    /// implementations should be cheap and non-blocking.
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    /// Creates a new closure-based progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

/// Token for cancelling a running fill.
///
/// Clones share one atomic flag. The run checks it between stages and
/// once per target station, and returns
/// [`GapFillError::Cancelled`](crate::error::GapFillError::Cancelled)
/// without publishing anything.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

impl CancellationToken {
    /// Creates a new cancellation token.
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Request cancellation. Safe to call from any thread.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Check if cancellation has been requested on this token or any clone.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Clear the flag so the token can be reused for another run.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }
}
