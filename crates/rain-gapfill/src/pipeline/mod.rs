//! Pipeline module.
//!
//! This module provides the fill run and related components.

mod prepared;
pub mod progress;
mod runner;

pub use prepared::PreparedNetwork;
pub use progress::{
    CancellationToken, ClosureProgressReporter, FillStage, ProgressReporter, ProgressUpdate,
};
pub use runner::{FillRequest, FillResult, GapFiller, GapFillerBuilder, run_fill};
