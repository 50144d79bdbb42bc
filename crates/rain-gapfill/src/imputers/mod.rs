//! Imputation module for filling missing gauge readings.
//!
//! This module provides the two halves of a cell fill:
//! - Donor selection (ranking other stations by score)
//! - The interpolation formulas (mean ratio, correlation, inverse distance)

mod donors;
mod engine;

pub use donors::{Donor, DonorSelector};
pub use engine::ImputationEngine;
