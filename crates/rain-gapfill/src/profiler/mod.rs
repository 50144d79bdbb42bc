//! Per-station long-run statistics.
//!
//! Means and deviations are computed once from the original observations
//! and never from filled values.

mod statistics;

use crate::types::ObservationMatrix;
use serde::{Deserialize, Serialize};

pub(crate) use statistics::pairwise_pearson;

/// Long-run statistics of one station's series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StationStatistics {
    /// Number of present observations.
    pub valid_count: usize,
    /// Number of missing observations.
    pub missing_count: usize,
    /// Mean of the present observations.
    pub mean: Option<f64>,
    /// Sample standard deviation of the present observations.
    pub std: Option<f64>,
}

impl StationStatistics {
    /// Compute statistics from a raw series.
    pub fn from_series(values: &[Option<f64>]) -> Self {
        let valid_count = values.iter().filter(|v| v.is_some()).count();
        Self {
            valid_count,
            missing_count: values.len() - valid_count,
            mean: statistics::mean(values),
            std: statistics::sample_std(values),
        }
    }

    /// Mean usable as a ratio denominator.
    pub fn nonzero_mean(&self) -> Option<f64> {
        self.mean.filter(|m| *m != 0.0 && m.is_finite())
    }

    /// Deviation usable for standardizing anomalies.
    pub fn positive_std(&self) -> Option<f64> {
        self.std.filter(|s| *s > 0.0 && s.is_finite())
    }

    /// True when the series carries no variance information.
    pub fn is_constant(&self) -> bool {
        self.std == Some(0.0)
    }
}

/// Profiles every station column of an observation matrix.
pub struct StationProfiler;

impl StationProfiler {
    /// Statistics for each station, in column order.
    pub fn profile(observations: &ObservationMatrix) -> Vec<StationStatistics> {
        (0..observations.n_stations())
            .map(|col| StationStatistics::from_series(observations.column(col)))
            .collect()
    }
}
