use super::SquareMatrix;
use crate::error::{GapFillError, Result};
use crate::types::Station;
use serde::Serialize;
use tracing::debug;

/// Granularity, in projected units, of the suggested threshold ceiling.
const THRESHOLD_STEP: f64 = 1000.0;

/// Symmetric planar distances between located stations.
///
/// `D[i][i] = 0` and all entries are non-negative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistanceMatrix {
    inner: SquareMatrix,
}

impl DistanceMatrix {
    /// Compute all pairwise distances.
    ///
    /// # Errors
    ///
    /// Requires at least one station.
    pub fn build(stations: &[Station]) -> Result<Self> {
        if stations.is_empty() {
            return Err(GapFillError::EmptyNetwork);
        }

        let n = stations.len();
        let upper = (0..n)
            .map(|i| {
                (i..n)
                    .map(|j| if i == j { 0.0 } else { stations[i].distance_to(&stations[j]) })
                    .collect()
            })
            .collect();

        let inner = SquareMatrix::from_upper_rows(n, upper);
        debug!("Distance matrix built for {} stations", n);
        Ok(Self { inner })
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.inner.get(i, j)
    }

    pub fn as_matrix(&self) -> &SquareMatrix {
        &self.inner
    }

    /// Largest distance between any two stations.
    pub fn max_distance(&self) -> f64 {
        self.inner.max_finite().unwrap_or(0.0)
    }

    /// Largest distance rounded up to the next multiple of 1000.
    ///
    /// Upper bound for an interactive threshold control; any threshold at
    /// or above it admits every pair.
    pub fn suggested_threshold_ceiling(&self) -> f64 {
        (self.max_distance() / THRESHOLD_STEP).ceil() * THRESHOLD_STEP
    }
}
