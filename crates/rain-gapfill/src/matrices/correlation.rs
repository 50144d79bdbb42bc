use super::SquareMatrix;
use crate::profiler::pairwise_pearson;
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;

/// Symmetric pairwise-complete Pearson correlations between stations.
///
/// Undefined pairs (fewer than two joint observations, or a constant
/// series over the joint subset) are stored as NaN. The diagonal is 1
/// but is never consulted for donor selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    inner: SquareMatrix,
}

impl CorrelationMatrix {
    /// Correlate every pair of series on the rayon pool.
    pub fn build(series: &[&[Option<f64>]]) -> Self {
        Self::build_with(series, true)
    }

    /// Correlate every pair of series. With `parallel` set, rows of the
    /// upper triangle are computed on the rayon pool; otherwise on the
    /// calling thread.
    pub fn build_with(series: &[&[Option<f64>]], parallel: bool) -> Self {
        let n = series.len();
        let row = |i: usize| -> Vec<f64> {
            (i..n)
                .map(|j| {
                    if i == j {
                        1.0
                    } else {
                        pairwise_pearson(series[i], series[j]).unwrap_or(f64::NAN)
                    }
                })
                .collect()
        };
        let upper: Vec<Vec<f64>> = if parallel {
            (0..n).into_par_iter().map(row).collect()
        } else {
            (0..n).map(row).collect()
        };

        let inner = SquareMatrix::from_upper_rows(n, upper);
        let undefined = (0..n)
            .flat_map(|i| (i + 1..n).map(move |j| (i, j)))
            .filter(|&(i, j)| inner.get(i, j).is_nan())
            .count();
        debug!(
            "Correlation matrix built for {} stations ({} undefined pairs)",
            n, undefined
        );

        Self { inner }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Correlation between two stations, `None` when undefined.
    #[inline]
    pub fn get(&self, i: usize, j: usize) -> Option<f64> {
        let r = self.inner.get(i, j);
        if r.is_nan() { None } else { Some(r) }
    }

    pub fn as_matrix(&self) -> &SquareMatrix {
        &self.inner
    }
}
