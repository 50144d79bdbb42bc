//! Pairwise station matrices: distance, correlation and donor score.
//!
//! Each builder is a single blocking batch computation. Donor selection
//! needs all three complete before it starts.

mod correlation;
mod distance;
mod score;

pub use correlation::CorrelationMatrix;
pub use distance::DistanceMatrix;
pub use score::{MIN_DONOR_DISTANCE, ScoreMatrix};

use serde::Serialize;

/// Dense N×N matrix of `f64`, row-major.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SquareMatrix {
    n: usize,
    data: Vec<f64>,
}

impl SquareMatrix {
    /// Build a matrix from an entry function.
    pub fn from_fn(n: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(n * n);
        for i in 0..n {
            for j in 0..n {
                data.push(f(i, j));
            }
        }
        Self { n, data }
    }

    /// Build a symmetric matrix from its upper triangle.
    ///
    /// `upper[i]` holds the entries `(i, i)..(i, n-1)`; the lower triangle
    /// is mirrored so symmetry holds bit for bit.
    pub(crate) fn from_upper_rows(n: usize, upper: Vec<Vec<f64>>) -> Self {
        debug_assert_eq!(upper.len(), n);
        let mut data = vec![0.0; n * n];
        for (i, row) in upper.into_iter().enumerate() {
            for (offset, value) in row.into_iter().enumerate() {
                let j = i + offset;
                data[i * n + j] = value;
                data[j * n + i] = value;
            }
        }
        Self { n, data }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[i * self.n + j]
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n..(i + 1) * self.n]
    }

    /// Exact symmetry check; NaN entries compare equal to NaN.
    pub fn is_symmetric(&self) -> bool {
        (0..self.n).all(|i| {
            (i + 1..self.n).all(|j| {
                let (a, b) = (self.get(i, j), self.get(j, i));
                a == b || (a.is_nan() && b.is_nan())
            })
        })
    }

    /// Largest finite entry, `None` for an empty or all-NaN matrix.
    pub fn max_finite(&self) -> Option<f64> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| Some(acc.map_or(v, |m: f64| m.max(v))))
    }
}
