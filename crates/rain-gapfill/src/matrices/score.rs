use super::{CorrelationMatrix, DistanceMatrix, SquareMatrix};
use serde::Serialize;
use tracing::debug;

/// Distance floor used when inverting the distance between two distinct
/// but co-located stations.
pub const MIN_DONOR_DISTANCE: f64 = 1e-10;

/// Donor ranking scores for one distance threshold.
///
/// `Score[i][j] = r(i, j) × w(i, j)` where `w` is the inverse distance
/// masked to pairs within the threshold. The diagonal of `w` is zeroed
/// before inversion, so no division by zero ever happens. Undefined
/// correlations score 0; negative correlations keep their negative score
/// and are rejected by the donor eligibility rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreMatrix {
    threshold: f64,
    inverse_distance: SquareMatrix,
    scores: SquareMatrix,
}

impl ScoreMatrix {
    /// Combine distances and correlations under a distance threshold.
    pub fn build(
        distance: &DistanceMatrix,
        correlation: &CorrelationMatrix,
        threshold: f64,
    ) -> Self {
        debug_assert_eq!(distance.len(), correlation.len());
        let n = distance.len();

        let inverse_distance = SquareMatrix::from_fn(n, |i, j| {
            if i == j {
                return 0.0;
            }
            let d = distance.get(i, j);
            if d <= threshold {
                1.0 / d.max(MIN_DONOR_DISTANCE)
            } else {
                0.0
            }
        });

        let scores = SquareMatrix::from_fn(n, |i, j| {
            if i == j {
                return 0.0;
            }
            match correlation.get(i, j) {
                Some(r) => r * inverse_distance.get(i, j),
                None => 0.0,
            }
        });

        let positive = (0..n)
            .flat_map(|i| (0..n).map(move |j| (i, j)))
            .filter(|&(i, j)| scores.get(i, j) > 0.0)
            .count();
        debug!(
            "Score matrix built at threshold {} ({} positive directed pairs)",
            threshold, positive
        );

        Self {
            threshold,
            inverse_distance,
            scores,
        }
    }

    /// Threshold this matrix was built with.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Ranking score of `donor` for `target`.
    #[inline]
    pub fn score(&self, target: usize, donor: usize) -> f64 {
        self.scores.get(target, donor)
    }

    /// Masked inverse distance between `target` and `donor`.
    #[inline]
    pub fn inverse_distance(&self, target: usize, donor: usize) -> f64 {
        self.inverse_distance.get(target, donor)
    }

    pub fn as_matrix(&self) -> &SquareMatrix {
        &self.scores
    }
}
