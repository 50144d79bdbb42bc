use crate::config::FillMethod;
use crate::matrices::{CorrelationMatrix, ScoreMatrix};
use crate::profiler::StationStatistics;
use std::cmp::Ordering;

/// Snapshot of one selected donor for a single cell.
///
/// Built fresh per cell; nothing here is shared between cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Donor {
    /// Network node of the donor.
    pub node: usize,
    /// Station code, as written to the provenance log.
    pub code: String,
    /// Original observation of the donor at the cell's timestamp.
    pub value: f64,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    /// Correlation between the donor and the target.
    pub correlation: f64,
    /// Masked inverse distance between the donor and the target.
    pub weight: f64,
    pub score: f64,
}

/// Picks the top-K donors for a missing cell.
///
/// Works on network nodes; the caller maps observation columns to nodes.
pub struct DonorSelector<'a> {
    scores: &'a ScoreMatrix,
    correlation: &'a CorrelationMatrix,
    statistics: &'a [StationStatistics],
    codes: &'a [String],
    method: FillMethod,
    max_donors: usize,
}

impl<'a> DonorSelector<'a> {
    /// `statistics` and `codes` are indexed by node, like the matrices.
    pub fn new(
        scores: &'a ScoreMatrix,
        correlation: &'a CorrelationMatrix,
        statistics: &'a [StationStatistics],
        codes: &'a [String],
        method: FillMethod,
        max_donors: usize,
    ) -> Self {
        debug_assert_eq!(scores.len(), statistics.len());
        debug_assert_eq!(scores.len(), codes.len());
        Self {
            scores,
            correlation,
            statistics,
            codes,
            method,
            max_donors: max_donors.max(1),
        }
    }

    /// Select donors for `target` given every node's value at the cell's
    /// timestamp.
    ///
    /// Candidates are the other nodes with a present value, a positive
    /// score and the statistics the method divides by. They are ranked by
    /// score, highest first; equal scores keep node order. At most
    /// `max_donors` are returned, and an empty list means the cell cannot
    /// be filled.
    pub fn select(&self, target: usize, values_at_row: &[Option<f64>]) -> Vec<Donor> {
        let mut eligible: Vec<(usize, f64, f64)> = values_at_row
            .iter()
            .enumerate()
            .filter(|&(node, _)| node != target)
            .filter_map(|(node, value)| value.map(|v| (node, v)))
            .map(|(node, value)| (node, value, self.scores.score(target, node)))
            .filter(|&(node, _, score)| score > 0.0 && self.admits(node))
            .collect();

        // Stable, so ties keep node order.
        eligible.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal));

        let k = self.max_donors.min(eligible.len());
        eligible
            .into_iter()
            .take(k)
            .map(|(node, value, score)| {
                let stats = &self.statistics[node];
                Donor {
                    node,
                    code: self.codes[node].clone(),
                    value,
                    mean: stats.mean,
                    std: stats.std,
                    correlation: self.correlation.get(target, node).unwrap_or(0.0),
                    weight: self.scores.inverse_distance(target, node),
                    score,
                }
            })
            .collect()
    }

    /// Method-specific eligibility of a donor.
    fn admits(&self, node: usize) -> bool {
        let stats = &self.statistics[node];
        match self.method {
            FillMethod::MeanRatio => stats.nonzero_mean().is_some(),
            FillMethod::Correlation => stats.positive_std().is_some() && stats.mean.is_some(),
            FillMethod::InverseDistance => true,
        }
    }
}
