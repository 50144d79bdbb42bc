//! Matrices that depend only on the input data, kept across re-runs.

use crate::error::{GapFillError, Result, ResultExt};
use crate::matrices::{CorrelationMatrix, DistanceMatrix, ScoreMatrix};
use crate::network::StationNetwork;
use crate::pipeline::progress::FillStage;
use crate::profiler::{StationProfiler, StationStatistics};
use crate::types::{ObservationMatrix, Station};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info};

/// Station network with its distance and correlation matrices.
///
/// Building these is the expensive part of a run and depends only on the
/// observations and geometries. The score matrix depends on the distance
/// threshold too, so it is cached for the last threshold used and
/// rebuilt when the threshold changes.
#[derive(Debug)]
pub struct PreparedNetwork {
    observations: ObservationMatrix,
    geometry: Vec<Station>,
    network: StationNetwork,
    statistics: Vec<StationStatistics>,
    node_statistics: Vec<StationStatistics>,
    node_codes: Vec<String>,
    distance: DistanceMatrix,
    correlation: CorrelationMatrix,
    scores: Mutex<Option<Arc<ScoreMatrix>>>,
}

static_assertions::assert_impl_all!(PreparedNetwork: Send, Sync);

impl PreparedNetwork {
    /// Join geometries and build the data-dependent matrices.
    ///
    /// # Errors
    ///
    /// Fails with [`GapFillError::EmptyNetwork`] when no observation column
    /// can be matched to a usable geometry.
    pub fn prepare(observations: &ObservationMatrix, stations: &[Station]) -> Result<Self> {
        Self::prepare_staged(observations, stations, true, |_| Ok(()))
    }

    /// Same as [`prepare`](Self::prepare), calling `on_stage` before each
    /// stage so the caller can report progress or abort. `parallel`
    /// selects the rayon pool for the correlation stage.
    pub(crate) fn prepare_staged(
        observations: &ObservationMatrix,
        stations: &[Station],
        parallel: bool,
        mut on_stage: impl FnMut(FillStage) -> Result<()>,
    ) -> Result<Self> {
        on_stage(FillStage::Joining)?;
        let network = StationNetwork::join(observations, stations);
        if network.is_empty() {
            return Err(GapFillError::EmptyNetwork);
        }
        info!(
            "Located {} of {} stations",
            network.len(),
            observations.n_stations()
        );

        on_stage(FillStage::Profiling)?;
        let statistics = StationProfiler::profile(observations);
        let node_statistics: Vec<StationStatistics> = (0..network.len())
            .map(|node| statistics[network.column_of(node)])
            .collect();
        let node_codes: Vec<String> = network.stations().iter().map(|s| s.code.clone()).collect();
        for (code, stats) in node_codes.iter().zip(&node_statistics) {
            if stats.is_constant() {
                debug!("Station '{}' has a constant series, it cannot donate", code);
            }
        }

        on_stage(FillStage::Distances)?;
        let distance =
            DistanceMatrix::build(network.stations()).context("Failed to build distances")?;

        on_stage(FillStage::Correlations)?;
        let series: Vec<&[Option<f64>]> = (0..network.len())
            .map(|node| observations.column(network.column_of(node)))
            .collect();
        let correlation = CorrelationMatrix::build_with(&series, parallel);

        Ok(Self {
            observations: observations.clone(),
            geometry: stations.to_vec(),
            network,
            statistics,
            node_statistics,
            node_codes,
            distance,
            correlation,
            scores: Mutex::new(None),
        })
    }

    /// Check that `observations` and `stations` are exactly the inputs
    /// this network was built from.
    ///
    /// Any difference in values, labels or geometry means the cached
    /// statistics and matrices are stale.
    pub fn check_matches(
        &self,
        observations: &ObservationMatrix,
        stations: &[Station],
    ) -> Result<()> {
        if *observations != self.observations {
            return Err(GapFillError::ShapeMismatch(
                "observation matrix differs from the one the network was prepared with"
                    .to_string(),
            ));
        }
        if stations != self.geometry.as_slice() {
            return Err(GapFillError::ShapeMismatch(
                "station geometries differ from the ones the network was prepared with"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Score matrix for `threshold`, reusing the cached one when the
    /// threshold is unchanged.
    pub fn score_matrix(&self, threshold: f64) -> Arc<ScoreMatrix> {
        let mut cached = self.scores.lock();
        if let Some(scores) = cached.as_ref()
            && scores.threshold().to_bits() == threshold.to_bits()
        {
            debug!("Reusing score matrix for threshold {}", threshold);
            return Arc::clone(scores);
        }

        let scores = Arc::new(ScoreMatrix::build(
            &self.distance,
            &self.correlation,
            threshold,
        ));
        *cached = Some(Arc::clone(&scores));
        scores
    }

    pub fn network(&self) -> &StationNetwork {
        &self.network
    }

    /// Statistics per observation column.
    pub fn statistics(&self) -> &[StationStatistics] {
        &self.statistics
    }

    /// Statistics per network node.
    pub fn node_statistics(&self) -> &[StationStatistics] {
        &self.node_statistics
    }

    /// Station codes per network node.
    pub fn node_codes(&self) -> &[String] {
        &self.node_codes
    }

    pub fn distance(&self) -> &DistanceMatrix {
        &self.distance
    }

    pub fn correlation(&self) -> &CorrelationMatrix {
        &self.correlation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observations() -> ObservationMatrix {
        ObservationMatrix::new(
            "date",
            vec!["t1".into(), "t2".into(), "t3".into()],
            vec!["A".into(), "B".into(), "Z".into()],
            vec![
                vec![Some(1.0), Some(2.0), None],
                vec![Some(1.5), Some(2.5), Some(3.5)],
                vec![Some(0.0), None, Some(1.0)],
            ],
        )
        .unwrap()
    }

    fn stations() -> Vec<Station> {
        vec![Station::new("A", 0.0, 0.0), Station::new("B", 300.0, 400.0)]
    }

    #[test]
    fn test_prepare_indexes_by_node() {
        let prepared = PreparedNetwork::prepare(&observations(), &stations()).unwrap();

        assert_eq!(prepared.network().len(), 2);
        assert_eq!(prepared.node_codes(), &["A".to_string(), "B".to_string()]);
        assert_eq!(prepared.statistics().len(), 3);
        assert_eq!(prepared.node_statistics().len(), 2);
        assert_eq!(prepared.distance().get(0, 1), 500.0);
        assert_eq!(prepared.network().unlocated(), &["Z".to_string()]);
    }

    #[test]
    fn test_empty_network_is_an_error() {
        let result = PreparedNetwork::prepare(&observations(), &[Station::new("Q", 0.0, 0.0)]);
        assert!(matches!(result, Err(GapFillError::EmptyNetwork)));
    }

    #[test]
    fn test_score_matrix_is_cached_per_threshold() {
        let prepared = PreparedNetwork::prepare(&observations(), &stations()).unwrap();

        let first = prepared.score_matrix(1000.0);
        let again = prepared.score_matrix(1000.0);
        assert!(Arc::ptr_eq(&first, &again));

        let other = prepared.score_matrix(100.0);
        assert!(!Arc::ptr_eq(&first, &other));
        assert_eq!(other.threshold(), 100.0);
        assert_eq!(other.score(0, 1), 0.0);
    }

    #[test]
    fn test_stages_are_announced_in_order() {
        let mut seen = Vec::new();
        PreparedNetwork::prepare_staged(&observations(), &stations(), true, |stage| {
            seen.push(stage);
            Ok(())
        })
        .unwrap();

        assert_eq!(
            seen,
            vec![
                FillStage::Joining,
                FillStage::Profiling,
                FillStage::Distances,
                FillStage::Correlations,
            ]
        );
    }

    #[test]
    fn test_stage_hook_can_abort() {
        let result = PreparedNetwork::prepare_staged(&observations(), &stations(), true, |stage| {
            if stage == FillStage::Distances {
                Err(GapFillError::Cancelled)
            } else {
                Ok(())
            }
        });
        assert!(matches!(result, Err(GapFillError::Cancelled)));
    }

    #[test]
    fn test_check_matches() {
        let obs = observations();
        let prepared = PreparedNetwork::prepare(&obs, &stations()).unwrap();
        assert!(prepared.check_matches(&obs, &stations()).is_ok());

        let other = ObservationMatrix::new(
            "date",
            vec!["t1".into()],
            vec!["A".into()],
            vec![vec![Some(1.0)]],
        )
        .unwrap();
        assert!(matches!(
            prepared.check_matches(&other, &stations()),
            Err(GapFillError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_check_matches_rejects_changed_values() {
        let prepared = PreparedNetwork::prepare(&observations(), &stations()).unwrap();

        // Same shape and labels, one value differs.
        let mut columns: Vec<Vec<Option<f64>>> = (0..3)
            .map(|c| observations().column(c).to_vec())
            .collect();
        columns[1][0] = Some(-1.5);
        let changed = ObservationMatrix::new(
            "date",
            vec!["t1".into(), "t2".into(), "t3".into()],
            vec!["A".into(), "B".into(), "Z".into()],
            columns,
        )
        .unwrap();

        assert!(matches!(
            prepared.check_matches(&changed, &stations()),
            Err(GapFillError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_check_matches_rejects_moved_station() {
        let prepared = PreparedNetwork::prepare(&observations(), &stations()).unwrap();
        let moved = vec![Station::new("A", 0.0, 0.0), Station::new("B", 3000.0, 4000.0)];

        assert!(matches!(
            prepared.check_matches(&observations(), &moved),
            Err(GapFillError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_sequential_prepare_matches_parallel() {
        let parallel = PreparedNetwork::prepare(&observations(), &stations()).unwrap();
        let sequential =
            PreparedNetwork::prepare_staged(&observations(), &stations(), false, |_| Ok(())).unwrap();

        for i in 0..parallel.network().len() {
            for j in 0..parallel.network().len() {
                assert_eq!(parallel.correlation().get(i, j), sequential.correlation().get(i, j));
            }
        }
    }
}
