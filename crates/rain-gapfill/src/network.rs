//! Join between station geometries and observation columns.
//!
//! Only columns with a usable geometry become network nodes. All matrices
//! are indexed by node, not by observation column.

use crate::types::{ObservationMatrix, Station};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Stations of the observation matrix that could be located in space.
#[derive(Debug, Clone, PartialEq)]
pub struct StationNetwork {
    columns: Vec<usize>,
    stations: Vec<Station>,
    node_of_column: Vec<Option<usize>>,
    unlocated: Vec<String>,
}

impl StationNetwork {
    /// Match every observation column to a station by code.
    ///
    /// Columns without a matching station, or whose station has
    /// non-finite coordinates, are left out of the network. Duplicate
    /// codes keep the first geometry.
    pub fn join(observations: &ObservationMatrix, stations: &[Station]) -> Self {
        let mut by_code: HashMap<&str, &Station> = HashMap::with_capacity(stations.len());
        for station in stations {
            if !station.x.is_finite() || !station.y.is_finite() {
                warn!("Station '{}' has non-finite coordinates, ignoring it", station.code);
                continue;
            }
            if by_code.contains_key(station.code.as_str()) {
                warn!("Duplicate geometry for station '{}', keeping the first", station.code);
                continue;
            }
            by_code.insert(station.code.as_str(), station);
        }

        let mut columns = Vec::new();
        let mut located = Vec::new();
        let mut node_of_column = Vec::with_capacity(observations.n_stations());
        let mut unlocated = Vec::new();

        for (col, name) in observations.stations().iter().enumerate() {
            match by_code.get(name.as_str()) {
                Some(station) => {
                    node_of_column.push(Some(columns.len()));
                    columns.push(col);
                    located.push((*station).clone());
                }
                None => {
                    warn!("No geometry for station '{}', excluding it from donor search", name);
                    node_of_column.push(None);
                    unlocated.push(name.clone());
                }
            }
        }

        let unused = by_code.len() - located.len();
        if unused > 0 {
            debug!("{} station geometries have no observation column", unused);
        }

        Self {
            columns,
            stations: located,
            node_of_column,
            unlocated,
        }
    }

    /// Number of located stations.
    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Located stations in observation column order.
    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// Observation column of a node.
    pub fn column_of(&self, node: usize) -> usize {
        self.columns[node]
    }

    /// Node of an observation column, if the column was located.
    pub fn node_of(&self, column: usize) -> Option<usize> {
        self.node_of_column.get(column).copied().flatten()
    }

    /// Codes of the observation columns that have no geometry.
    pub fn unlocated(&self) -> &[String] {
        &self.unlocated
    }
}
