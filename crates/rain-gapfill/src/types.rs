//! Core data model: stations, the observation matrix and its frozen
//! missing-cell mask.

use crate::error::{GapFillError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// A rain gauge with projected planar coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    /// Join key against the observation matrix's column names.
    pub code: String,
    /// Easting in a metric planar coordinate system.
    pub x: f64,
    /// Northing in a metric planar coordinate system.
    pub y: f64,
}

impl Station {
    pub fn new(code: impl Into<String>, x: f64, y: f64) -> Self {
        Self {
            code: code.into(),
            x,
            y,
        }
    }

    /// Planar Euclidean distance to another station.
    #[inline]
    pub fn distance_to(&self, other: &Station) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Identifies one cell of the observation matrix by its labels.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellKey {
    pub timestamp: String,
    pub station: String,
}

impl CellKey {
    pub fn new(timestamp: impl Into<String>, station: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            station: station.into(),
        }
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.timestamp, self.station)
    }
}

/// Station × timestamp table of measurements.
///
/// Rows are timestamps and columns are stations, both unique and ordered.
/// Values are stored column-major since every computation in the engine
/// walks one station's series at a time. `None` is the missing sentinel;
/// NaN inputs are normalized to `None` on construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationMatrix {
    date_column: String,
    timestamps: Vec<String>,
    stations: Vec<String>,
    columns: Vec<Vec<Option<f64>>>,
}

impl ObservationMatrix {
    /// Build a matrix from one series per station.
    ///
    /// # Errors
    ///
    /// Fails on duplicate timestamps, duplicate station names, or a
    /// series whose length differs from the timestamp index.
    pub fn new(
        date_column: impl Into<String>,
        timestamps: Vec<String>,
        stations: Vec<String>,
        columns: Vec<Vec<Option<f64>>>,
    ) -> Result<Self> {
        if stations.len() != columns.len() {
            return Err(GapFillError::ShapeMismatch(format!(
                "{} station names for {} columns",
                stations.len(),
                columns.len()
            )));
        }

        let mut seen = HashSet::with_capacity(timestamps.len());
        for ts in &timestamps {
            if !seen.insert(ts.as_str()) {
                return Err(GapFillError::DuplicateTimestamp(ts.clone()));
            }
        }

        let mut seen = HashSet::with_capacity(stations.len());
        for name in &stations {
            if !seen.insert(name.as_str()) {
                return Err(GapFillError::DuplicateStation(name.clone()));
            }
        }

        let columns = columns
            .into_iter()
            .zip(&stations)
            .map(|(column, name)| {
                if column.len() != timestamps.len() {
                    return Err(GapFillError::ShapeMismatch(format!(
                        "station '{}' has {} values for {} timestamps",
                        name,
                        column.len(),
                        timestamps.len()
                    )));
                }
                Ok(column
                    .into_iter()
                    .map(|v| v.filter(|x| !x.is_nan()))
                    .collect())
            })
            .collect::<Result<Vec<Vec<Option<f64>>>>>()?;

        Ok(Self {
            date_column: date_column.into(),
            timestamps,
            stations,
            columns,
        })
    }

    /// Name of the timestamp column, kept for writing the table back out.
    pub fn date_column(&self) -> &str {
        &self.date_column
    }

    pub fn timestamps(&self) -> &[String] {
        &self.timestamps
    }

    pub fn stations(&self) -> &[String] {
        &self.stations
    }

    pub fn n_timestamps(&self) -> usize {
        self.timestamps.len()
    }

    pub fn n_stations(&self) -> usize {
        self.stations.len()
    }

    /// Position of a station column by name.
    pub fn station_index(&self, name: &str) -> Option<usize> {
        self.stations.iter().position(|s| s == name)
    }

    /// The full series of one station.
    pub fn column(&self, station: usize) -> &[Option<f64>] {
        &self.columns[station]
    }

    /// Value at (timestamp row, station column).
    #[inline]
    pub fn get(&self, row: usize, station: usize) -> Option<f64> {
        self.columns[station][row]
    }

    pub(crate) fn set(&mut self, row: usize, station: usize, value: f64) {
        self.columns[station][row] = Some(value);
    }

    /// Total number of missing cells.
    pub fn missing_count(&self) -> usize {
        self.columns
            .iter()
            .map(|c| c.iter().filter(|v| v.is_none()).count())
            .sum()
    }

    /// Snapshot the current missing-cell locations.
    pub fn missing_mask(&self) -> MissingMask {
        MissingMask {
            n_timestamps: self.timestamps.len(),
            cells: self
                .columns
                .iter()
                .map(|c| c.iter().map(Option::is_none).collect())
                .collect(),
        }
    }

    /// Label pair of a cell.
    pub fn cell_key(&self, row: usize, station: usize) -> CellKey {
        CellKey::new(self.timestamps[row].clone(), self.stations[station].clone())
    }
}

/// Locations of the cells that were missing when the matrix was loaded.
///
/// Immutable once captured, so callers can keep highlighting imputed
/// cells after the matrix itself has been filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingMask {
    n_timestamps: usize,
    cells: Vec<Vec<bool>>,
}

impl MissingMask {
    pub fn was_missing(&self, row: usize, station: usize) -> bool {
        self.cells
            .get(station)
            .and_then(|c| c.get(row))
            .copied()
            .unwrap_or(false)
    }

    pub fn count(&self) -> usize {
        self.cells
            .iter()
            .map(|c| c.iter().filter(|m| **m).count())
            .sum()
    }

    /// Missing cells of one station.
    pub fn count_for_station(&self, station: usize) -> usize {
        self.cells
            .get(station)
            .map(|c| c.iter().filter(|m| **m).count())
            .unwrap_or(0)
    }

    /// `(row, station)` pairs in column-major order: station by station,
    /// then timestamp by timestamp.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.cells.iter().enumerate().flat_map(|(station, column)| {
            column
                .iter()
                .enumerate()
                .filter(|(_, missing)| **missing)
                .map(move |(row, _)| (row, station))
        })
    }

    pub fn n_timestamps(&self) -> usize {
        self.n_timestamps
    }
}
