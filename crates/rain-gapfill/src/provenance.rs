//! Per-cell audit trail of which donors produced each filled value.

use crate::types::CellKey;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;

/// Marker written to the log for cells that could not be filled.
pub const NOT_FILLED: &str = "Not filled";

/// Why a missing cell was left unresolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnfilledReason {
    /// No other station had a present value with a positive score.
    NoEligibleDonors,
    /// The station has no geometry, so no distances exist for it.
    StationNotLocated,
    /// The method needs a target mean or deviation that is undefined.
    UndefinedTargetStatistics,
    /// The formula produced NaN or infinity.
    NonFiniteEstimate,
}

impl UnfilledReason {
    pub fn description(&self) -> &'static str {
        match self {
            Self::NoEligibleDonors => "no eligible donor station",
            Self::StationNotLocated => "station has no geometry",
            Self::UndefinedTargetStatistics => "target statistics undefined",
            Self::NonFiniteEstimate => "estimate was not finite",
        }
    }
}

/// Outcome recorded for one originally-missing cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DonorTrail {
    /// Donor station codes, in selection order.
    Filled { donors: Vec<String> },
    Unfilled { reason: UnfilledReason },
}

impl DonorTrail {
    pub fn is_filled(&self) -> bool {
        matches!(self, Self::Filled { .. })
    }

    /// Donors used, empty for unfilled cells.
    pub fn donors(&self) -> &[String] {
        match self {
            Self::Filled { donors } => donors,
            Self::Unfilled { .. } => &[],
        }
    }
}

impl fmt::Display for DonorTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Filled { donors } => f.write_str(&donors.join(", ")),
            Self::Unfilled { .. } => f.write_str(NOT_FILLED),
        }
    }
}

/// One line of the provenance log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    pub cell: CellKey,
    pub trail: DonorTrail,
}

impl fmt::Display for ProvenanceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.cell, self.trail)
    }
}

/// Provenance of every originally-missing cell of one fill run.
///
/// Keys are write-once. Entries keep the order they were recorded in,
/// which the pipeline makes column-major (station by station).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FillRecord {
    entries: Vec<ProvenanceEntry>,
    #[serde(skip)]
    index: HashMap<CellKey, usize>,
}

impl FillRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of a cell.
    ///
    /// Returns `false` and keeps the existing entry if the cell was
    /// already recorded.
    pub fn record(&mut self, cell: CellKey, trail: DonorTrail) -> bool {
        if self.index.contains_key(&cell) {
            return false;
        }
        self.index.insert(cell.clone(), self.entries.len());
        self.entries.push(ProvenanceEntry { cell, trail });
        true
    }

    pub fn get(&self, cell: &CellKey) -> Option<&DonorTrail> {
        self.index.get(cell).map(|&i| &self.entries[i].trail)
    }

    pub fn entries(&self) -> &[ProvenanceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn filled_count(&self) -> usize {
        self.entries.iter().filter(|e| e.trail.is_filled()).count()
    }

    pub fn unfilled_count(&self) -> usize {
        self.len() - self.filled_count()
    }

    /// Log lines: `"<timestamp>, <station>: <donor1>, <donor2>"` or
    /// `"<timestamp>, <station>: Not filled"`.
    pub fn log_lines(&self) -> impl Iterator<Item = String> + '_ {
        self.entries.iter().map(ToString::to_string)
    }

    /// Write the provenance log, one line per cell.
    pub fn write_log<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        for entry in &self.entries {
            writeln!(writer, "{}", entry)?;
        }
        writer.flush()
    }
}
