//! Loading inputs from CSV and writing the filled table and its log.
//!
//! The observation table has one timestamp column and one numeric column
//! per station. The station table carries a join-key column and projected
//! coordinates, one row per gauge.

mod readers;
mod writers;

pub use readers::{
    load_csv, observations_from_dataframe, read_observations, read_stations,
    stations_from_dataframe,
};
pub use writers::{
    filled_to_dataframe, log_path_for, write_filled_csv, write_outputs, write_provenance_log,
};
