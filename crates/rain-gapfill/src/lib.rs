//! Rain Gauge Gap-Filling Library
//!
//! Fills missing observations in a network of rain gauges using the
//! spatial and statistical relationships between stations.
//!
//! # Overview
//!
//! For every missing cell `(timestamp, station)` the engine ranks the other
//! stations that observed that timestamp by a donor score (correlation
//! times masked inverse distance), keeps the best K, and applies one of
//! three formulas:
//!
//! - **Mean ratio**: donor values scaled by the ratio of long-run means
//! - **Correlation**: standardized donor anomalies weighted by correlation
//! - **Inverse distance**: donor values weighted by normalized inverse distance
//!
//! Every originally-missing cell gets a provenance entry naming the donors
//! used, or the reason it could not be filled.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use rain_gapfill::io::{read_observations, read_stations, write_outputs};
//! use rain_gapfill::{FillConfig, FillMethod, FillRequest, run_fill};
//!
//! let config = FillConfig::builder()
//!     .distance_threshold(25_000.0)
//!     .max_donors(3)
//!     .method(FillMethod::Correlation)
//!     .build()?;
//!
//! let observations = read_observations("rain.csv", &config)?;
//! let stations = read_stations("gauges.csv", &config)?;
//!
//! let result = run_fill(&FillRequest::new(observations, stations, config))?;
//! write_outputs(&result, "rain_filled.csv")?;
//! ```
//!
//! # Progress Reporting
//!
//! Use [`GapFiller`] for progress updates and cancellation:
//!
//! ```rust,ignore
//! use rain_gapfill::{CancellationToken, GapFiller};
//!
//! let token = CancellationToken::new();
//! let result = GapFiller::builder()
//!     .cancellation_token(token.clone())
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()
//!     .run(&request);
//! ```
//!
//! # Interactive Sessions
//!
//! [`FillSession`] keeps the distance and correlation matrices of one
//! dataset between runs, so changing only the threshold rebuilds only the
//! score matrix, and publishes each new result atomically.

pub mod config;
pub mod error;
pub mod imputers;
pub mod io;
pub mod matrices;
pub mod network;
pub mod pipeline;
pub mod profiler;
pub mod provenance;
pub mod reporting;
pub mod session;
pub mod types;

// Re-exports for convenient access
pub use config::{ConfigValidationError, FillConfig, FillConfigBuilder, FillMethod};
pub use error::{GapFillError, Result as GapFillResult, ResultExt};
pub use imputers::{Donor, DonorSelector, ImputationEngine};
pub use matrices::{
    CorrelationMatrix, DistanceMatrix, MIN_DONOR_DISTANCE, ScoreMatrix, SquareMatrix,
};
pub use network::StationNetwork;
pub use pipeline::{
    CancellationToken, ClosureProgressReporter, FillRequest, FillResult, FillStage, GapFiller,
    GapFillerBuilder, PreparedNetwork, ProgressReporter, ProgressUpdate, run_fill,
};
pub use profiler::{StationProfiler, StationStatistics};
pub use provenance::{DonorTrail, FillRecord, NOT_FILLED, ProvenanceEntry, UnfilledReason};
pub use reporting::{FillReport, ReasonCount, StationFillSummary};
pub use session::FillSession;
pub use types::{CellKey, MissingMask, ObservationMatrix, Station};
