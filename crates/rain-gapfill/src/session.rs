//! Interactive fill session.
//!
//! Holds one loaded dataset across repeated runs (e.g. while a user moves
//! the threshold slider) and publishes the latest result. The core run
//! itself stays pure; this is only the state a front-end keeps around it.
//!
//! All state is wrapped in `RwLock` from `parking_lot`. A new result
//! replaces the previous one in a single write, so readers see either the
//! old record or the new one, never a mix.

use crate::config::FillConfig;
use crate::error::Result;
use crate::pipeline::{FillRequest, FillResult, GapFiller, PreparedNetwork};
use crate::types::{ObservationMatrix, Station};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::info;

/// Loaded inputs plus the last published fill result.
#[derive(Debug)]
pub struct FillSession {
    observations: ObservationMatrix,
    stations: Vec<Station>,
    prepared: RwLock<Option<Arc<PreparedNetwork>>>,
    last_result: RwLock<Option<Arc<FillResult>>>,
}

static_assertions::assert_impl_all!(FillSession: Send, Sync);

impl FillSession {
    pub fn new(observations: ObservationMatrix, stations: Vec<Station>) -> Self {
        Self {
            observations,
            stations,
            prepared: RwLock::new(None),
            last_result: RwLock::new(None),
        }
    }

    pub fn observations(&self) -> &ObservationMatrix {
        &self.observations
    }

    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    /// Data-dependent matrices, built on first use and kept until reset.
    pub fn prepared(&self, filler: &GapFiller) -> Result<Arc<PreparedNetwork>> {
        self.prepared_with(filler, true)
    }

    fn prepared_with(
        &self,
        filler: &GapFiller,
        parallel: bool,
    ) -> Result<Arc<PreparedNetwork>> {
        if let Some(prepared) = self.prepared.read().as_ref() {
            return Ok(Arc::clone(prepared));
        }

        let prepared = Arc::new(filler.prepare_with(
            &self.observations,
            &self.stations,
            parallel,
        )?);
        let mut slot = self.prepared.write();
        Ok(Arc::clone(slot.get_or_insert(prepared)))
    }

    /// Run a fill with `config` and publish the result.
    ///
    /// A failed or cancelled run leaves the previously published result
    /// in place.
    pub fn fill(&self, config: FillConfig, filler: &GapFiller) -> Result<Arc<FillResult>> {
        let prepared = self.prepared_with(filler, config.parallel)?;
        let request = FillRequest::new(self.observations.clone(), self.stations.clone(), config);
        let result = Arc::new(filler.run_prepared(&request, &prepared)?);
        self.publish(Arc::clone(&result));
        Ok(result)
    }

    /// Replace the published result.
    pub fn publish(&self, result: Arc<FillResult>) {
        *self.last_result.write() = Some(result);
    }

    /// Last published result, if any.
    pub fn latest(&self) -> Option<Arc<FillResult>> {
        self.last_result.read().clone()
    }

    /// Drop the published result and the cached matrices.
    pub fn reset(&self) {
        *self.last_result.write() = None;
        *self.prepared.write() = None;
        info!("Fill session reset");
    }
}
