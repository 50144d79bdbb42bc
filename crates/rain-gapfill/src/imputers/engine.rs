use super::Donor;
use crate::config::FillMethod;
use crate::profiler::StationStatistics;
use crate::provenance::UnfilledReason;

/// Applies the run's interpolation formula to a cell's donors.
#[derive(Debug, Clone, Copy)]
pub struct ImputationEngine {
    method: FillMethod,
}

impl ImputationEngine {
    pub fn new(method: FillMethod) -> Self {
        Self { method }
    }

    pub fn method(&self) -> FillMethod {
        self.method
    }

    /// Estimate the target's missing value from its donors.
    ///
    /// The result is always finite; anything else becomes an
    /// [`UnfilledReason`] and nothing is written for the cell.
    pub fn estimate(
        &self,
        target: &StationStatistics,
        donors: &[Donor],
    ) -> Result<f64, UnfilledReason> {
        if donors.is_empty() {
            return Err(UnfilledReason::NoEligibleDonors);
        }

        let value = match self.method {
            FillMethod::MeanRatio => Self::mean_ratio(target, donors)?,
            FillMethod::Correlation => Self::standardized_anomaly(target, donors)?,
            FillMethod::InverseDistance => Self::inverse_distance(donors)?,
        };

        if value.is_finite() {
            Ok(value)
        } else {
            Err(UnfilledReason::NonFiniteEstimate)
        }
    }

    /// `(1/K) Σ (target_mean / donor_mean) × value`
    fn mean_ratio(target: &StationStatistics, donors: &[Donor]) -> Result<f64, UnfilledReason> {
        let target_mean = target.mean.ok_or(UnfilledReason::UndefinedTargetStatistics)?;

        let mut sum = 0.0;
        for donor in donors {
            let donor_mean = donor
                .mean
                .filter(|m| *m != 0.0)
                .ok_or(UnfilledReason::NonFiniteEstimate)?;
            sum += (target_mean / donor_mean) * donor.value;
        }
        Ok(sum / donors.len() as f64)
    }

    /// `target_mean + (target_std/K) Σ ((value − donor_mean)/donor_std) × r`
    fn standardized_anomaly(
        target: &StationStatistics,
        donors: &[Donor],
    ) -> Result<f64, UnfilledReason> {
        let (Some(target_mean), Some(target_std)) = (target.mean, target.std) else {
            return Err(UnfilledReason::UndefinedTargetStatistics);
        };

        let mut sum = 0.0;
        for donor in donors {
            let (Some(mean), Some(std)) = (donor.mean, donor.std.filter(|s| *s > 0.0)) else {
                return Err(UnfilledReason::NonFiniteEstimate);
            };
            sum += ((donor.value - mean) / std) * donor.correlation;
        }
        Ok(target_mean + (target_std / donors.len() as f64) * sum)
    }

    /// `Σ (w / Σw) × value` over the selected donors only.
    fn inverse_distance(donors: &[Donor]) -> Result<f64, UnfilledReason> {
        let total: f64 = donors.iter().map(|d| d.weight).sum();
        if total <= 0.0 || !total.is_finite() {
            return Err(UnfilledReason::NonFiniteEstimate);
        }
        Ok(donors.iter().map(|d| (d.weight / total) * d.value).sum())
    }
}
