//! Configuration types for a fill run.
//!
//! This module provides configuration options using the builder pattern.
//! Everything here is validated before any matrix work begins.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Interpolation formula applied to the selected donors.
///
/// Chosen once per run, never per cell. Serialized with the same names
/// [`FromStr`] and the CLI accept (`"inverse-distance"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FillMethod {
    /// Donor values scaled by the ratio of target mean to donor mean.
    #[serde(alias = "MeanRatio")]
    MeanRatio,
    /// Standardized anomalies of the donors weighted by their correlation
    /// with the target, rescaled to the target's mean and deviation.
    #[serde(alias = "Correlation")]
    Correlation,
    /// Donor values weighted by normalized inverse distance.
    #[default]
    #[serde(alias = "InverseDistance")]
    InverseDistance,
}

impl FillMethod {
    /// All methods, in the order a UI should list them.
    pub const ALL: [FillMethod; 3] = [
        FillMethod::MeanRatio,
        FillMethod::Correlation,
        FillMethod::InverseDistance,
    ];

    /// Returns a human-readable name for the method.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MeanRatio => "Mean ratio",
            Self::Correlation => "Correlation",
            Self::InverseDistance => "Inverse distance weighting",
        }
    }

    /// Short machine name, also accepted by [`FromStr`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MeanRatio => "mean-ratio",
            Self::Correlation => "correlation",
            Self::InverseDistance => "inverse-distance",
        }
    }
}

impl fmt::Display for FillMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FillMethod {
    type Err = ConfigValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        match normalized.as_str() {
            "mean-ratio" | "meanratio" | "mean" => Ok(Self::MeanRatio),
            "correlation" | "corr" => Ok(Self::Correlation),
            "inverse-distance" | "inversedistance" | "invdist" | "idw" => {
                Ok(Self::InverseDistance)
            }
            _ => Err(ConfigValidationError::UnknownMethod(s.to_string())),
        }
    }
}

/// Parameters of one fill run.
///
/// Use [`FillConfig::builder()`] to create a validated configuration.
///
/// # Example
///
/// ```rust,ignore
/// use rain_gapfill::config::{FillConfig, FillMethod};
///
/// let config = FillConfig::builder()
///     .distance_threshold(25_000.0)
///     .max_donors(3)
///     .method(FillMethod::Correlation)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FillConfig {
    /// Pairs of stations farther apart than this (in projected units,
    /// usually metres) never donate to each other.
    /// Default: 0.0
    pub distance_threshold: f64,

    /// Upper bound on the number of donors used for a single cell.
    /// Default: 1
    pub max_donors: usize,

    /// Interpolation formula.
    /// Default: InverseDistance
    pub method: FillMethod,

    /// Column of the observation table holding the timestamps.
    /// If None, the first column is used.
    /// Default: None
    #[serde(default)]
    pub date_column: Option<String>,

    /// Attribute of the station table used as join key against the
    /// observation table's column names.
    /// Default: "code"
    pub code_column: String,

    /// Station table column holding the projected easting.
    /// Default: "x"
    pub x_column: String,

    /// Station table column holding the projected northing.
    /// Default: "y"
    pub y_column: String,

    /// Numeric sentinel marking a missing observation, in addition to
    /// empty and NaN cells.
    /// Default: None
    #[serde(default)]
    pub missing_value: Option<f64>,

    /// Build the correlation matrix and resolve target stations on the
    /// rayon thread pool.
    /// Default: true
    pub parallel: bool,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            distance_threshold: 0.0,
            max_donors: 1,
            method: FillMethod::default(),
            date_column: None,
            code_column: "code".to_string(),
            x_column: "x".to_string(),
            y_column: "y".to_string(),
            missing_value: None,
            parallel: true,
        }
    }
}

impl FillConfig {
    /// Create a new configuration builder.
    pub fn builder() -> FillConfigBuilder {
        FillConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !self.distance_threshold.is_finite() || self.distance_threshold < 0.0 {
            return Err(ConfigValidationError::InvalidThreshold(
                self.distance_threshold,
            ));
        }

        if self.max_donors == 0 {
            return Err(ConfigValidationError::InvalidMaxDonors(self.max_donors));
        }

        for (field, value) in [
            ("code_column", &self.code_column),
            ("x_column", &self.x_column),
            ("y_column", &self.y_column),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigValidationError::EmptyColumnName(field.to_string()));
            }
        }

        if let Some(date) = &self.date_column
            && date.trim().is_empty()
        {
            return Err(ConfigValidationError::EmptyColumnName(
                "date_column".to_string(),
            ));
        }

        if let Some(sentinel) = self.missing_value
            && !sentinel.is_finite()
        {
            return Err(ConfigValidationError::InvalidSentinel(sentinel));
        }

        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid distance threshold: {0} (must be a finite number >= 0)")]
    InvalidThreshold(f64),

    #[error("Invalid max donors: {0} (must be at least 1)")]
    InvalidMaxDonors(usize),

    #[error("Unknown fill method '{0}' (expected mean-ratio, correlation or inverse-distance)")]
    UnknownMethod(String),

    #[error("Column name for '{0}' must not be empty")]
    EmptyColumnName(String),

    #[error("Invalid missing-value sentinel: {0} (must be finite)")]
    InvalidSentinel(f64),
}

/// Builder for [`FillConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct FillConfigBuilder {
    distance_threshold: Option<f64>,
    max_donors: Option<usize>,
    method: Option<FillMethod>,
    date_column: Option<String>,
    code_column: Option<String>,
    x_column: Option<String>,
    y_column: Option<String>,
    missing_value: Option<f64>,
    parallel: Option<bool>,
}

impl FillConfigBuilder {
    /// Set the maximum donor distance, in projected units.
    pub fn distance_threshold(mut self, threshold: f64) -> Self {
        self.distance_threshold = Some(threshold);
        self
    }

    /// Set the maximum number of donors per cell.
    pub fn max_donors(mut self, k: usize) -> Self {
        self.max_donors = Some(k);
        self
    }

    /// Set the interpolation formula.
    pub fn method(mut self, method: FillMethod) -> Self {
        self.method = Some(method);
        self
    }

    /// Set the timestamp column of the observation table.
    pub fn date_column(mut self, column: impl Into<String>) -> Self {
        self.date_column = Some(column.into());
        self
    }

    /// Set the station-table attribute used as join key.
    pub fn code_column(mut self, column: impl Into<String>) -> Self {
        self.code_column = Some(column.into());
        self
    }

    /// Set the station-table coordinate columns.
    pub fn coordinate_columns(mut self, x: impl Into<String>, y: impl Into<String>) -> Self {
        self.x_column = Some(x.into());
        self.y_column = Some(y.into());
        self
    }

    /// Set a numeric sentinel that marks missing observations.
    pub fn missing_value(mut self, sentinel: f64) -> Self {
        self.missing_value = Some(sentinel);
        self
    }

    /// Enable or disable parallel resolution of target stations.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = Some(parallel);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `FillConfig` or an error if validation fails.
    pub fn build(self) -> Result<FillConfig, ConfigValidationError> {
        let defaults = FillConfig::default();
        let config = FillConfig {
            distance_threshold: self.distance_threshold.unwrap_or(defaults.distance_threshold),
            max_donors: self.max_donors.unwrap_or(defaults.max_donors),
            method: self.method.unwrap_or_default(),
            date_column: self.date_column,
            code_column: self.code_column.unwrap_or(defaults.code_column),
            x_column: self.x_column.unwrap_or(defaults.x_column),
            y_column: self.y_column.unwrap_or(defaults.y_column),
            missing_value: self.missing_value,
            parallel: self.parallel.unwrap_or(defaults.parallel),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = FillConfig::default();
        assert_eq!(config.distance_threshold, 0.0);
        assert_eq!(config.max_donors, 1);
        assert_eq!(config.method, FillMethod::InverseDistance);
        assert_eq!(config.code_column, "code");
        assert!(config.parallel);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = FillConfig::builder()
            .distance_threshold(12_500.0)
            .max_donors(4)
            .method(FillMethod::MeanRatio)
            .date_column("Data")
            .code_column("Codigo")
            .coordinate_columns("east", "north")
            .missing_value(-999.0)
            .parallel(false)
            .build()
            .unwrap();

        assert_eq!(config.distance_threshold, 12_500.0);
        assert_eq!(config.max_donors, 4);
        assert_eq!(config.method, FillMethod::MeanRatio);
        assert_eq!(config.date_column.as_deref(), Some("Data"));
        assert_eq!(config.code_column, "Codigo");
        assert_eq!(config.x_column, "east");
        assert_eq!(config.y_column, "north");
        assert_eq!(config.missing_value, Some(-999.0));
        assert!(!config.parallel);
    }

    #[test]
    fn test_validation_negative_threshold() {
        let result = FillConfig::builder().distance_threshold(-1.0).build();
        assert_eq!(result.unwrap_err(), ConfigValidationError::InvalidThreshold(-1.0));
    }

    #[test]
    fn test_validation_non_finite_threshold() {
        let result = FillConfig::builder().distance_threshold(f64::NAN).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidThreshold(_)
        ));
    }

    #[test]
    fn test_validation_zero_donors() {
        let result = FillConfig::builder().max_donors(0).build();
        assert_eq!(result.unwrap_err(), ConfigValidationError::InvalidMaxDonors(0));
    }

    #[test]
    fn test_validation_empty_code_column() {
        let result = FillConfig::builder().code_column("  ").build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::EmptyColumnName(field) if field == "code_column"
        ));
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!("mean-ratio".parse::<FillMethod>().unwrap(), FillMethod::MeanRatio);
        assert_eq!("Mean".parse::<FillMethod>().unwrap(), FillMethod::MeanRatio);
        assert_eq!("CORRELATION".parse::<FillMethod>().unwrap(), FillMethod::Correlation);
        assert_eq!("InvDist".parse::<FillMethod>().unwrap(), FillMethod::InverseDistance);
        assert_eq!(
            "inverse_distance".parse::<FillMethod>().unwrap(),
            FillMethod::InverseDistance
        );
        assert_eq!(
            "kriging".parse::<FillMethod>().unwrap_err(),
            ConfigValidationError::UnknownMethod("kriging".to_string())
        );
    }

    #[test]
    fn test_method_display_round_trips_through_from_str() {
        for method in FillMethod::ALL {
            assert_eq!(method.to_string().parse::<FillMethod>().unwrap(), method);
        }
    }

    #[test]
    fn test_method_serializes_like_cli_names() {
        for method in FillMethod::ALL {
            let json = serde_json::to_value(method).unwrap();
            assert_eq!(json, method.as_str());
            assert_eq!(serde_json::from_value::<FillMethod>(json).unwrap(), method);
        }
        assert_eq!(
            serde_json::from_str::<FillMethod>("\"InverseDistance\"").unwrap(),
            FillMethod::InverseDistance
        );
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "distance_threshold": 30000.0,
            "max_donors": 3,
            "method": "Correlation",
            "date_column": "date",
            "code_column": "station",
            "x_column": "x",
            "y_column": "y",
            "missing_value": -99.0,
            "parallel": false
        }"#;

        let config: FillConfig = serde_json::from_str(json).expect("Should deserialize");
        assert_eq!(config.method, FillMethod::Correlation);
        assert_eq!(config.max_donors, 3);
        assert_eq!(config.code_column, "station");
        assert_eq!(config.missing_value, Some(-99.0));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_json_rejects_unknown_method() {
        let json = r#"{
            "distance_threshold": 1.0,
            "max_donors": 1,
            "method": "Kriging",
            "code_column": "code",
            "x_column": "x",
            "y_column": "y",
            "parallel": true
        }"#;

        assert!(serde_json::from_str::<FillConfig>(json).is_err());
    }
}
