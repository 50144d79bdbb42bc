//! Error types for the gap-filling engine.
//!
//! Only malformed configuration and malformed input shape are errors.
//! Statistically degenerate data (zero variance, zero mean, no donors)
//! never surfaces here; it ends up as an unfilled cell in the provenance
//! record instead.
//!
//! Errors are serializable so a front-end can show them with a stable code.

use crate::config::ConfigValidationError;
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for a fill run.
#[derive(Error, Debug)]
pub enum GapFillError {
    /// Run was cancelled through its cancellation token.
    #[error("Fill run cancelled")]
    Cancelled,

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Column was not found in the observation table.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// The same timestamp appears on more than one row.
    #[error("Duplicate timestamp '{0}' in observation matrix")]
    DuplicateTimestamp(String),

    /// The same station appears as more than one column.
    #[error("Duplicate station column '{0}' in observation matrix")]
    DuplicateStation(String),

    /// Rows and the timestamp index disagree in length, or a row is ragged.
    #[error("Malformed observation matrix: {0}")]
    ShapeMismatch(String),

    /// No station column could be matched to a geometry.
    #[error("No station in the observation matrix has a usable geometry")]
    EmptyNetwork,

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<GapFillError>,
    },
}

impl GapFillError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        GapFillError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get error code for front-end handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Cancelled => "CANCELLED",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::DuplicateTimestamp(_) => "DUPLICATE_TIMESTAMP",
            Self::DuplicateStation(_) => "DUPLICATE_STATION",
            Self::ShapeMismatch(_) => "SHAPE_MISMATCH",
            Self::EmptyNetwork => "EMPTY_NETWORK",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Check if the run was rejected before any matrix work started.
    pub fn is_config_error(&self) -> bool {
        match self {
            Self::InvalidConfig(_) => true,
            Self::WithContext { source, .. } => source.is_config_error(),
            _ => false,
        }
    }
}

impl From<ConfigValidationError> for GapFillError {
    fn from(err: ConfigValidationError) -> Self {
        GapFillError::InvalidConfig(err.to_string())
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for GapFillError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("GapFillError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for gap-filling operations.
pub type Result<T> = std::result::Result<T, GapFillError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| GapFillError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| GapFillError::Io(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(GapFillError::Cancelled.error_code(), "CANCELLED");
        assert_eq!(
            GapFillError::ColumnNotFound("date".to_string()).error_code(),
            "COLUMN_NOT_FOUND"
        );
        assert_eq!(GapFillError::EmptyNetwork.error_code(), "EMPTY_NETWORK");
    }

    #[test]
    fn test_is_cancelled_through_context() {
        assert!(GapFillError::Cancelled.is_cancelled());
        assert!(
            GapFillError::Cancelled
                .with_context("While selecting donors")
                .is_cancelled()
        );
        assert!(!GapFillError::EmptyNetwork.is_cancelled());
    }

    #[test]
    fn test_config_validation_error_converts() {
        let err: GapFillError = ConfigValidationError::InvalidMaxDonors(0).into();
        assert!(err.is_config_error());
        assert_eq!(err.error_code(), "INVALID_CONFIG");
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn test_error_serialization() {
        let error = GapFillError::DuplicateTimestamp("2001-01-03".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("DUPLICATE_TIMESTAMP"));
        assert!(json.contains("2001-01-03"));
    }

    #[test]
    fn test_with_context() {
        let error = GapFillError::ColumnNotFound("date".to_string()).with_context("Loading rainfall");
        assert!(error.to_string().contains("Loading rainfall"));
        assert_eq!(error.error_code(), "COLUMN_NOT_FOUND");
    }
}
