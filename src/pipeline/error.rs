//! Error types for the analysis pipeline.

use thiserror::Error;

/// Errors raised by the analysis steps.
///
/// Insufficient data for a single statistical test is *not* an error: the
/// test functions return `Ok(None)` for that case so callers can skip it.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A column required by the step is not present in the frame.
    #[error("required column '{column}' not found in dataset")]
    MissingColumn { column: String },

    /// The step received no rows to work with.
    #[error("{step}: no rows left to analyze")]
    EmptyData { step: &'static str },

    /// A parameter was outside its valid range.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// Feature matrix and target vector disagree in shape.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A model could not be fitted.
    #[error("failed to fit {model}: {reason}")]
    ModelFit { model: &'static str, reason: String },

    #[error(transparent)]
    Polars(#[from] polars::error::PolarsError),
}

pub type AnalysisResult<T> = std::result::Result<T, AnalysisError>;

impl AnalysisError {
    pub fn missing_column(column: &str) -> Self {
        AnalysisError::MissingColumn {
            column: column.to_string(),
        }
    }

    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        AnalysisError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
