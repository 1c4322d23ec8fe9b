//! Error types for the Kernel SHAP explainer

use thiserror::Error;

/// Result type alias for explainer operations
pub type Result<T> = std::result::Result<T, ShapError>;

/// Main error type for the explainer
#[derive(Error, Debug)]
pub enum ShapError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Prediction error: {0}")]
    PredictionError(String),

    #[error("Solver error: {0}")]
    SolverError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },
}
