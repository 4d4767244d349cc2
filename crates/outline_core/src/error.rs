use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    #[error("{level} index {index} of \"{branch}\" is out of range (1..={bound})")]
    CoordinateOutOfRange {
        branch: String,
        level: &'static str,
        index: usize,
        bound: usize,
    },

    #[error("Branch \"{branch}\" has an invalid shape: expected {expected}")]
    ShapeMismatch {
        branch: String,
        expected: &'static str,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
