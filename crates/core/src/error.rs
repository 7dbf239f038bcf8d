#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Dataset not found for key {key}")]
    NotFound { key: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
