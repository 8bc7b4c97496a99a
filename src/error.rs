use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Invalid similarity threshold {0}: must be between 0.0 and 1.0")]
    InvalidSimilarityThreshold(f64),

    #[error("Invalid abbreviation key '{0}': keys must be non-empty and lowercase")]
    InvalidAbbreviationKey(String),

    #[error("Invalid abbreviation expansion '{0}': must be non-empty lowercase text")]
    InvalidAbbreviationExpansion(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CompileError>;
