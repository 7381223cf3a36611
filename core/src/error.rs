use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Detector '{name}' not found")]
    DetectorNotFound { name: String },

    #[error("Unknown entity {kind} '{id}'")]
    UnknownEntity { kind: &'static str, id: String },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DetectError {
    /// Store-level failures that degrade a detector to zero indicators
    /// instead of aborting the whole run.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

pub type DetectResult<T> = Result<T, DetectError>;
