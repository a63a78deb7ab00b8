use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    ConfigError(#[from] toml::de::Error),

    #[error("Source error: {0}")]
    SourceError(#[from] SourceError),

    #[error("Event worker failed: {0}")]
    WorkerError(String),

    #[error("{0}")]
    Other(String),
}

/// Failure reported by an [`crate::EventSource`] for a single lookup call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Network, throttling or service-side failure; the same request may succeed later.
    #[error("transient lookup failure: {0}")]
    Transient(String),

    /// The request or response cannot be interpreted; retrying will not help.
    #[error("malformed lookup: {0}")]
    Malformed(String),
}

impl SourceError {
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
