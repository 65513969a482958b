use thiserror::Error;

pub type ArcaResult<T> = Result<T, ArcaError>;

/// Failure classes surfaced to collaborators.
///
/// `Format` and `Integrity` are fatal to the single record being processed.
/// `PartialData` is recoverable: reconstruction can be retried once more
/// blocks are available.
#[derive(Debug, Error)]
pub enum ArcaError {
    #[error("format error: {0}")]
    Format(String),

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("partial data {data}: {available} of {required} blocks available")]
    PartialData {
        data: String,
        available: usize,
        required: usize,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ArcaError {
    /// Whether the caller may retry later (with more blocks or another key)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ArcaError::PartialData { .. } | ArcaError::Integrity(_))
    }
}
