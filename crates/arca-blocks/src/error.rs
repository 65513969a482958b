use std::path::PathBuf;

use arca_core::ArcaError;
use arca_crypto::CryptoError;
use thiserror::Error;

pub type BlockResult<T> = Result<T, BlockError>;

#[derive(Debug, Error)]
pub enum BlockError {
    /// Bad signature, unknown tag or type, malformed name or length.
    #[error("format error: {0}")]
    Format(String),

    /// Reassembled content disagrees with its metadata.
    #[error("integrity error: {0}")]
    Integrity(String),

    /// Not every block of a data blob is available yet.
    #[error("data {data}: only {available} of {required} blocks found")]
    PartialData {
        data: String,
        available: usize,
        required: usize,
    },

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A batch stopped on this item.
    #[error("{}: {source}", path.display())]
    BatchItem {
        path: PathBuf,
        #[source]
        source: Box<BlockError>,
    },
}

impl BlockError {
    pub fn at(path: impl Into<PathBuf>, source: BlockError) -> Self {
        BlockError::BatchItem {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Wrong key, bad padding, or content hash mismatch anywhere in the chain
    pub fn is_integrity(&self) -> bool {
        match self {
            BlockError::Integrity(_) => true,
            BlockError::Crypto(e) => e.is_integrity(),
            BlockError::BatchItem { source, .. } => source.is_integrity(),
            _ => false,
        }
    }
}

impl From<BlockError> for ArcaError {
    fn from(err: BlockError) -> Self {
        match err {
            BlockError::Format(msg) => ArcaError::Format(msg),
            BlockError::Integrity(msg) => ArcaError::Integrity(msg),
            BlockError::PartialData {
                data,
                available,
                required,
            } => ArcaError::PartialData {
                data,
                available,
                required,
            },
            BlockError::Crypto(e) if e.is_integrity() => ArcaError::Integrity(e.to_string()),
            BlockError::Crypto(e) => ArcaError::Format(e.to_string()),
            BlockError::Io(e) => ArcaError::Io(e),
            BlockError::BatchItem { path, source } => match ArcaError::from(*source) {
                ArcaError::Format(msg) => ArcaError::Format(format!("{}: {msg}", path.display())),
                ArcaError::Integrity(msg) => {
                    ArcaError::Integrity(format!("{}: {msg}", path.display()))
                }
                other => other,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_item_names_path() {
        let err = BlockError::at("meta/12", BlockError::Format("bad tag 7".into()));
        assert_eq!(err.to_string(), "meta/12: format error: bad tag 7");
    }

    #[test]
    fn test_integrity_through_layers() {
        assert!(BlockError::Crypto(CryptoError::WrongKey).is_integrity());
        assert!(BlockError::at("x", CryptoError::WrongKey.into()).is_integrity());
        assert!(!BlockError::Format("x".into()).is_integrity());
    }

    #[test]
    fn test_into_arca_error() {
        let err: ArcaError = BlockError::PartialData {
            data: "ab".into(),
            available: 1,
            required: 3,
        }
        .into();
        assert!(err.is_recoverable());

        let err: ArcaError = BlockError::Crypto(CryptoError::Format("short".into())).into();
        assert!(matches!(err, ArcaError::Format(_)));

        let err: ArcaError = BlockError::Crypto(CryptoError::WrongKey).into();
        assert!(matches!(err, ArcaError::Integrity(_)));

        let err: ArcaError = BlockError::at("meta/3", CryptoError::WrongKey.into()).into();
        match err {
            ArcaError::Integrity(msg) => assert!(msg.starts_with("meta/3: wrong key")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
