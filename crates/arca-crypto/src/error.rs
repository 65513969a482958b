use thiserror::Error;

pub type CryptoResult<T> = Result<T, CryptoError>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Bad signature, truncated input or an impossible length field.
    #[error("format error: {0}")]
    Format(String),

    /// The key-check token did not match: the key is wrong.
    #[error("wrong key: key-check token mismatch")]
    WrongKey,

    /// The key passed the key check but the payload did not verify.
    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("unknown mnemonic word: {0:?}")]
    UnknownWord(String),

    #[error("expected 24 mnemonic words, got {0}")]
    WordCount(usize),

    #[error("invalid dictionary: {0}")]
    Dictionary(String),
}

impl CryptoError {
    /// Wrong key and corrupted payload both mean "do not trust this item";
    /// retrying with a different key is the only sensible reaction.
    pub fn is_integrity(&self) -> bool {
        matches!(self, CryptoError::WrongKey | CryptoError::Integrity(_))
    }
}
