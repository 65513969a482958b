//! 24-word mnemonic encoding of a 32-byte secret
//!
//! ```text
//! secret (256 bits) = 8 blocks × 32 bits
//! check byte        = SHA-256(secret)[0]
//! block i           → 33 bits: check bit i (MSB first) inserted at p_i
//! 8 × 33 = 264 bits → 24 × 11-bit dictionary indices
//! p_i               = SHA-256("checkbit_i")[0] & 0x1F
//! ```
//!
//! The check byte gives 8 bits of protection. That is weak, but it is part
//! of the encoding of every existing phrase and cannot change.

use std::fmt;
use std::sync::OnceLock;

use zeroize::Zeroize;

use crate::codec::BitArray;
use crate::dictionary::{Dictionary, WORD_COUNT};
use crate::digest;
use crate::error::{CryptoError, CryptoResult};
use crate::secret::Secret;
use crate::SECRET_SIZE;

pub const MNEMONIC_WORDS: usize = 24;

const WORD_BITS: usize = 11;
const BLOCKS: usize = 8;
const BLOCK_BYTES: usize = 4;
const BLOCK_BITS: usize = 33;
const TOTAL_BITS: usize = MNEMONIC_WORDS * WORD_BITS;

const VALIDATION_PREFIX: &[u8] = b"validation-333:";
const VALIDATION_ROUNDS: u32 = 333;

const V2_PREFIX: &[u8] = b"checksum-v2:";
const V2_ROUNDS: u32 = 1000;

/// Bit offsets of the check bits inside each 33-bit block.
pub fn checkbit_positions() -> &'static [usize; BLOCKS] {
    static POSITIONS: OnceLock<[usize; BLOCKS]> = OnceLock::new();
    POSITIONS.get_or_init(|| {
        let mut positions = [0usize; BLOCKS];
        for (i, pos) in positions.iter_mut().enumerate() {
            let hash = digest::sha256(format!("checkbit_{i}").as_bytes());
            *pos = usize::from(hash[0] & 0x1F);
        }
        positions
    })
}

/// Outcome of decoding a well-formed phrase.
///
/// A checksum mismatch is an ordinary result (usually a typo still being
/// corrected), not an error.
#[derive(Debug)]
pub enum Decoded {
    Key(Secret),
    ChecksumMismatch,
}

impl Decoded {
    pub fn key(self) -> Option<Secret> {
        match self {
            Decoded::Key(secret) => Some(secret),
            Decoded::ChecksumMismatch => None,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Decoded::Key(_))
    }
}

/// 24 dictionary indices. Zeroized on drop.
#[derive(Clone, PartialEq, Eq)]
pub struct Mnemonic {
    indices: [u16; MNEMONIC_WORDS],
}

impl Mnemonic {
    /// Encode a secret.
    pub fn encode(secret: &Secret) -> Self {
        let bytes = secret.as_bytes();
        let check = digest::sha256(bytes)[0];
        let positions = checkbit_positions();

        let mut full = BitArray::<TOTAL_BITS>::new();
        let mut block = BitArray::<BLOCK_BITS>::new();
        for i in 0..BLOCKS {
            block.write_bytes(0, &bytes[i * BLOCK_BYTES..(i + 1) * BLOCK_BYTES]);
            let bit = (check >> (7 - i)) & 1 == 1;
            block.insert(positions[i], bit);
            full.copy_from(i * BLOCK_BITS, &block, 0, BLOCK_BITS);
        }

        let mut indices = [0u16; MNEMONIC_WORDS];
        for (w, index) in indices.iter_mut().enumerate() {
            *index = full.read_uint(w * WORD_BITS, WORD_BITS) as u16;
        }
        Self { indices }
    }

    pub fn from_indices(indices: [u16; MNEMONIC_WORDS]) -> CryptoResult<Self> {
        if let Some(bad) = indices.iter().find(|i| usize::from(**i) >= WORD_COUNT) {
            return Err(CryptoError::Format(format!("word index {bad} out of range")));
        }
        Ok(Self { indices })
    }

    /// Resolve words against `dict`. Fails on the first unknown word.
    pub fn from_words_in<S: AsRef<str>>(words: &[S], dict: &Dictionary) -> CryptoResult<Self> {
        if words.len() != MNEMONIC_WORDS {
            return Err(CryptoError::WordCount(words.len()));
        }
        let mut indices = [0u16; MNEMONIC_WORDS];
        for (index, word) in indices.iter_mut().zip(words) {
            let word = word.as_ref();
            *index = dict
                .index_of(word)
                .ok_or_else(|| CryptoError::UnknownWord(word.to_owned()))?;
        }
        Ok(Self { indices })
    }

    pub fn from_words<S: AsRef<str>>(words: &[S]) -> CryptoResult<Self> {
        Self::from_words_in(words, Dictionary::active())
    }

    /// Accept either 24 whitespace-separated words or a 64-character hex
    /// secret (which is re-encoded).
    pub fn parse(text: &str) -> CryptoResult<Self> {
        let text = text.trim();
        if text.len() == 2 * SECRET_SIZE && text.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Ok(Self::encode(&Secret::from_hex(text)?));
        }
        let words: Vec<&str> = text.split_whitespace().collect();
        Self::from_words(&words)
    }

    pub fn indices(&self) -> &[u16; MNEMONIC_WORDS] {
        &self.indices
    }

    pub fn words_in<'d>(&self, dict: &'d Dictionary) -> Vec<&'d str> {
        self.indices.iter().map(|i| dict.word(*i)).collect()
    }

    pub fn words(&self) -> Vec<&'static str> {
        self.words_in(Dictionary::active())
    }

    /// Words grouped four to a line, for writing down.
    pub fn to_grouped(&self) -> String {
        self.words()
            .chunks(4)
            .map(|line| line.join(" "))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Recover the secret, verifying the embedded check byte.
    pub fn decode(&self) -> Decoded {
        let (secret, check) = self.unpack();
        if digest::sha256(secret.as_bytes())[0] == check {
            Decoded::Key(secret)
        } else {
            Decoded::ChecksumMismatch
        }
    }

    /// Recover the 32 payload bytes without looking at the check bits.
    ///
    /// Only for transcription diagnostics next to [`v2_checksum`]; the
    /// result is not a trusted key.
    pub fn decode_unchecked(&self) -> Secret {
        self.unpack().0
    }

    fn unpack(&self) -> (Secret, u8) {
        let positions = checkbit_positions();

        let mut full = BitArray::<TOTAL_BITS>::new();
        for (w, index) in self.indices.iter().enumerate() {
            full.write_uint(w * WORD_BITS, WORD_BITS, u32::from(*index));
        }

        let mut bytes = [0u8; SECRET_SIZE];
        let mut check = 0u8;
        let mut block = BitArray::<BLOCK_BITS>::new();
        for i in 0..BLOCKS {
            block.copy_from(0, &full, i * BLOCK_BITS, BLOCK_BITS);
            let bit = block.delete(positions[i]);
            check = (check << 1) | u8::from(bit);
            block.read_bytes(0, &mut bytes[i * BLOCK_BYTES..(i + 1) * BLOCK_BYTES]);
        }

        let secret = Secret::from_bytes(bytes);
        bytes.zeroize();
        (secret, check)
    }
}

impl Drop for Mnemonic {
    fn drop(&mut self) {
        self.indices.zeroize();
    }
}

impl fmt::Debug for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mnemonic")
            .field("words", &"[REDACTED]")
            .finish()
    }
}

/// Space-separated words
impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.words().join(" "))
    }
}

/// Low-entropy fingerprint for a human to compare two copies of a key.
///
/// SHA-256 applied 333 times to `"validation-333:" ‖ key`, first 4 bytes.
/// `key` is the working key, so pass [`Secret::stretched`] when the store
/// uses stretched keys.
pub fn validation_hash(key: &Secret) -> [u8; 4] {
    let seed = [VALIDATION_PREFIX, key.as_bytes().as_slice()].concat();
    prefix4(&digest::iterate(&seed, VALIDATION_ROUNDS))
}

/// Fingerprint of unverified bytes under the second-generation scheme.
///
/// SHA-256 applied 1000 times to `"checksum-v2:" ‖ bytes`, first 4 bytes.
/// Two transcriptions with the same value almost certainly agree; it proves
/// nothing about correctness.
pub fn v2_checksum(bytes: &[u8; SECRET_SIZE]) -> [u8; 4] {
    let seed = [V2_PREFIX, bytes.as_slice()].concat();
    prefix4(&digest::iterate(&seed, V2_ROUNDS))
}

fn prefix4(hash: &digest::Hash) -> [u8; 4] {
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn flip_bit(m: &Mnemonic, bit: usize) -> Mnemonic {
        let mut indices = *m.indices();
        let word = bit / WORD_BITS;
        let shift = WORD_BITS - 1 - bit % WORD_BITS;
        indices[word] ^= 1 << shift;
        Mnemonic::from_indices(indices).unwrap()
    }

    #[test]
    fn test_checkbit_positions_in_range() {
        for pos in checkbit_positions() {
            assert!(*pos < 32);
        }
    }

    #[test]
    fn test_zero_secret_roundtrip() {
        let secret = Secret::from_bytes([0u8; 32]);
        let mnemonic = Mnemonic::encode(&secret);
        assert_eq!(mnemonic.words().len(), 24);

        let decoded = mnemonic.decode().key().unwrap();
        assert_eq!(decoded.as_bytes(), &[0u8; 32]);
    }

    #[test]
    fn test_phrase_roundtrip_through_text() {
        let secret = Secret::random();
        let phrase = Mnemonic::encode(&secret).to_string();
        let parsed = Mnemonic::parse(&format!("  {phrase}\n")).unwrap();
        assert_eq!(parsed.decode().key().unwrap(), secret);
    }

    #[test]
    fn test_grouped_phrase_parses() {
        let secret = Secret::random();
        let grouped = Mnemonic::encode(&secret).to_grouped();
        assert_eq!(grouped.lines().count(), 6);
        assert_eq!(Mnemonic::parse(&grouped).unwrap().decode().key().unwrap(), secret);
    }

    #[test]
    fn test_parse_accepts_hex_secret() {
        let secret = Secret::random();
        let parsed = Mnemonic::parse(&secret.to_hex()).unwrap();
        assert_eq!(parsed, Mnemonic::encode(&secret));
    }

    #[test]
    fn test_unknown_word_is_malformed() {
        let mut words = Mnemonic::encode(&Secret::random()).words();
        words[5] = "notaword";
        assert_eq!(
            Mnemonic::from_words(&words).unwrap_err(),
            CryptoError::UnknownWord("notaword".into())
        );
    }

    #[test]
    fn test_wrong_word_count_is_malformed() {
        let words = ["abandon"; 23];
        assert_eq!(Mnemonic::from_words(&words).unwrap_err(), CryptoError::WordCount(23));
    }

    #[test]
    fn test_out_of_range_index_rejected() {
        let mut indices = [0u16; 24];
        indices[3] = 2048;
        assert!(Mnemonic::from_indices(indices).is_err());
    }

    #[test]
    fn test_checksum_bit_flips_always_fail() {
        let secret = Secret::from_bytes([0x5A; 32]);
        let mnemonic = Mnemonic::encode(&secret);
        for (i, pos) in checkbit_positions().iter().enumerate() {
            let flipped = flip_bit(&mnemonic, i * BLOCK_BITS + pos);
            assert!(!flipped.decode().is_valid(), "check bit {i} flip accepted");
            // the payload itself is untouched
            assert_eq!(flipped.decode_unchecked(), secret);
        }
    }

    #[test]
    fn test_payload_bit_flips_never_return_the_secret() {
        let secret = Secret::from_bytes([0u8; 32]);
        let mnemonic = Mnemonic::encode(&secret);

        let mut rejected = 0;
        for bit in 0..TOTAL_BITS {
            match flip_bit(&mnemonic, bit).decode() {
                Decoded::ChecksumMismatch => rejected += 1,
                Decoded::Key(k) => assert_ne!(k, secret),
            }
        }
        // an 8-bit check lets roughly 1 in 256 payload flips through
        assert!(rejected >= TOTAL_BITS - 16, "only {rejected} flips rejected");
    }

    #[test]
    fn test_unchecked_decode_ignores_checksum() {
        let secret = Secret::random();
        let mnemonic = Mnemonic::encode(&secret);
        assert_eq!(mnemonic.decode_unchecked(), secret);
    }

    #[test]
    fn test_validation_hash_is_333_rounds() {
        let secret = Secret::from_bytes([3u8; 32]);
        let mut seed = b"validation-333:".to_vec();
        seed.extend_from_slice(&[3u8; 32]);
        let full = digest::iterate(&seed, 333);
        assert_eq!(validation_hash(&secret), full[..4]);
    }

    #[test]
    fn test_validation_hash_known_vectors() {
        let zero = Secret::from_bytes([0u8; 32]);
        assert_eq!(hex::encode(validation_hash(&zero.stretched())), "f56e40cd");
        assert_eq!(hex::encode(validation_hash(&zero)), "f068b980");
    }

    #[test]
    fn test_v2_checksum_distinguishes_inputs() {
        assert_ne!(v2_checksum(&[0u8; 32]), v2_checksum(&[1u8; 32]));
        assert_eq!(v2_checksum(&[0u8; 32]), v2_checksum(&[0u8; 32]));
    }

    #[test]
    fn test_debug_is_redacted() {
        let mnemonic = Mnemonic::encode(&Secret::from_bytes([0u8; 32]));
        assert_eq!(format!("{mnemonic:?}"), "Mnemonic { words: \"[REDACTED]\" }");
    }

    proptest! {
        #[test]
        fn test_encode_decode_roundtrip(bytes in proptest::array::uniform32(any::<u8>())) {
            let secret = Secret::from_bytes(bytes);
            let decoded = Mnemonic::encode(&secret).decode().key();
            prop_assert_eq!(decoded, Some(secret));
        }

        #[test]
        fn test_words_roundtrip(bytes in proptest::array::uniform32(any::<u8>())) {
            let mnemonic = Mnemonic::encode(&Secret::from_bytes(bytes));
            let words = mnemonic.words();
            prop_assert_eq!(Mnemonic::from_words(&words).unwrap(), mnemonic);
        }
    }
}
