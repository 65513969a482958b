//! Encrypted payload envelopes (AES-256-CBC + raw deflate)
//!
//! Envelope format (binary):
//! ```text
//! [4: signature][32: salt][AES-256-CBC ciphertext, PKCS#7 padded]
//!
//! ciphertext plaintext:  [16: test][4: SHA-256(test)[..4]][raw deflate stream]
//! inflated stream:       [N: payload][8: SHA-256(payload)[..8]]
//!
//! enc_key = SHA-256(0x33 0x35 0x39 ‖ material ‖ 0x61 0x65 0x71 ‖ salt)
//! iv      = SHA-256(SHA-256(SHA-256(enc_key ‖ salt)))[..16]
//! ```
//!
//! The signature is left in the clear and is the record signature of the
//! structure inside. A decrypted file on disk is marked by prefixing
//! [`DECRYPTED_MARKER`], so re-running over a directory skips it.

use std::io::{Read, Write};

use aes::Aes256;
use cbc::cipher::block_padding::{NoPadding, Pkcs7};
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use rand::RngCore;
use zeroize::Zeroize;

use crate::codec::ByteReader;
use crate::digest;
use crate::error::{CryptoError, CryptoResult};

type Aes256CbcDec = cbc::Decryptor<Aes256>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;

/// Prefix of a file that has already been decrypted in place
pub const DECRYPTED_MARKER: u32 = 0x1AFC_72E7;

pub const SIGNATURE_SIZE: usize = 4;
pub const SALT_SIZE: usize = 32;
pub const TEST_SIZE: usize = 16;
pub const KEY_CHECK_SIZE: usize = 4;
pub const TRAILER_SIZE: usize = 8;

const AES_BLOCK: usize = 16;
const KEY_PREFIX: [u8; 3] = [51, 53, 57];
const KEY_SUFFIX: [u8; 3] = [97, 101, 113];

/// AES key and IV for one envelope. Zeroized on drop.
pub struct CipherParams {
    key: [u8; 32],
    iv: [u8; 16],
}

impl CipherParams {
    pub fn derive(material: &[u8], salt: &[u8; SALT_SIZE]) -> Self {
        let key = digest::sha256_concat(&[&KEY_PREFIX, material, &KEY_SUFFIX, salt]);

        let mut chain = digest::sha256_concat(&[&key, salt]);
        chain = digest::sha256(&chain);
        chain = digest::sha256(&chain);

        let mut iv = [0u8; 16];
        iv.copy_from_slice(&chain[..16]);
        chain.zeroize();
        Self { key, iv }
    }

    pub fn key(&self) -> &[u8; 32] {
        &self.key
    }

    pub fn iv(&self) -> &[u8; 16] {
        &self.iv
    }
}

impl Drop for CipherParams {
    fn drop(&mut self) {
        self.key.zeroize();
        self.iv.zeroize();
    }
}

impl std::fmt::Debug for CipherParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherParams")
            .field("key", &"[REDACTED]")
            .field("iv", &"[REDACTED]")
            .finish()
    }
}

/// Result of opening a file that may already be decrypted.
#[derive(Debug, PartialEq, Eq)]
pub enum FileOutcome {
    /// `[4: DECRYPTED_MARKER][4: signature][payload]`
    Decrypted(Vec<u8>),
    AlreadyDecrypted,
}

/// True if `blob` starts with [`DECRYPTED_MARKER`].
pub fn is_decrypted(blob: &[u8]) -> bool {
    blob.len() >= SIGNATURE_SIZE && blob[..SIGNATURE_SIZE] == DECRYPTED_MARKER.to_be_bytes()
}

/// Strip the marker from a decrypted file, leaving `signature ‖ payload`.
pub fn strip_marker(blob: &[u8]) -> Option<&[u8]> {
    is_decrypted(blob).then(|| &blob[SIGNATURE_SIZE..])
}

/// Open an envelope fetched over the network.
///
/// Returns `signature ‖ payload`. No marker handling: the caller knows the
/// bytes are fresh ciphertext.
pub fn open_payload(material: &[u8], blob: &[u8]) -> CryptoResult<Vec<u8>> {
    let mut r = ByteReader::new(blob);
    let signature = r.take(SIGNATURE_SIZE)?;
    let payload = open_body(material, r.rest())?;

    let mut out = Vec::with_capacity(SIGNATURE_SIZE + payload.len());
    out.extend_from_slice(signature);
    out.extend_from_slice(&payload);
    Ok(out)
}

/// Open an envelope read from disk, which may already be decrypted.
pub fn open_file(material: &[u8], blob: &[u8]) -> CryptoResult<FileOutcome> {
    if is_decrypted(blob) {
        return Ok(FileOutcome::AlreadyDecrypted);
    }
    let opened = open_payload(material, blob)?;

    let mut out = Vec::with_capacity(SIGNATURE_SIZE + opened.len());
    out.extend_from_slice(&DECRYPTED_MARKER.to_be_bytes());
    out.extend_from_slice(&opened);
    Ok(FileOutcome::Decrypted(out))
}

/// Decrypt `[salt][ciphertext]` and verify every check along the way.
fn open_body(material: &[u8], body: &[u8]) -> CryptoResult<Vec<u8>> {
    let mut r = ByteReader::new(body);
    let salt: [u8; SALT_SIZE] = r.read_array()?;
    let ciphertext = r.rest();

    if ciphertext.len() < 2 * AES_BLOCK || ciphertext.len() % AES_BLOCK != 0 {
        return Err(CryptoError::Format(format!(
            "ciphertext length {} is not a positive multiple of {AES_BLOCK} blocks",
            ciphertext.len()
        )));
    }

    let params = CipherParams::derive(material, &salt);
    let mut plain = ciphertext.to_vec();
    // Decrypt without unpadding first so a wrong key is reported as such,
    // not as bad padding.
    Aes256CbcDec::new(params.key().into(), params.iv().into())
        .decrypt_padded_mut::<NoPadding>(&mut plain)
        .map_err(|_| CryptoError::Format("ciphertext is not block aligned".into()))?;

    let result = verify_plain(&plain);
    plain.zeroize();
    result
}

fn verify_plain(plain: &[u8]) -> CryptoResult<Vec<u8>> {
    let (test, rest) = plain.split_at(TEST_SIZE);
    let (token, _) = rest.split_at(KEY_CHECK_SIZE);
    if digest::sha256(test)[..KEY_CHECK_SIZE] != *token {
        tracing::trace!("key-check token mismatch");
        return Err(CryptoError::WrongKey);
    }

    let unpadded = unpad(plain)?;
    let compressed = unpadded
        .get(TEST_SIZE + KEY_CHECK_SIZE..)
        .ok_or_else(|| CryptoError::Integrity("padding overlaps key-check header".into()))?;

    let mut inflated = Vec::new();
    DeflateDecoder::new(compressed)
        .read_to_end(&mut inflated)
        .map_err(|e| CryptoError::Integrity(format!("inflate failed: {e}")))?;

    if inflated.len() < TRAILER_SIZE {
        return Err(CryptoError::Integrity(format!(
            "inflated stream too short for hash trailer: {} bytes",
            inflated.len()
        )));
    }
    let trailer = inflated.split_off(inflated.len() - TRAILER_SIZE);
    if digest::sha256(&inflated)[..TRAILER_SIZE] != trailer[..] {
        return Err(CryptoError::Integrity("content hash mismatch".into()));
    }
    Ok(inflated)
}

/// Check and strip PKCS#7 padding.
fn unpad(plain: &[u8]) -> CryptoResult<&[u8]> {
    let n = usize::from(plain.last().copied().unwrap_or(0));
    if n == 0 || n > AES_BLOCK || n > plain.len() {
        return Err(CryptoError::Integrity(format!("bad padding length {n}")));
    }
    let (body, pad) = plain.split_at(plain.len() - n);
    if pad.iter().any(|b| usize::from(*b) != n) {
        return Err(CryptoError::Integrity("bad padding bytes".into()));
    }
    Ok(body)
}

/// Build an envelope: the encryption direction of [`open_payload`].
///
/// Salt and test material come from the thread RNG.
pub fn seal_payload(material: &[u8], signature: u32, payload: &[u8]) -> CryptoResult<Vec<u8>> {
    if signature == DECRYPTED_MARKER {
        return Err(CryptoError::Format(
            "signature collides with the decrypted-file marker".into(),
        ));
    }

    let mut rng = rand::thread_rng();
    let mut salt = [0u8; SALT_SIZE];
    rng.fill_bytes(&mut salt);
    let mut test = [0u8; TEST_SIZE];
    rng.fill_bytes(&mut test);

    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(payload)
        .and_then(|_| encoder.write_all(&digest::sha256(payload)[..TRAILER_SIZE]))
        .map_err(|e| CryptoError::Format(format!("deflate failed: {e}")))?;
    let compressed = encoder
        .finish()
        .map_err(|e| CryptoError::Format(format!("deflate failed: {e}")))?;

    let mut plain = Vec::with_capacity(TEST_SIZE + KEY_CHECK_SIZE + compressed.len());
    plain.extend_from_slice(&test);
    plain.extend_from_slice(&digest::sha256(&test)[..KEY_CHECK_SIZE]);
    plain.extend_from_slice(&compressed);

    let params = CipherParams::derive(material, &salt);
    let ciphertext = Aes256CbcEnc::new(params.key().into(), params.iv().into())
        .encrypt_padded_vec_mut::<Pkcs7>(&plain);
    plain.zeroize();

    let mut out = Vec::with_capacity(SIGNATURE_SIZE + SALT_SIZE + ciphertext.len());
    out.extend_from_slice(&signature.to_be_bytes());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SIGN: u32 = 0xF8D5_7165;

    fn sealed(material: &[u8], payload: &[u8]) -> Vec<u8> {
        seal_payload(material, SIGN, payload).unwrap()
    }

    #[test]
    fn test_derive_matches_layout() {
        let salt = [0x11u8; 32];
        let params = CipherParams::derive(b"key", &salt);

        let mut pre = b"359key".to_vec();
        pre.extend_from_slice(b"aeq");
        pre.extend_from_slice(&salt);
        let key = digest::sha256(&pre);
        assert_eq!(params.key(), &key);

        let mut seed = key.to_vec();
        seed.extend_from_slice(&salt);
        let iv = digest::sha256(&digest::sha256(&digest::sha256(&seed)));
        assert_eq!(params.iv()[..], iv[..16]);
    }

    #[test]
    fn test_roundtrip_keeps_signature() {
        let blob = sealed(b"material", b"hello arca");
        let opened = open_payload(b"material", &blob).unwrap();
        assert_eq!(&opened[..4], &SIGN.to_be_bytes());
        assert_eq!(&opened[4..], b"hello arca");
    }

    #[test]
    fn test_roundtrip_empty_payload() {
        let blob = sealed(b"m", b"");
        assert_eq!(open_payload(b"m", &blob).unwrap(), SIGN.to_be_bytes());
    }

    #[test]
    fn test_wrong_key_is_reported() {
        let key_a = [0u8; 32];
        let key_b = [1u8; 32];
        let blob = sealed(&key_a, b"secret data");
        assert_eq!(open_payload(&key_b, &blob).unwrap_err(), CryptoError::WrongKey);
    }

    #[test]
    fn test_truncated_envelope_is_format_error() {
        let blob = sealed(b"m", b"data");
        assert!(matches!(open_payload(b"m", &blob[..3]), Err(CryptoError::Format(_))));
        assert!(matches!(open_payload(b"m", &blob[..40]), Err(CryptoError::Format(_))));
        assert!(matches!(
            open_payload(b"m", &blob[..blob.len() - 1]),
            Err(CryptoError::Format(_))
        ));
    }

    #[test]
    fn test_last_block_tamper_fails() {
        let mut blob = sealed(b"m", &[7u8; 1000]);
        let n = blob.len();
        blob[n - 1] ^= 0x01;
        assert!(open_payload(b"m", &blob).unwrap_err().is_integrity());
    }

    #[test]
    fn test_open_file_marks_output() {
        let blob = sealed(b"m", b"payload");
        let FileOutcome::Decrypted(out) = open_file(b"m", &blob).unwrap() else {
            panic!("expected decrypted output");
        };
        assert!(is_decrypted(&out));
        assert_eq!(&out[4..8], &SIGN.to_be_bytes());
        assert_eq!(&out[8..], b"payload");

        // running again over the output is a no-op
        assert_eq!(open_file(b"m", &out).unwrap(), FileOutcome::AlreadyDecrypted);
        assert_eq!(strip_marker(&out).unwrap(), &out[4..]);
    }

    #[test]
    fn test_strip_marker_on_ciphertext() {
        let blob = sealed(b"m", b"x");
        assert!(strip_marker(&blob).is_none());
    }

    #[test]
    fn test_seal_rejects_marker_signature() {
        assert!(seal_payload(b"m", DECRYPTED_MARKER, b"x").is_err());
    }

    #[test]
    fn test_salts_are_fresh() {
        let a = sealed(b"m", b"same");
        let b = sealed(b"m", b"same");
        assert_ne!(a[4..36], b[4..36]);
    }

    #[test]
    fn test_unpad() {
        let mut block = vec![0xAAu8; 12];
        block.extend_from_slice(&[4, 4, 4, 4]);
        assert_eq!(unpad(&block).unwrap().len(), 12);

        block[13] = 3;
        assert!(unpad(&block).is_err());
        assert!(unpad(&[0u8; 16]).is_err());
        assert!(unpad(&[17u8; 16]).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn seal_open_roundtrip(
            material in proptest::collection::vec(any::<u8>(), 1..=64),
            payload in proptest::collection::vec(any::<u8>(), 0..=4096),
        ) {
            let blob = seal_payload(&material, SIGN, &payload).unwrap();
            let opened = open_payload(&material, &blob).unwrap();
            prop_assert_eq!(&opened[4..], payload.as_slice());
        }

        #[test]
        fn any_ciphertext_or_salt_flip_fails(
            payload in proptest::collection::vec(any::<u8>(), 0..=512),
            pos in any::<prop::sample::Index>(),
            mask in 1u8..=255,
        ) {
            let mut blob = seal_payload(b"material", SIGN, &payload).unwrap();
            // anything after the clear-text signature
            let i = SIGNATURE_SIZE + pos.index(blob.len() - SIGNATURE_SIZE);
            blob[i] ^= mask;
            let err = open_payload(b"material", &blob).unwrap_err();
            prop_assert!(err.is_integrity(), "flip at {} gave {:?}", i, err);
        }
    }
}
