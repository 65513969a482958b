//! Deterministic service passwords and port numbers
//!
//! ```text
//! h = SHA-256^55555("password:" ‖ material)
//! next(range): v = u64_be(h[0..8]) mod range; h = SHA-256(h)
//! ```
//!
//! Passwords draw a character class without replacement from eight groups
//! (2× upper, 4× lower, digit, symbol), refilling once all eight are used,
//! then a character from that class. Any password of 8+ characters therefore
//! contains every class.

use secrecy::SecretString;
use zeroize::Zeroize;

use crate::digest::{self, Hash};
use crate::error::{CryptoError, CryptoResult};

pub const PASSWORD_ROUNDS: u32 = 55_555;
pub const DEFAULT_PASSWORD_LEN: usize = 32;

pub const PORT_BASE: u16 = 10_000;
pub const PORT_SPAN: u16 = 10_000;

const PREFIX: &[u8] = b"password:";

const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!@#$%^&*()";

const GROUPS: [&[u8]; 8] = [UPPER, UPPER, LOWER, LOWER, LOWER, LOWER, DIGITS, SYMBOLS];

/// Hash-chain number generator seeded from key material.
///
/// Not a CSPRNG in any formal sense; it only ever expands a high-entropy
/// seed into a handful of bounded integers.
pub struct HashChain {
    state: Hash,
}

impl HashChain {
    pub fn seed(material: &[u8]) -> Self {
        let seed = [PREFIX, material].concat();
        let state = digest::iterate(&seed, PASSWORD_ROUNDS);
        Self { state }
    }

    /// Next integer in `[0, range)`. `range` must be non-zero.
    pub fn next_below(&mut self, range: u64) -> u64 {
        assert!(range > 0, "empty range");
        let mut head = [0u8; 8];
        head.copy_from_slice(&self.state[..8]);
        let v = u64::from_be_bytes(head);
        self.state = digest::sha256(&self.state);
        v % range
    }
}

impl Drop for HashChain {
    fn drop(&mut self) {
        self.state.zeroize();
    }
}

fn check_material(material: &[u8]) -> CryptoResult<()> {
    if material.is_empty() {
        return Err(CryptoError::Format("empty key material".into()));
    }
    Ok(())
}

/// Derive a `len`-character password from `material`.
pub fn encode_password(material: &[u8], len: usize) -> CryptoResult<SecretString> {
    check_material(material)?;

    let mut chain = HashChain::seed(material);
    let mut pool: Vec<&[u8]> = Vec::with_capacity(GROUPS.len());
    let mut out = String::with_capacity(len);

    for _ in 0..len {
        if pool.is_empty() {
            pool.extend_from_slice(&GROUPS);
        }
        let group = pool.remove(chain.next_below(pool.len() as u64) as usize);
        let c = group[chain.next_below(group.len() as u64) as usize];
        out.push(char::from(c));
    }

    Ok(SecretString::from(out))
}

/// Derive a TCP port in `[10000, 20000)` from `material`.
pub fn encode_port(material: &[u8]) -> CryptoResult<u16> {
    check_material(material)?;
    let mut chain = HashChain::seed(material);
    Ok(PORT_BASE + chain.next_below(u64::from(PORT_SPAN)) as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use secrecy::ExposeSecret;

    fn classes(password: &str) -> [bool; 4] {
        [
            password.bytes().any(|b| UPPER.contains(&b)),
            password.bytes().any(|b| LOWER.contains(&b)),
            password.bytes().any(|b| DIGITS.contains(&b)),
            password.bytes().any(|b| SYMBOLS.contains(&b)),
        ]
    }

    #[test]
    fn test_chain_seed_is_55555_rounds() {
        let mut chain = HashChain::seed(b"k");
        let state = digest::iterate(b"password:k", 55_555);
        let expected = u64::from_be_bytes(state[..8].try_into().unwrap()) % 1000;
        assert_eq!(chain.next_below(1000), expected);
    }

    #[test]
    fn test_chain_advances() {
        let mut chain = HashChain::seed(b"k");
        let a = chain.next_below(u64::MAX);
        let b = chain.next_below(u64::MAX);
        assert_ne!(a, b);
    }

    #[test]
    fn test_password_deterministic() {
        let a = encode_password(b"secret-material", 32).unwrap();
        let b = encode_password(b"secret-material", 32).unwrap();
        assert_eq!(a.expose_secret(), b.expose_secret());
        assert_eq!(a.expose_secret().len(), 32);
    }

    #[test]
    fn test_password_order_sensitive() {
        let a = encode_password(b"ab", 16).unwrap();
        let b = encode_password(b"ba", 16).unwrap();
        assert_ne!(a.expose_secret(), b.expose_secret());
    }

    #[test]
    fn test_short_password_is_prefix_of_long() {
        let short = encode_password(b"x", 5).unwrap();
        let long = encode_password(b"x", 20).unwrap();
        assert!(long.expose_secret().starts_with(short.expose_secret()));
    }

    #[test]
    fn test_eight_chars_cover_all_classes() {
        for i in 0..20u8 {
            let pw = encode_password(&[i], 8).unwrap();
            let pw = pw.expose_secret();
            assert_eq!(classes(pw), [true; 4], "password {pw:?}");
            assert_eq!(pw.bytes().filter(|b| UPPER.contains(b)).count(), 2);
            assert_eq!(pw.bytes().filter(|b| LOWER.contains(b)).count(), 4);
        }
    }

    #[test]
    fn test_empty_material_rejected() {
        assert!(encode_password(b"", 8).is_err());
        assert!(encode_port(b"").is_err());
    }

    #[test]
    fn test_port_deterministic() {
        assert_eq!(encode_port(b"abc").unwrap(), encode_port(b"abc").unwrap());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn port_in_range(material in proptest::collection::vec(any::<u8>(), 1..=64)) {
            let port = encode_port(&material).unwrap();
            prop_assert!((10_000..20_000).contains(&port));
        }

        #[test]
        fn password_has_every_class(
            material in proptest::collection::vec(any::<u8>(), 1..=64),
            len in 8usize..=40,
        ) {
            let pw = encode_password(&material, len).unwrap();
            prop_assert_eq!(pw.expose_secret().len(), len);
            prop_assert_eq!(classes(pw.expose_secret()), [true; 4]);
        }
    }
}
