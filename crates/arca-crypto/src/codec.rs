//! Big-endian byte framing and fixed-size bit arrays
//!
//! All integers on disk and on the wire are big-endian. Strings are framed
//! as `[4: length][length bytes, UTF-8]`; a negative length is malformed.

use crate::error::{CryptoError, CryptoResult};

/// Cursor over a byte slice with checked big-endian reads.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// The unread tail
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    pub fn take(&mut self, n: usize) -> CryptoResult<&'a [u8]> {
        if n > self.remaining() {
            return Err(CryptoError::Format(format!(
                "truncated input: need {n} bytes at offset {}, have {}",
                self.pos,
                self.remaining()
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub fn read_array<const N: usize>(&mut self) -> CryptoResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn read_u8(&mut self) -> CryptoResult<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u32(&mut self) -> CryptoResult<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> CryptoResult<i32> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> CryptoResult<u64> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> CryptoResult<i64> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    /// A signed 32-bit length field; negative values are malformed.
    pub fn read_len(&mut self) -> CryptoResult<usize> {
        let len = self.read_i32()?;
        usize::try_from(len)
            .map_err(|_| CryptoError::Format(format!("negative length field: {len}")))
    }

    /// Read and check a 4-byte signature.
    pub fn expect_signature(&mut self, expected: u32, what: &str) -> CryptoResult<()> {
        let sign = self.read_u32()?;
        if sign != expected {
            return Err(CryptoError::Format(format!(
                "bad {what} signature: expected {expected:#010x}, found {sign:#010x}"
            )));
        }
        Ok(())
    }

    /// Length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> CryptoResult<String> {
        let len = self.read_len()?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| CryptoError::Format(format!("string is not UTF-8: {e}")))
    }
}

/// Growable big-endian writer, the inverse of [`ByteReader`].
#[derive(Debug, Default, Clone)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn put_u8(&mut self, v: u8) -> &mut Self {
        self.buf.push(v);
        self
    }

    pub fn put_u32(&mut self, v: u32) -> &mut Self {
        self.put_bytes(&v.to_be_bytes())
    }

    pub fn put_i32(&mut self, v: i32) -> &mut Self {
        self.put_bytes(&v.to_be_bytes())
    }

    pub fn put_u64(&mut self, v: u64) -> &mut Self {
        self.put_bytes(&v.to_be_bytes())
    }

    pub fn put_i64(&mut self, v: i64) -> &mut Self {
        self.put_bytes(&v.to_be_bytes())
    }

    /// Length-prefixed UTF-8 string
    pub fn put_string(&mut self, s: &str) -> &mut Self {
        self.put_len(s.len()).put_bytes(s.as_bytes())
    }

    /// A 4-byte length field. Panics past `i32::MAX`, which no record format
    /// here can represent.
    pub fn put_len(&mut self, len: usize) -> &mut Self {
        let len = i32::try_from(len).expect("length exceeds i32::MAX");
        self.put_i32(len)
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}

/// A fixed-size array of bits, most significant bit first.
///
/// Insertion shifts the tail right and drops the last bit; deletion shifts
/// the tail left and clears the last bit. The size never changes.
#[derive(Clone, PartialEq, Eq)]
pub struct BitArray<const N: usize> {
    bits: [bool; N],
}

impl<const N: usize> Default for BitArray<N> {
    fn default() -> Self {
        Self { bits: [false; N] }
    }
}

impl<const N: usize> std::fmt::Debug for BitArray<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s: String = self.bits.iter().map(|b| if *b { '1' } else { '0' }).collect();
        write!(f, "BitArray<{N}>({s})")
    }
}

impl<const N: usize> BitArray<N> {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn len(&self) -> usize {
        N
    }

    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    pub fn get(&self, idx: usize) -> bool {
        self.bits[idx]
    }

    pub fn set(&mut self, idx: usize, bit: bool) {
        self.bits[idx] = bit;
    }

    pub fn flip(&mut self, idx: usize) {
        self.bits[idx] = !self.bits[idx];
    }

    /// Insert `bit` at `idx`, shifting `idx..N-1` one place right.
    pub fn insert(&mut self, idx: usize, bit: bool) {
        assert!(idx < N, "insert index {idx} out of range for {N} bits");
        self.bits.copy_within(idx..N - 1, idx + 1);
        self.bits[idx] = bit;
    }

    /// Remove the bit at `idx`, shifting `idx+1..N` one place left.
    pub fn delete(&mut self, idx: usize) -> bool {
        assert!(idx < N, "delete index {idx} out of range for {N} bits");
        let bit = self.bits[idx];
        self.bits.copy_within(idx + 1..N, idx);
        self.bits[N - 1] = false;
        bit
    }

    /// Write the low `len` bits of `value` at `ofs`, MSB first.
    pub fn write_uint(&mut self, ofs: usize, len: usize, value: u32) {
        assert!(len <= 32 && ofs + len <= N);
        for i in 0..len {
            self.bits[ofs + i] = (value >> (len - 1 - i)) & 1 == 1;
        }
    }

    /// Read `len` bits starting at `ofs` as an unsigned integer, MSB first.
    pub fn read_uint(&self, ofs: usize, len: usize) -> u32 {
        assert!(len <= 32 && ofs + len <= N);
        self.bits[ofs..ofs + len]
            .iter()
            .fold(0u32, |acc, bit| (acc << 1) | u32::from(*bit))
    }

    pub fn write_bytes(&mut self, ofs: usize, bytes: &[u8]) {
        for (i, b) in bytes.iter().enumerate() {
            self.write_uint(ofs + i * 8, 8, u32::from(*b));
        }
    }

    pub fn read_bytes(&self, ofs: usize, out: &mut [u8]) {
        for (i, b) in out.iter_mut().enumerate() {
            *b = self.read_uint(ofs + i * 8, 8) as u8;
        }
    }

    /// Copy `len` bits from `src[src_ofs..]` into `self[dst_ofs..]`.
    pub fn copy_from<const M: usize>(
        &mut self,
        dst_ofs: usize,
        src: &BitArray<M>,
        src_ofs: usize,
        len: usize,
    ) {
        self.bits[dst_ofs..dst_ofs + len].copy_from_slice(&src.bits[src_ofs..src_ofs + len]);
    }
}

impl<const N: usize> Drop for BitArray<N> {
    fn drop(&mut self) {
        // bit arrays carry key material during mnemonic coding
        zeroize::Zeroize::zeroize(&mut self.bits);
    }
}
