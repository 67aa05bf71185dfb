//! SHA-256 implementation (FIPS 180-4).
//!
//! Incremental: `Sha256::new()`, any number of `update` calls, then `finalize`.

#![forbid(unsafe_code)]

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Block size in bytes.
pub const BLOCK_SIZE: usize = 64;

/// Digest size in bytes.
pub const OUTPUT_SIZE: usize = 32;

/// Initial hash values (first 32 bits of fractional parts of square roots of first 8 primes).
const H: [u32; 8] = [
    0x6a09e667, 0xbb67ae85, 0x3c6ef372, 0xa54ff53a,
    0x510e527f, 0x9b05688c, 0x1f83d9ab, 0x5be0cd19,
];

/// Round constants (first 32 bits of fractional parts of cube roots of first 64 primes).
const K: [u32; 64] = [
    0x428a2f98, 0x71374491, 0xb5c0fbcf, 0xe9b5dba5,
    0x3956c25b, 0x59f111f1, 0x923f82a4, 0xab1c5ed5,
    0xd807aa98, 0x12835b01, 0x243185be, 0x550c7dc3,
    0x72be5d74, 0x80deb1fe, 0x9bdc06a7, 0xc19bf174,
    0xe49b69c1, 0xefbe4786, 0x0fc19dc6, 0x240ca1cc,
    0x2de92c6f, 0x4a7484aa, 0x5cb0a9dc, 0x76f988da,
    0x983e5152, 0xa831c66d, 0xb00327c8, 0xbf597fc7,
    0xc6e00bf3, 0xd5a79147, 0x06ca6351, 0x14292967,
    0x27b70a85, 0x2e1b2138, 0x4d2c6dfc, 0x53380d13,
    0x650a7354, 0x766a0abb, 0x81c2c92e, 0x92722c85,
    0xa2bfe8a1, 0xa81a664b, 0xc24b8b70, 0xc76c51a3,
    0xd192e819, 0xd6990624, 0xf40e3585, 0x106aa070,
    0x19a4c116, 0x1e376c08, 0x2748774c, 0x34b0bcb5,
    0x391c0cb3, 0x4ed8aa4a, 0x5b9cca4f, 0x682e6ff3,
    0x748f82ee, 0x78a5636f, 0x84c87814, 0x8cc70208,
    0x90befffa, 0xa4506ceb, 0xbef9a3f7, 0xc67178f2,
];

/// Streaming SHA-256 state.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Sha256 {
    state: [u32; 8],
    buffer: [u8; BLOCK_SIZE],
    /// Total bytes absorbed so far.
    total: u64,
}

impl Default for Sha256 {
    fn default() -> Self {
        Self::new()
    }
}

impl Sha256 {
    pub fn new() -> Self {
        Self {
            state: H,
            buffer: [0u8; BLOCK_SIZE],
            total: 0,
        }
    }

    /// Absorb `data`. May be called any number of times.
    pub fn update(&mut self, mut data: &[u8]) {
        let mut used = (self.total % BLOCK_SIZE as u64) as usize;
        self.total += data.len() as u64;

        if used > 0 {
            let take = (BLOCK_SIZE - used).min(data.len());
            self.buffer[used..used + take].copy_from_slice(&data[..take]);
            used += take;
            data = &data[take..];
            if used < BLOCK_SIZE {
                return;
            }
            let block = self.buffer;
            compress(&mut self.state, &block);
        }

        let mut blocks = data.chunks_exact(BLOCK_SIZE);
        for block in &mut blocks {
            compress(&mut self.state, block);
        }
        let rest = blocks.remainder();
        self.buffer[..rest.len()].copy_from_slice(rest);
    }

    /// Apply FIPS 180-4 padding and return the digest.
    pub fn finalize(mut self) -> [u8; OUTPUT_SIZE] {
        let bit_len = self.total.wrapping_mul(8);

        // 0x80, then zeros until length = 56 (mod 64), then the 64-bit length.
        let used = (self.total % BLOCK_SIZE as u64) as usize;
        let pad_len = if used < 56 { 56 - used } else { 120 - used };
        let mut padding = [0u8; BLOCK_SIZE + 8];
        padding[0] = 0x80;
        padding[pad_len..pad_len + 8].copy_from_slice(&bit_len.to_be_bytes());
        self.update(&padding[..pad_len + 8]);

        let mut result = [0u8; OUTPUT_SIZE];
        for (i, word) in self.state.iter().enumerate() {
            result[i * 4..(i + 1) * 4].copy_from_slice(&word.to_be_bytes());
        }
        result
    }
}

/// Compute SHA-256 digest of input data.
pub fn digest(data: &[u8]) -> [u8; OUTPUT_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize()
}

/// Compress one 512-bit block into the state.
fn compress(state: &mut [u32; 8], block: &[u8]) {
    let mut w = [0u32; 64];

    for (i, chunk) in block.chunks_exact(4).enumerate() {
        w[i] = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
    }

    for i in 16..64 {
        let s0 = w[i - 15].rotate_right(7) ^ w[i - 15].rotate_right(18) ^ (w[i - 15] >> 3);
        let s1 = w[i - 2].rotate_right(17) ^ w[i - 2].rotate_right(19) ^ (w[i - 2] >> 10);
        w[i] = w[i - 16]
            .wrapping_add(s0)
            .wrapping_add(w[i - 7])
            .wrapping_add(s1);
    }

    let [mut a, mut b, mut c, mut d, mut e, mut f, mut g, mut h] = *state;

    for i in 0..64 {
        let s1 = e.rotate_right(6) ^ e.rotate_right(11) ^ e.rotate_right(25);
        let ch = (e & f) ^ (!e & g);
        let t1 = h
            .wrapping_add(s1)
            .wrapping_add(ch)
            .wrapping_add(K[i])
            .wrapping_add(w[i]);
        let s0 = a.rotate_right(2) ^ a.rotate_right(13) ^ a.rotate_right(22);
        let maj = (a & b) ^ (a & c) ^ (b & c);
        let t2 = s0.wrapping_add(maj);

        h = g;
        g = f;
        f = e;
        e = d.wrapping_add(t1);
        d = c;
        c = b;
        b = a;
        a = t1.wrapping_add(t2);
    }

    for (s, v) in state.iter_mut().zip([a, b, c, d, e, f, g, h]) {
        *s = s.wrapping_add(v);
    }
    w.zeroize();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty() {
        assert_eq!(
            hex::encode(digest(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_abc() {
        assert_eq!(
            hex::encode(digest(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_448_bits() {
        let result = digest(b"abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq");
        assert_eq!(
            hex::encode(result),
            "248d6a61d20638b8e5c026930c3e6039a33ce45964ff2167f6ecedd419db06c1"
        );
    }

    #[test]
    fn test_split_updates_match_one_shot() {
        let data: Vec<u8> = (0..300u32).map(|i| (i * 7 + 3) as u8).collect();
        let expected = digest(&data);

        for split in [0usize, 1, 55, 56, 63, 64, 65, 127, 128, 200, 300] {
            let mut hasher = Sha256::new();
            hasher.update(&data[..split]);
            hasher.update(&data[split..]);
            assert_eq!(hasher.finalize(), expected, "split at {split}");
        }

        let mut hasher = Sha256::new();
        for byte in &data {
            hasher.update(std::slice::from_ref(byte));
        }
        assert_eq!(hasher.finalize(), expected);
    }

    #[test]
    fn test_against_sha2_crate() {
        use sha2::{Digest, Sha256 as RefSha256};

        let test_cases = [
            b"".as_slice(),
            b"hello world",
            b"The quick brown fox jumps over the lazy dog",
            &[0u8; 55],
            &[0u8; 64],
            &[0u8; 65],
            &[0u8; 128],
        ];

        for data in test_cases {
            let ours = digest(data);
            let reference: [u8; 32] = RefSha256::digest(data).into();
            assert_eq!(ours, reference, "mismatch for input len {}", data.len());
        }
    }
}
