//! HMAC-DRBG as used by RFC 6979 deterministic nonce generation.

#![forbid(unsafe_code)]

use crate::hmac::HmacSha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// RFC 6979 section 3.2 generator state (K, V) over HMAC-SHA256.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Rfc6979HmacSha256 {
    v: [u8; 32],
    k: [u8; 32],
    retry: bool,
}

impl Rfc6979HmacSha256 {
    /// Seed the generator with `key` (steps 3.2.b through 3.2.f).
    pub fn new(key: &[u8]) -> Self {
        let mut rng = Self {
            v: [0x01; 32],
            k: [0x00; 32],
            retry: false,
        };
        rng.reseed(Some(key), 0x00);
        rng.reseed(Some(key), 0x01);
        rng
    }

    /// K = HMAC_K(V || sep || key), V = HMAC_K(V).
    fn reseed(&mut self, key: Option<&[u8]>, sep: u8) {
        let mut mac = HmacSha256::new(&self.k);
        mac.update(&self.v);
        mac.update(&[sep]);
        if let Some(key) = key {
            mac.update(key);
        }
        self.k = mac.finalize();
        self.step_v();
    }

    fn step_v(&mut self) {
        let mut mac = HmacSha256::new(&self.k);
        mac.update(&self.v);
        self.v = mac.finalize();
    }

    /// Fill `out` with the next bytes of the stream (step 3.2.h).
    pub fn generate(&mut self, out: &mut [u8]) {
        if self.retry {
            self.reseed(None, 0x00);
        }

        for chunk in out.chunks_mut(32) {
            self.step_v();
            chunk.copy_from_slice(&self.v[..chunk.len()]);
        }

        self.retry = true;
    }

    /// Wipe the generator state.
    pub fn finalize(&mut self) {
        self.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key1() -> Vec<u8> {
        hex::decode(
            "0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f00\
             4bf5122f344554c53bde2ebb8cd2b7e3d1600ad631c385a5d7cce23c7785459a",
        )
        .unwrap()
    }

    const OUT1: [&str; 3] = [
        "4fe29525b2086809159acdf0506efb86b0ec932c7ba44256ab321e421e67e9fb",
        "2bf0fff1d3c378a22dc5de1d856522325c65b504491a0cbd01cb8f3aa67ffd4a",
        "f528b410cb541f77000d7afb6c5b53c5c471eab43e466d9ac5190c39c82fd82e",
    ];

    #[test]
    fn test_rfc6979_vectors_key1() {
        let mut rng = Rfc6979HmacSha256::new(&key1());
        for expected in OUT1 {
            let mut out = [0u8; 32];
            rng.generate(&mut out);
            assert_eq!(hex::encode(out), expected);
        }
    }

    #[test]
    fn test_rfc6979_trailing_byte_changes_stream() {
        let mut key = key1();
        key.push(0x00);
        let mut rng = Rfc6979HmacSha256::new(&key);
        let mut out = [0u8; 32];
        rng.generate(&mut out);
        assert_ne!(hex::encode(out), OUT1[0]);
    }

    #[test]
    fn test_rfc6979_vectors_key2() {
        let mut key = vec![0xffu8; 32];
        key.extend(
            hex::decode("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
                .unwrap(),
        );
        let expected = [
            "9c236c165b82ae0cd590659e100b6bab3036e7ba8b06749baf6981e16f1a2b95",
            "df471061625bc0ea14b682feee2c9c02f235da04204c1d62a1536c6e17aed7a9",
            "7597887cbd76321f32e30440679a22cf7f8d9d2eac390e581fea091ce202ba94",
        ];

        let mut rng = Rfc6979HmacSha256::new(&key);
        for e in expected {
            let mut out = [0u8; 32];
            rng.generate(&mut out);
            assert_eq!(hex::encode(out), e);
        }
        rng.finalize();
        assert_eq!(rng.k, [0u8; 32]);
    }

    #[test]
    fn test_generate_long_output_is_chained_blocks() {
        let mut a = Rfc6979HmacSha256::new(b"seed");
        let mut long = [0u8; 80];
        a.generate(&mut long);

        // A single long request is one V-chain with no reseed in between.
        let mut b = Rfc6979HmacSha256::new(b"seed");
        let mut first = [0u8; 32];
        b.generate(&mut first);
        assert_eq!(&long[..32], &first);
        assert_ne!(&long[32..64], &long[..32]);
    }
}
