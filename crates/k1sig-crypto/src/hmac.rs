//! HMAC-SHA256 implementation (RFC 2104).

#![forbid(unsafe_code)]

use crate::sha256::{self, Sha256, BLOCK_SIZE, OUTPUT_SIZE};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Incremental HMAC-SHA256.
///
/// HMAC(K, m) = H((K' XOR opad) || H((K' XOR ipad) || m))
/// where K' is the key padded/hashed to block size.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct HmacSha256 {
    inner: Sha256,
    outer: Sha256,
}

impl HmacSha256 {
    /// Start a MAC under `key` (any length).
    pub fn new(key: &[u8]) -> Self {
        let mut key_block = [0u8; BLOCK_SIZE];
        if key.len() > BLOCK_SIZE {
            key_block[..OUTPUT_SIZE].copy_from_slice(&sha256::digest(key));
        } else {
            key_block[..key.len()].copy_from_slice(key);
        }

        let mut pad = [0u8; BLOCK_SIZE];

        let mut outer = Sha256::new();
        for (p, k) in pad.iter_mut().zip(key_block.iter()) {
            *p = k ^ 0x5c;
        }
        outer.update(&pad);

        let mut inner = Sha256::new();
        for (p, k) in pad.iter_mut().zip(key_block.iter()) {
            *p = k ^ 0x36;
        }
        inner.update(&pad);

        pad.zeroize();
        key_block.zeroize();
        Self { inner, outer }
    }

    /// Absorb more message bytes.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    pub fn finalize(self) -> [u8; OUTPUT_SIZE] {
        let inner_hash = self.inner.clone().finalize();
        let mut outer = self.outer.clone();
        outer.update(&inner_hash);
        outer.finalize()
    }
}

/// One-shot HMAC-SHA256.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; OUTPUT_SIZE] {
    let mut mac = HmacSha256::new(key);
    mac.update(data);
    mac.finalize()
}
