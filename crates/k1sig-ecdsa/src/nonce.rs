//! Nonce generation for ECDSA signing.

#![forbid(unsafe_code)]

use k1sig_crypto::rfc6979::Rfc6979HmacSha256;
use zeroize::Zeroize;

/// Produces the candidate nonce for one signing attempt.
///
/// `counter` starts at 0 and increases each time the signer rejects the
/// previous candidate; different counters must give different nonces.
/// Returning `false` aborts signing.
pub trait NonceFunction {
    fn try_get_nonce(
        &self,
        nonce32: &mut [u8; 32],
        msg32: &[u8; 32],
        key32: &[u8; 32],
        algo16: Option<&[u8; 16]>,
        counter: u32,
    ) -> bool;
}

/// RFC 6979 nonces from HMAC-SHA256, with optional 32 bytes of extra data
/// (RFC 6979 section 3.6).
#[derive(Clone, Debug, Default)]
pub struct Rfc6979NonceFunction {
    extra: Option<[u8; 32]>,
}

impl Rfc6979NonceFunction {
    pub fn new() -> Self {
        Self { extra: None }
    }

    pub fn with_extra_data(extra: [u8; 32]) -> Self {
        Self { extra: Some(extra) }
    }
}

impl NonceFunction for Rfc6979NonceFunction {
    fn try_get_nonce(
        &self,
        nonce32: &mut [u8; 32],
        msg32: &[u8; 32],
        key32: &[u8; 32],
        algo16: Option<&[u8; 16]>,
        counter: u32,
    ) -> bool {
        // key || msg || extra? || algo?; every part has a fixed length, so
        // different combinations cannot collide.
        let mut keydata = [0u8; 112];
        keydata[..32].copy_from_slice(key32);
        keydata[32..64].copy_from_slice(msg32);
        let mut len = 64;
        if let Some(extra) = &self.extra {
            keydata[len..len + 32].copy_from_slice(extra);
            len += 32;
        }
        if let Some(algo) = algo16 {
            keydata[len..len + 16].copy_from_slice(algo);
            len += 16;
        }

        let mut rng = Rfc6979HmacSha256::new(&keydata[..len]);
        keydata.zeroize();
        for _ in 0..=counter {
            rng.generate(nonce32);
        }
        rng.finalize();
        true
    }
}

/// Hands out one fixed nonce on the first attempt and fails afterwards.
#[derive(Clone)]
pub struct PrecomputedNonceFunction {
    nonce: [u8; 32],
}

impl PrecomputedNonceFunction {
    pub fn new(nonce: [u8; 32]) -> Self {
        Self { nonce }
    }
}

impl std::fmt::Debug for PrecomputedNonceFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrecomputedNonceFunction(..)")
    }
}

impl Drop for PrecomputedNonceFunction {
    fn drop(&mut self) {
        self.nonce.zeroize();
    }
}

impl NonceFunction for PrecomputedNonceFunction {
    fn try_get_nonce(
        &self,
        nonce32: &mut [u8; 32],
        _msg32: &[u8; 32],
        _key32: &[u8; 32],
        _algo16: Option<&[u8; 16]>,
        counter: u32,
    ) -> bool {
        nonce32.copy_from_slice(&self.nonce);
        counter == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_one() -> [u8; 32] {
        let mut k = [0u8; 32];
        k[31] = 1;
        k
    }

    fn satoshi_msg() -> [u8; 32] {
        // SHA-256("Satoshi Nakamoto")
        hex::decode("a0dc65ffca799873cbea0ac274015b9526505daaaed385155425f7337704883e")
            .unwrap()
            .try_into()
            .unwrap()
    }

    #[test]
    fn test_rfc6979_known_nonce() {
        let mut nonce = [0u8; 32];
        assert!(Rfc6979NonceFunction::new().try_get_nonce(
            &mut nonce,
            &satoshi_msg(),
            &key_one(),
            None,
            0
        ));
        assert_eq!(
            hex::encode(nonce),
            "8f8a276c19f4149656b280621e358cce24f5f52542772691ee69063b74f15d15"
        );
    }

    #[test]
    fn test_counter_changes_nonce() {
        let f = Rfc6979NonceFunction::new();
        let mut n0 = [0u8; 32];
        let mut n1 = [0u8; 32];
        let mut n1_again = [0u8; 32];
        f.try_get_nonce(&mut n0, &satoshi_msg(), &key_one(), None, 0);
        f.try_get_nonce(&mut n1, &satoshi_msg(), &key_one(), None, 1);
        f.try_get_nonce(&mut n1_again, &satoshi_msg(), &key_one(), None, 1);
        assert_ne!(n0, n1);
        assert_eq!(n1, n1_again);
    }

    #[test]
    fn test_optional_inputs_are_distinct() {
        let zeros32 = [0u8; 32];
        let zeros16 = [0u8; 16];
        let plain = Rfc6979NonceFunction::new();
        let extra = Rfc6979NonceFunction::with_extra_data([0u8; 32]);

        let mut out = [[0u8; 32]; 4];
        plain.try_get_nonce(&mut out[0], &zeros32, &zeros32, None, 0);
        plain.try_get_nonce(&mut out[1], &zeros32, &zeros32, Some(&zeros16), 0);
        extra.try_get_nonce(&mut out[2], &zeros32, &zeros32, None, 0);
        extra.try_get_nonce(&mut out[3], &zeros32, &zeros32, Some(&zeros16), 0);

        for i in 0..4 {
            for j in 0..i {
                assert_ne!(out[i], out[j]);
            }
        }
    }

    #[test]
    fn test_precomputed_only_first_attempt() {
        let f = PrecomputedNonceFunction::new([7u8; 32]);
        let mut nonce = [0u8; 32];
        assert!(f.try_get_nonce(&mut nonce, &[0u8; 32], &[0u8; 32], None, 0));
        assert_eq!(nonce, [7u8; 32]);
        assert!(!f.try_get_nonce(&mut nonce, &[0u8; 32], &[0u8; 32], None, 1));
        assert_eq!(format!("{f:?}"), "PrecomputedNonceFunction(..)");
    }
}
