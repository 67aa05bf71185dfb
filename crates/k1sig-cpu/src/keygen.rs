//! Random key pairs.

#![forbid(unsafe_code)]

use std::fmt;
use std::sync::Arc;

use k1sig_core::{Error, Result};
use k1sig_ecdsa::{Context, ECPrivKey, ECPubKey};
use rand::{CryptoRng, RngCore};
use tracing::trace;
use zeroize::Zeroize;

/// Candidates drawn before giving up. A working RNG fails a draw with
/// probability about 2^-128.
const MAX_DRAWS: u32 = 64;

/// A freshly generated private key and its public key.
#[derive(Clone)]
pub struct KeyPair {
    pub private_key: ECPrivKey,
    pub public_key: ECPubKey,
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("private_key", &"<redacted>")
            .field("public_key", &self.public_key)
            .finish()
    }
}

/// Draw 32-byte candidates from `rng` until one is a valid private key.
///
/// Fails with `InvalidPrivateKey` only if the RNG keeps producing zero or
/// values >= n.
pub fn generate_keypair<R: RngCore + CryptoRng>(
    rng: &mut R,
    ctx: &Arc<Context>,
) -> Result<KeyPair> {
    let mut candidate = [0u8; 32];
    for draw in 0..MAX_DRAWS {
        rng.fill_bytes(&mut candidate);
        let key = ECPrivKey::try_create(&candidate, ctx);
        candidate.zeroize();
        if let Some(private_key) = key {
            let public_key = private_key.create_pub_key()?;
            return Ok(KeyPair {
                private_key,
                public_key,
            });
        }
        trace!(draw, "key candidate out of range");
    }
    Err(Error::InvalidPrivateKey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    /// Yields a fixed byte pattern.
    struct StuckRng(u8);

    impl RngCore for StuckRng {
        fn next_u32(&mut self) -> u32 {
            u32::from_ne_bytes([self.0; 4])
        }

        fn next_u64(&mut self) -> u64 {
            u64::from_ne_bytes([self.0; 8])
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(self.0);
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    impl CryptoRng for StuckRng {}

    #[test]
    fn test_generated_pair_is_consistent() {
        let ctx = Context::instance();
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        let pair = generate_keypair(&mut rng, &ctx).unwrap();
        assert_eq!(pair.private_key.create_pub_key().unwrap(), pair.public_key);
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        let ctx = Context::instance();
        let a = generate_keypair(&mut ChaCha20Rng::seed_from_u64(9), &ctx).unwrap();
        let b = generate_keypair(&mut ChaCha20Rng::seed_from_u64(9), &ctx).unwrap();
        let c = generate_keypair(&mut ChaCha20Rng::seed_from_u64(10), &ctx).unwrap();
        assert_eq!(a.private_key, b.private_key);
        assert_ne!(a.public_key, c.public_key);
    }

    #[test]
    fn test_broken_rng_gives_up() {
        let ctx = Context::instance();
        assert_eq!(
            generate_keypair(&mut StuckRng(0x00), &ctx).unwrap_err(),
            Error::InvalidPrivateKey
        );
        assert_eq!(
            generate_keypair(&mut StuckRng(0xff), &ctx).unwrap_err(),
            Error::InvalidPrivateKey
        );
        // 0x0101..01 is a valid key.
        assert!(generate_keypair(&mut StuckRng(0x01), &ctx).is_ok());
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let ctx = Context::instance();
        let pair = generate_keypair(&mut StuckRng(0x01), &ctx).unwrap();
        let dbg = format!("{pair:?}");
        assert!(dbg.contains("<redacted>"));
        assert!(!dbg.contains("0101010101"));
    }
}
