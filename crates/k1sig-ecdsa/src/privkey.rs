//! Private keys and ECDSA signing.
//!
//! An `ECPrivKey` can be cleared in place; every operation on a cleared key
//! fails (`None`/`false` for the `try_*` forms, `Error::KeyCleared` otherwise).

#![forbid(unsafe_code)]

use std::sync::Arc;

use k1sig_core::{Error, Result};
use k1sig_crypto::secp256k1::ecmult_gen::EcMultGenContext;
use k1sig_crypto::secp256k1::{Context, Scalar};
use subtle::ConstantTimeEq;
use tracing::trace;
use zeroize::Zeroize;

use crate::der;
use crate::nonce::{NonceFunction, Rfc6979NonceFunction};
use crate::pubkey::ECPubKey;
use crate::recovery::SecpRecoverableECDSASignature;
use crate::signature::SecpECDSASignature;

/// A secret scalar in [1, n).
#[derive(Clone)]
pub struct ECPrivKey {
    sec: Scalar,
    cleared: bool,
    ctx: Arc<Context>,
}

impl ECPrivKey {
    /// Key from a scalar already known to be in range. Zero is rejected.
    pub fn try_from_scalar(sec: Scalar, ctx: &Arc<Context>) -> Option<Self> {
        if sec.is_zero() {
            return None;
        }
        Some(Self {
            sec,
            cleared: false,
            ctx: Arc::clone(ctx),
        })
    }

    /// Key from 32 big-endian bytes. Rejects zero and values >= n.
    pub fn try_create(b32: &[u8], ctx: &Arc<Context>) -> Option<Self> {
        let sec = Scalar::try_from(b32).ok()?;
        Self::try_from_scalar(sec, ctx)
    }

    pub fn create(b32: &[u8], ctx: &Arc<Context>) -> Result<Self> {
        let sec = Scalar::try_from(b32)?;
        Self::try_from_scalar(sec, ctx).ok_or(Error::InvalidPrivateKey)
    }

    /// Key from a SEC1 `ECPrivateKey` DER structure.
    pub fn try_create_from_der(der: &[u8], ctx: &Arc<Context>) -> Option<Self> {
        let sec = der::parse_private_key(der)?;
        Self::try_from_scalar(sec, ctx)
    }

    pub fn create_from_der(der: &[u8], ctx: &Arc<Context>) -> Result<Self> {
        Self::try_create_from_der(der, ctx).ok_or(Error::InvalidDer("malformed private key"))
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    /// Wipe the secret. The key is unusable afterwards.
    pub fn clear(&mut self) {
        self.sec.zeroize();
        self.cleared = true;
    }

    fn live(&self) -> Result<&Scalar> {
        if self.cleared {
            Err(Error::KeyCleared)
        } else {
            Ok(&self.sec)
        }
    }

    pub fn to_bytes(&self) -> Result<[u8; 32]> {
        Ok(self.live()?.to_bytes())
    }

    pub fn create_pub_key(&self) -> Result<ECPubKey> {
        let sec = self.live()?;
        let pj = self.ctx.ecmult_gen(sec);
        ECPubKey::new(pj.to_ge(), &self.ctx)
    }

    pub fn try_create_pub_key(&self) -> Option<ECPubKey> {
        self.create_pub_key().ok()
    }

    /// SEC1 DER with explicit curve parameters:
    /// [`der::PRIVKEY_DER_COMPRESSED_LEN`] or [`der::PRIVKEY_DER_UNCOMPRESSED_LEN`] bytes.
    pub fn to_der(&self, compressed: bool) -> Result<Vec<u8>> {
        let pubkey = self.create_pub_key()?;
        let mut sec = self.live()?.to_bytes();
        let out = der::serialize_private_key(&sec, &pubkey.to_bytes(compressed), compressed);
        sec.zeroize();
        Ok(out)
    }

    /// sec + tweak. The tweak must be exactly 32 bytes; fails for a tweak
    /// >= n or a zero result.
    pub fn try_add_tweak(&self, tweak: &[u8]) -> Option<Self> {
        let sec = self.live().ok()?;
        let term = Scalar::try_from(tweak).ok()?;
        Self::try_from_scalar(sec.add(&term), &self.ctx)
    }

    pub fn add_tweak(&self, tweak: &[u8]) -> Result<Self> {
        self.live()?;
        self.try_add_tweak(tweak).ok_or(Error::InvalidTweak)
    }

    /// sec * tweak. The tweak must be exactly 32 bytes; fails for a zero
    /// tweak or a tweak >= n.
    pub fn try_mul_tweak(&self, tweak: &[u8]) -> Option<Self> {
        let sec = self.live().ok()?;
        let factor = Scalar::try_from(tweak).ok()?;
        if factor.is_zero() {
            return None;
        }
        Self::try_from_scalar(sec.mul(&factor), &self.ctx)
    }

    pub fn mul_tweak(&self, tweak: &[u8]) -> Result<Self> {
        self.live()?;
        self.try_mul_tweak(tweak).ok_or(Error::InvalidTweak)
    }

    /// Sign a 32-byte digest with RFC 6979 nonces.
    pub fn sign_ecdsa_rfc6979(&self, msg32: &[u8]) -> Result<SecpECDSASignature> {
        self.live()?;
        if msg32.len() != 32 {
            return Err(Error::InvalidLength {
                expected: 32,
                got: msg32.len(),
            });
        }
        self.try_sign_ecdsa(msg32, None)
            .ok_or(Error::NonceRejected)
    }

    /// Sign a 32-byte digest. `None` for the nonce function means RFC 6979.
    /// The result always has low S.
    pub fn try_sign_ecdsa(
        &self,
        msg32: &[u8],
        nonce_function: Option<&dyn NonceFunction>,
    ) -> Option<SecpECDSASignature> {
        self.try_sign_ecdsa_with_recid(msg32, nonce_function)
            .map(|(sig, _)| sig)
    }

    pub fn try_sign_recoverable(
        &self,
        msg32: &[u8],
        nonce_function: Option<&dyn NonceFunction>,
    ) -> Option<SecpRecoverableECDSASignature> {
        let (sig, recid) = self.try_sign_ecdsa_with_recid(msg32, nonce_function)?;
        SecpRecoverableECDSASignature::try_new(sig, recid)
    }

    /// Sign and also return the recovery id.
    ///
    /// Calls the nonce function with counter 0, 1, ... until a candidate gives
    /// a valid signature or the function declines.
    pub fn try_sign_ecdsa_with_recid(
        &self,
        msg32: &[u8],
        nonce_function: Option<&dyn NonceFunction>,
    ) -> Option<(SecpECDSASignature, u8)> {
        let sec = self.live().ok()?;
        let msg32 = <&[u8; 32]>::try_from(msg32).ok()?;
        let default_fn = Rfc6979NonceFunction::new();
        let nonce_function = nonce_function.unwrap_or(&default_fn);

        let (msg, _) = Scalar::set_b32(msg32);
        let mut seckey = sec.to_bytes();
        let mut nonce32 = [0u8; 32];
        let mut result = None;
        let mut counter = 0u32;

        while nonce_function.try_get_nonce(&mut nonce32, msg32, &seckey, None, counter) {
            let (mut nonce, overflow) = Scalar::set_b32(&nonce32);
            if !overflow && !nonce.is_zero() {
                result = ecdsa_sig_sign(self.ctx.ecmult_gen_context(), sec, &msg, &nonce);
            }
            nonce.zeroize();
            if result.is_some() {
                break;
            }
            trace!(counter, "nonce rejected, retrying");
            counter = counter.wrapping_add(1);
        }

        nonce32.zeroize();
        seckey.zeroize();
        result.map(|(r, s, recid)| (SecpECDSASignature::new(r, s), recid))
    }
}

/// One signing attempt with a given nonce. `None` when r or s is zero.
fn ecdsa_sig_sign(
    ctx: &EcMultGenContext,
    seckey: &Scalar,
    message: &Scalar,
    nonce: &Scalar,
) -> Option<(Scalar, Scalar, u8)> {
    let mut rp = ctx.ecmult_gen(nonce);
    let mut r = rp.to_ge();
    let x = r.x().normalize_var();
    let y = r.y().normalize_var();

    // r = x mod n; x >= n happens for about 1 in 2^127 points.
    let (sigr, overflow) = Scalar::set_b32(&x.to_bytes());
    let mut recid = ((overflow as u8) << 1) | y.is_odd() as u8;
    rp.clear();
    r.clear();
    if sigr.is_zero() {
        return None;
    }

    let mut n = sigr.mul(seckey).add(message);
    let mut sigs = nonce.inverse().mul(&n);
    n.zeroize();
    if sigs.is_zero() {
        return None;
    }
    if sigs.is_high() {
        sigs = sigs.negate();
        recid ^= 1;
    }
    Some((sigr, sigs, recid))
}

impl PartialEq for ECPrivKey {
    fn eq(&self, other: &Self) -> bool {
        self.sec.ct_eq(&other.sec).into()
    }
}

impl Eq for ECPrivKey {}

impl std::fmt::Debug for ECPrivKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ECPrivKey")
            .field("cleared", &self.cleared)
            .finish_non_exhaustive()
    }
}

impl Drop for ECPrivKey {
    fn drop(&mut self) {
        self.sec.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Arc<Context> {
        Context::instance()
    }

    fn b32(hex_str: &str) -> [u8; 32] {
        hex::decode(hex_str).unwrap().try_into().unwrap()
    }

    fn satoshi_msg() -> [u8; 32] {
        b32("a0dc65ffca799873cbea0ac274015b9526505daaaed385155425f7337704883e")
    }

    fn key_one() -> ECPrivKey {
        let mut k = [0u8; 32];
        k[31] = 1;
        ECPrivKey::create(&k, &ctx()).unwrap()
    }

    #[test]
    fn test_known_signature() {
        let (sig, recid) = key_one()
            .try_sign_ecdsa_with_recid(&satoshi_msg(), None)
            .unwrap();
        assert_eq!(
            hex::encode(sig.to_compact()),
            "934b1ea10a4b3c1757e2b0c017d0b6143ce3c9a7e6a4a49860d7a6ab210ee3d8\
             2442ce9d2b916064108014783e923ec36b49743e2ffa1c4496f01a512aafd9e5"
        );
        assert_eq!(recid, 1);
    }

    #[test]
    fn test_known_signature_high_key() {
        let key = ECPrivKey::create(
            &b32("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364140"),
            &ctx(),
        )
        .unwrap();
        let sig = key.sign_ecdsa_rfc6979(&satoshi_msg()).unwrap();
        assert_eq!(
            hex::encode(sig.to_compact()),
            "fd567d121db66e382991534ada77a6bd3106f0a1098c231e47993447cd6af2d0\
             6b39cd0eb1bc8603e159ef5c20a5c8ad685a45b06ce9bebed3f153d10d93bed5"
        );
    }

    #[test]
    fn test_invalid_keys() {
        assert!(ECPrivKey::try_create(&[0u8; 32], &ctx()).is_none());
        assert!(ECPrivKey::try_create(&[0xffu8; 32], &ctx()).is_none());
        assert_eq!(
            ECPrivKey::create(&[0xffu8; 32], &ctx()).unwrap_err(),
            Error::ScalarOutOfRange
        );
        assert_eq!(
            ECPrivKey::create(&[0u8; 32], &ctx()).unwrap_err(),
            Error::InvalidPrivateKey
        );
        assert_eq!(
            ECPrivKey::create(&[1u8; 16], &ctx()).unwrap_err(),
            Error::InvalidLength {
                expected: 32,
                got: 16
            }
        );
        // n itself
        let n = b32("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141");
        assert!(ECPrivKey::try_create(&n, &ctx()).is_none());
    }

    #[test]
    fn test_cleared_key_rejects_everything() {
        let mut key = key_one();
        let copy = key.clone();
        key.clear();
        assert!(key.is_cleared());
        assert!(!copy.is_cleared());

        assert_eq!(key.create_pub_key().unwrap_err(), Error::KeyCleared);
        assert!(key.try_create_pub_key().is_none());
        assert_eq!(key.to_bytes(), Err(Error::KeyCleared));
        assert_eq!(key.to_der(true), Err(Error::KeyCleared));
        assert!(key.try_sign_ecdsa(&satoshi_msg(), None).is_none());
        assert_eq!(
            key.sign_ecdsa_rfc6979(&satoshi_msg()).unwrap_err(),
            Error::KeyCleared
        );
        assert!(key.try_add_tweak(&[1u8; 32]).is_none());
        assert_eq!(key.add_tweak(&[1u8; 32]).unwrap_err(), Error::KeyCleared);
        assert_eq!(key.mul_tweak(&[1u8; 32]).unwrap_err(), Error::KeyCleared);

        // A clone of a cleared key stays cleared.
        assert!(key.clone().try_sign_ecdsa(&satoshi_msg(), None).is_none());
        assert!(copy.try_sign_ecdsa(&satoshi_msg(), None).is_some());
    }

    #[test]
    fn test_sign_rejects_bad_message_length() {
        let key = key_one();
        assert!(key.try_sign_ecdsa(&[], None).is_none());
        assert_eq!(
            key.sign_ecdsa_rfc6979(&[0u8; 33]).unwrap_err(),
            Error::InvalidLength {
                expected: 32,
                got: 33
            }
        );
    }

    #[test]
    fn test_s_zero_retries_then_fails_with_precomputed_nonce() {
        use crate::nonce::PrecomputedNonceFunction;

        let key = key_one();
        let mut nonce = [0u8; 32];
        nonce[31] = 1;
        let nonce2 = b32("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364140");
        // With key 1 and nonce +-1, s = +-(r + m) which is zero for this m.
        let mut msg = b32("8641998106234453aa5f9d6a3178f4f7b812e00b817a776265dfdd31b93e29a9");

        let f1 = PrecomputedNonceFunction::new(nonce);
        let f2 = PrecomputedNonceFunction::new(nonce2);
        assert!(key.try_sign_ecdsa(&msg, Some(&f1)).is_none());
        assert!(key.try_sign_ecdsa(&msg, Some(&f2)).is_none());

        msg[31] = 0xaa;
        let sig = key.try_sign_ecdsa(&msg, Some(&f1)).unwrap();
        let sig2 = key.try_sign_ecdsa(&msg, Some(&f2)).unwrap();
        let pubkey = key.create_pub_key().unwrap();
        assert!(pubkey.sig_verify(&sig, &msg));
        assert!(pubkey.sig_verify(&sig2, &msg));
        assert!(!pubkey.sig_verify(&sig, &[]));
        // k and -k give the same point x, and low-S folds the s values together.
        assert_eq!(sig, sig2);
    }

    #[test]
    fn test_tweak_matches_pubkey_tweak() {
        let key = key_one();
        let pubkey = key.create_pub_key().unwrap();
        let tweak = b32("3982f19bef1615bccfbb05e321c10e1d4cba3df0e841c2e41eeb6016347653c3");

        let added = key.add_tweak(&tweak).unwrap();
        assert_eq!(
            added.create_pub_key().unwrap(),
            pubkey.add_tweak(&tweak).unwrap()
        );

        let multiplied = key.mul_tweak(&tweak).unwrap();
        assert_eq!(
            multiplied.create_pub_key().unwrap(),
            pubkey.mul_tweak(&tweak).unwrap()
        );
    }

    #[test]
    fn test_tweak_to_zero_fails() {
        let key = key_one();
        let minus_one = Scalar::ONE.negate().to_bytes();
        assert!(key.try_add_tweak(&minus_one).is_none());
        assert_eq!(key.add_tweak(&minus_one).unwrap_err(), Error::InvalidTweak);
        assert!(key.try_mul_tweak(&[0u8; 32]).is_none());
    }

    #[test]
    fn test_tweak_must_be_32_bytes() {
        let key = key_one();
        let mut long = [0u8; 33];
        long[31] = 1;
        assert!(key.try_add_tweak(&long).is_none());
        assert!(key.try_mul_tweak(&long).is_none());
        assert_eq!(key.add_tweak(&long[..31]).unwrap_err(), Error::InvalidTweak);
        assert!(key.try_add_tweak(&long[..32]).is_some());
    }

    #[test]
    fn test_der_roundtrip() {
        let key = key_one();
        for compressed in [true, false] {
            let der = key.to_der(compressed).unwrap();
            let expected_len = if compressed {
                der::PRIVKEY_DER_COMPRESSED_LEN
            } else {
                der::PRIVKEY_DER_UNCOMPRESSED_LEN
            };
            assert_eq!(der.len(), expected_len);
            assert_eq!(ECPrivKey::create_from_der(&der, &ctx()).unwrap(), key);
        }
        assert_eq!(
            ECPrivKey::create_from_der(&[0x30], &ctx()).unwrap_err(),
            Error::InvalidDer("malformed private key")
        );
    }

    #[test]
    fn test_equality_and_debug() {
        let a = key_one();
        let b = ECPrivKey::create(&[7u8; 32], &ctx()).unwrap();
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        let dbg = format!("{b:?}");
        assert!(!dbg.contains("07"));
        assert!(dbg.contains("cleared: false"));
    }
}
