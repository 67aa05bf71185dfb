//! Public keys: SEC1 codec, verification and homomorphic tweaks.

#![forbid(unsafe_code)]

use std::sync::Arc;

use k1sig_core::{Error, Result};
use k1sig_crypto::secp256k1::ecmult::EcMultContext;
use k1sig_crypto::secp256k1::{Context, FieldElement, GroupElement, GroupElementJacobian, Scalar};
use tracing::trace;

use crate::signature::SecpECDSASignature;

/// n as a field element.
pub(crate) const ORDER_AS_FE: FieldElement = FieldElement::from_words([
    0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFE, 0xBAAEDCE6, 0xAF48A03B, 0xBFD25E8C, 0xD0364141,
]);

/// p - n. An x coordinate below this may also be r + n.
pub(crate) const P_MINUS_ORDER: FieldElement = FieldElement::from_words([
    0, 0, 0, 1, 0x45512319, 0x50B75FC4, 0x402DA172, 0x2FC9BAEE,
]);

/// A point on the curve other than infinity, tied to a context.
#[derive(Clone)]
pub struct ECPubKey {
    q: GroupElement,
    ctx: Arc<Context>,
}

impl ECPubKey {
    /// Wrap a point. Fails for the point at infinity.
    pub fn try_new(q: GroupElement, ctx: &Arc<Context>) -> Option<Self> {
        if q.is_infinity() {
            return None;
        }
        Some(Self {
            q,
            ctx: Arc::clone(ctx),
        })
    }

    pub fn new(q: GroupElement, ctx: &Arc<Context>) -> Result<Self> {
        Self::try_new(q, ctx).ok_or(Error::PointAtInfinity)
    }

    /// Parse a SEC1 encoding: compressed (0x02/0x03), uncompressed (0x04) or
    /// hybrid (0x06/0x07, whose tag must match the parity of y).
    pub fn try_create(bytes: &[u8], ctx: &Arc<Context>) -> Option<Self> {
        let q = parse_point(bytes)?;
        Self::try_new(q, ctx)
    }

    pub fn create(bytes: &[u8], ctx: &Arc<Context>) -> Result<Self> {
        Self::try_create(bytes, ctx).ok_or(Error::InvalidPublicKey)
    }

    pub fn q(&self) -> &GroupElement {
        &self.q
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.ctx
    }

    pub fn serialize_compressed(&self) -> [u8; 33] {
        let x = self.q.x().normalize_var();
        let y = self.q.y().normalize_var();
        let mut out = [0u8; 33];
        out[0] = if y.is_odd() { 0x03 } else { 0x02 };
        out[1..].copy_from_slice(&x.to_bytes());
        out
    }

    pub fn serialize_uncompressed(&self) -> [u8; 65] {
        let x = self.q.x().normalize_var();
        let y = self.q.y().normalize_var();
        let mut out = [0u8; 65];
        out[0] = 0x04;
        out[1..33].copy_from_slice(&x.to_bytes());
        out[33..].copy_from_slice(&y.to_bytes());
        out
    }

    /// SEC1 bytes: 33 when `compressed`, otherwise 65.
    pub fn to_bytes(&self, compressed: bool) -> Vec<u8> {
        if compressed {
            self.serialize_compressed().to_vec()
        } else {
            self.serialize_uncompressed().to_vec()
        }
    }

    pub fn negate(&self) -> Self {
        Self {
            q: self.q.negate(),
            ctx: Arc::clone(&self.ctx),
        }
    }

    /// Check `sig` against a 32-byte message digest. Accepts high-S signatures.
    pub fn sig_verify(&self, sig: &SecpECDSASignature, msg32: &[u8]) -> bool {
        let Ok(msg32) = <&[u8; 32]>::try_from(msg32) else {
            trace!(len = msg32.len(), "verify: message is not 32 bytes");
            return false;
        };
        let (msg, _) = Scalar::set_b32(msg32);
        let (r, s) = sig.deconstruct();
        ecdsa_sig_verify(self.ctx.ecmult_context(), &r, &s, &self.q, &msg)
    }

    /// P + tweak*G. The tweak must be exactly 32 bytes; fails if it is >= n
    /// or the result is infinity.
    pub fn try_add_tweak(&self, tweak: &[u8]) -> Option<Self> {
        let term = Scalar::try_from(tweak).ok()?;
        let pt = self.ctx.ecmult(
            &GroupElementJacobian::from_ge(&self.q),
            &Scalar::ONE,
            &term,
        );
        if pt.is_infinity() {
            return None;
        }
        Self::try_new(pt.to_ge_var(), &self.ctx)
    }

    pub fn add_tweak(&self, tweak: &[u8]) -> Result<Self> {
        self.try_add_tweak(tweak).ok_or(Error::InvalidTweak)
    }

    /// tweak*P. The tweak must be exactly 32 bytes; fails if it is zero or
    /// >= n.
    pub fn try_mul_tweak(&self, tweak: &[u8]) -> Option<Self> {
        let factor = Scalar::try_from(tweak).ok()?;
        if factor.is_zero() {
            return None;
        }
        let pt = self.ctx.ecmult(
            &GroupElementJacobian::from_ge(&self.q),
            &factor,
            &Scalar::ZERO,
        );
        Self::try_new(pt.to_ge_var(), &self.ctx)
    }

    pub fn mul_tweak(&self, tweak: &[u8]) -> Result<Self> {
        self.try_mul_tweak(tweak).ok_or(Error::InvalidTweak)
    }

    /// Sum of public keys. Fails for an empty list or an infinite sum.
    pub fn try_combine(keys: &[&ECPubKey]) -> Option<Self> {
        let first = keys.first()?;
        let sum = keys.iter().fold(GroupElementJacobian::INFINITY, |acc, k| {
            acc.add_ge_var(&k.q, None)
        });
        if sum.is_infinity() {
            return None;
        }
        Self::try_new(sum.to_ge_var(), &first.ctx)
    }
}

impl PartialEq for ECPubKey {
    fn eq(&self, other: &Self) -> bool {
        self.q == other.q
    }
}

impl Eq for ECPubKey {}

impl std::fmt::Debug for ECPubKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let hex: String = self
            .serialize_compressed()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        f.debug_tuple("ECPubKey").field(&hex).finish()
    }
}

fn parse_point(bytes: &[u8]) -> Option<GroupElement> {
    match (bytes.len(), *bytes.first()?) {
        (33, tag @ (0x02 | 0x03)) => {
            let x = FieldElement::try_from(&bytes[1..]).ok()?;
            GroupElement::try_create_xo_var(&x, tag == 0x03)
        }
        (65, tag @ (0x04 | 0x06 | 0x07)) => {
            let x = FieldElement::try_from(&bytes[1..33]).ok()?;
            let y = FieldElement::try_from(&bytes[33..]).ok()?;
            if tag != 0x04 && y.is_odd() != (tag == 0x07) {
                return None;
            }
            let q = GroupElement::new(x, y);
            q.is_valid_var().then_some(q)
        }
        _ => None,
    }
}

/// Core ECDSA check: x((m/s)*G + (r/s)*P) mod n == r.
///
/// Compares in the field to avoid the inversion: the x coordinate may equal
/// r or, when r < p - n, r + n.
pub(crate) fn ecdsa_sig_verify(
    ctx: &EcMultContext,
    sigr: &Scalar,
    sigs: &Scalar,
    pubkey: &GroupElement,
    message: &Scalar,
) -> bool {
    if sigr.is_zero() || sigs.is_zero() {
        return false;
    }

    let sn = sigs.inverse_var();
    let u1 = sn.mul(message);
    let u2 = sn.mul(sigr);
    let pr = ctx.ecmult(&GroupElementJacobian::from_ge(pubkey), &u2, &u1);
    if pr.is_infinity() {
        return false;
    }

    // r < n < p, so this always parses.
    let Some(xr) = FieldElement::from_bytes(&sigr.to_bytes()) else {
        return false;
    };
    if pr.eq_x_var(&xr) {
        return true;
    }
    if xr.cmp_var(&P_MINUS_ORDER).is_ge() {
        return false;
    }
    let xr = xr.add(&ORDER_AS_FE);
    pr.eq_x_var(&xr)
}
