//! Recoverable signatures: (r, s) plus the two bits needed to rebuild the
//! nonce point, and public-key recovery from them.

#![forbid(unsafe_code)]

use std::sync::Arc;

use k1sig_core::{Error, Result};
use k1sig_crypto::secp256k1::ecmult::EcMultContext;
use k1sig_crypto::secp256k1::{Context, FieldElement, GroupElement, GroupElementJacobian, Scalar};

use crate::pubkey::{ECPubKey, ORDER_AS_FE, P_MINUS_ORDER};
use crate::signature::SecpECDSASignature;

/// Signature with recovery id. Bit 0 of the id is the parity of the nonce
/// point's y; bit 1 is set when its x was >= n.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SecpRecoverableECDSASignature {
    sig: SecpECDSASignature,
    recid: u8,
}

impl SecpRecoverableECDSASignature {
    pub fn try_new(sig: SecpECDSASignature, recid: u8) -> Option<Self> {
        (recid <= 3).then_some(Self { sig, recid })
    }

    pub fn new(sig: SecpECDSASignature, recid: u8) -> Result<Self> {
        Self::try_new(sig, recid).ok_or(Error::InvalidRecoveryId(recid))
    }

    /// Parse 64 compact bytes plus a recovery id in 0..=3.
    pub fn try_create_from_compact(sig: &[u8], recid: u8) -> Option<Self> {
        let sig = SecpECDSASignature::try_create_from_compact(sig)?;
        Self::try_new(sig, recid)
    }

    pub fn to_compact(&self) -> ([u8; 64], u8) {
        (self.sig.to_compact(), self.recid)
    }

    pub fn recid(&self) -> u8 {
        self.recid
    }

    /// Drop the recovery id.
    pub fn to_signature(&self) -> SecpECDSASignature {
        self.sig
    }
}

impl ECPubKey {
    /// The public key that produced `sig` over `msg32`, if any.
    pub fn try_recover(
        ctx: &Arc<Context>,
        sig: &SecpRecoverableECDSASignature,
        msg32: &[u8],
    ) -> Option<ECPubKey> {
        let msg32 = <&[u8; 32]>::try_from(msg32).ok()?;
        let (message, _) = Scalar::set_b32(msg32);
        let (r, s) = sig.sig.deconstruct();
        let q = ecdsa_sig_recover(ctx.ecmult_context(), &r, &s, &message, sig.recid)?;
        ECPubKey::try_new(q, ctx)
    }

    pub fn recover(
        ctx: &Arc<Context>,
        sig: &SecpRecoverableECDSASignature,
        msg32: &[u8],
    ) -> Result<ECPubKey> {
        Self::try_recover(ctx, sig, msg32).ok_or(Error::InvalidSignature)
    }
}

/// Q = r^-1 * (s*R - m*G), where R is rebuilt from r and `recid`.
fn ecdsa_sig_recover(
    ctx: &EcMultContext,
    sigr: &Scalar,
    sigs: &Scalar,
    message: &Scalar,
    recid: u8,
) -> Option<GroupElement> {
    if sigr.is_zero() || sigs.is_zero() {
        return None;
    }

    let mut fx = FieldElement::from_bytes(&sigr.to_bytes())?;
    if recid & 2 != 0 {
        if fx.cmp_var(&P_MINUS_ORDER).is_ge() {
            return None;
        }
        fx = fx.add(&ORDER_AS_FE).normalize_var();
    }
    let x = GroupElement::try_create_xo_var(&fx, recid & 1 != 0)?;
    let xj = GroupElementJacobian::from_ge(&x);

    let rn = sigr.inverse_var();
    let u1 = rn.mul(message).negate();
    let u2 = rn.mul(sigs);
    let qj = ctx.ecmult(&xj, &u2, &u1);
    if qj.is_infinity() {
        return None;
    }
    Some(qj.to_ge_var())
}
