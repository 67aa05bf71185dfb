//! ECDSA signature value (r, s) and its encodings.

#![forbid(unsafe_code)]

use k1sig_core::{Error, Result};
use k1sig_crypto::secp256k1::Scalar;

use crate::der;

/// An ECDSA signature. Parsing does not canonicalize s; see [`Self::normalize_s`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SecpECDSASignature {
    r: Scalar,
    s: Scalar,
}

impl SecpECDSASignature {
    pub fn new(r: Scalar, s: Scalar) -> Self {
        Self { r, s }
    }

    pub fn r(&self) -> &Scalar {
        &self.r
    }

    pub fn s(&self) -> &Scalar {
        &self.s
    }

    pub fn deconstruct(&self) -> (Scalar, Scalar) {
        (self.r, self.s)
    }

    /// Strict DER parse.
    pub fn try_create_from_der(sig: &[u8]) -> Option<Self> {
        der::parse_signature(sig).map(|(r, s)| Self { r, s })
    }

    pub fn from_der(sig: &[u8]) -> Result<Self> {
        Self::try_create_from_der(sig).ok_or(Error::InvalidDer("malformed signature"))
    }

    pub fn to_der(&self) -> Vec<u8> {
        der::serialize_signature(&self.r, &self.s)
    }

    /// Parse `r || s`, 32 bytes each. Fails if either is >= n.
    pub fn try_create_from_compact(sig: &[u8]) -> Option<Self> {
        if sig.len() != 64 {
            return None;
        }
        let mut rb = [0u8; 32];
        let mut sb = [0u8; 32];
        rb.copy_from_slice(&sig[..32]);
        sb.copy_from_slice(&sig[32..]);
        let r = Scalar::from_bytes(&rb)?;
        let s = Scalar::from_bytes(&sb)?;
        Some(Self { r, s })
    }

    pub fn from_compact(sig: &[u8]) -> Result<Self> {
        if sig.len() != 64 {
            return Err(Error::InvalidLength {
                expected: 64,
                got: sig.len(),
            });
        }
        Self::try_create_from_compact(sig).ok_or(Error::InvalidSignature)
    }

    pub fn to_compact(&self) -> [u8; 64] {
        let mut out = [0u8; 64];
        out[..32].copy_from_slice(&self.r.to_bytes());
        out[32..].copy_from_slice(&self.s.to_bytes());
        out
    }

    pub fn is_low_s(&self) -> bool {
        !self.s.is_high()
    }

    /// The low-S form of this signature, and whether s had to be negated.
    pub fn normalize_s(&self) -> (Self, bool) {
        if self.s.is_high() {
            (
                Self {
                    r: self.r,
                    s: self.s.negate(),
                },
                true,
            )
        } else {
            (*self, false)
        }
    }
}
