//! Constant-time fixed-base multiplication `gn*G` with a 4-bit comb.
//!
//! The table holds, for each of the 64 nibble positions j, the 16 points
//! `i*16^j*G + U*2^j` where U is a point with unknown discrete log. The U
//! terms cancel across all positions, so no intermediate sum is ever a small
//! multiple of G. Each lookup scans all 16 entries with conditional moves.
//!
//! The scalar is additionally blinded: the context keeps `blind = -b` and
//! `initial = b*G`, and computes `initial + (gn + blind)*G`.

#![forbid(unsafe_code)]

use std::time::Instant;

use subtle::{Choice, ConditionallySelectable};
use tracing::debug;

use crate::rfc6979::Rfc6979HmacSha256;

use super::field::FieldElement;
use super::group::{GroupElement, GroupElementStorage};
use super::jacobian::GroupElementJacobian;
use super::scalar::Scalar;

/// Nibble positions in a 256-bit scalar.
const COMB_TEETH: usize = 64;
/// Entries per position.
const COMB_ENTRIES: usize = 16;

/// The cancelling point: x is the ASCII of "The scalar for this x is unknown",
/// y the even root.
const NUMS: GroupElement = GroupElement {
    x: FieldElement::from_words([
        0x54686520, 0x7363616c, 0x61722066, 0x6f722074, 0x68697320, 0x78206973, 0x20756e6b,
        0x6e6f776e,
    ]),
    y: FieldElement::from_words([
        0x28ebb7e4, 0xe1f6a12e, 0x1c0faaf4, 0x7e09c333, 0x05d50890, 0x856930e6, 0x7e529934,
        0x8ff7f20e,
    ]),
    infinity: false,
};

/// Generator comb table plus the current blinding state.
#[derive(Clone)]
pub struct EcMultGenContext {
    prec: Vec<[GroupElementStorage; COMB_ENTRIES]>,
    blind: Scalar,
    initial: GroupElementJacobian,
}

impl std::fmt::Debug for EcMultGenContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcMultGenContext")
            .field("prec", &self.prec.len())
            .finish_non_exhaustive()
    }
}

impl EcMultGenContext {
    /// Build the comb table and reset blinding to the trivial state.
    pub fn new() -> Self {
        let start = Instant::now();

        // Add G so the cancelling point is not U itself.
        let nums_gej = GroupElementJacobian::from_ge(&NUMS).add_ge_var(&GroupElement::G, None);

        let mut precj = Vec::with_capacity(COMB_TEETH * COMB_ENTRIES);
        let mut gbase = GroupElementJacobian::from_ge(&GroupElement::G);
        let mut numsbase = nums_gej;
        for j in 0..COMB_TEETH {
            // numsbase*2^j + i*gbase
            let mut acc = numsbase;
            precj.push(acc);
            for _ in 1..COMB_ENTRIES {
                acc = acc.add_var(&gbase, None);
                precj.push(acc);
            }
            for _ in 0..4 {
                gbase = gbase.double_var(None);
            }
            numsbase = numsbase.double_var(None);
            if j == COMB_TEETH - 2 {
                // The last position gets (1 - 2^63)*U' so the U' terms sum to zero.
                numsbase = numsbase.negate().add_var(&nums_gej, None);
            }
        }

        let affine = GroupElement::set_all_gej_var(&precj);
        let prec = affine
            .chunks_exact(COMB_ENTRIES)
            .map(|row| {
                let mut out = [GroupElementStorage::default(); COMB_ENTRIES];
                for (slot, p) in out.iter_mut().zip(row) {
                    *slot = p.to_storage();
                }
                out
            })
            .collect();

        let mut ctx = Self {
            prec,
            blind: Scalar::ONE,
            initial: GroupElementJacobian::from_ge(&GroupElement::G.negate()),
        };
        ctx.blind(None);

        debug!(
            teeth = COMB_TEETH,
            entries = COMB_ENTRIES,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "built ecmult_gen comb table"
        );
        ctx
    }

    /// gn*G in constant time.
    pub fn ecmult_gen(&self, gn: &Scalar) -> GroupElementJacobian {
        let mut r = self.initial;
        let mut gnb = gn.add(&self.blind);

        for (j, row) in self.prec.iter().enumerate() {
            let bits = gnb.get_bits(4 * j as u32, 4);
            let mut adds = GroupElementStorage::default();
            for (i, entry) in row.iter().enumerate() {
                adds.conditional_assign(entry, Choice::from((i as u32 == bits) as u8));
            }
            r = r.add_ge(&GroupElement::from_storage(&adds));
        }
        gnb.clear();
        r
    }

    /// Re-randomize the blinding. `None` first resets to the trivial blind
    /// (`initial = -G`, `blind = 1`) and then derives a new one from it alone.
    pub fn blind(&mut self, seed: Option<&[u8; 32]>) {
        if seed.is_none() {
            self.initial = GroupElementJacobian::from_ge(&GroupElement::G.negate());
            self.blind = Scalar::ONE;
        }

        let mut keydata = [0u8; 64];
        keydata[..32].copy_from_slice(&self.blind.to_bytes());
        let keylen = match seed {
            Some(s) => {
                keydata[32..].copy_from_slice(s);
                64
            }
            None => 32,
        };
        let mut rng = Rfc6979HmacSha256::new(&keydata[..keylen]);
        keydata.fill(0);

        // Randomize the Z of the starting point. Each retry below needs an
        // HMAC output >= p (or >= n), so they never loop in practice.
        let mut nonce = [0u8; 32];
        let mut s = loop {
            rng.generate(&mut nonce);
            match FieldElement::from_bytes(&nonce) {
                Some(fe) if !fe.normalizes_to_zero() => break fe,
                _ => continue,
            }
        };
        self.initial.rescale(&s);
        s.clear();

        let mut b = loop {
            rng.generate(&mut nonce);
            let (b, overflow) = Scalar::set_b32(&nonce);
            if !overflow && !b.is_zero() {
                break b;
            }
        };
        rng.finalize();
        nonce.fill(0);

        // initial + (b + blind)*G with the current state is b*G.
        let gb = self.ecmult_gen(&b);
        self.blind = b.negate();
        self.initial = gb;
        b.clear();

        debug!(seeded = seed.is_some(), "reblinded ecmult_gen context");
    }
}

impl Default for EcMultGenContext {
    fn default() -> Self {
        Self::new()
    }
}
