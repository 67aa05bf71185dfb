//! Constant-time single-point multiplication `q*A`.
//!
//! Uses the constant-time wNAF so every digit is odd and nonzero, walks a
//! fixed number of doublings, and reads table entries by scanning the whole
//! table with conditional moves.

#![forbid(unsafe_code)]

use subtle::{Choice, ConditionallySelectable};

use super::ecmult::{ecmult_table_size, odd_multiples_table_globalz_windowa, WINDOW_A};
use super::field::FieldElement;
use super::group::{GroupElement, GroupElementStorage};
use super::jacobian::GroupElementJacobian;
use super::scalar::Scalar;
use super::wnaf::{wnaf_size_bits, Wnaf};

/// Table entry for odd digit `n`, selected without secret-dependent indexing.
fn table_get_ge(pre: &[GroupElement], n: i32) -> GroupElement {
    debug_assert!(n & 1 == 1);
    debug_assert!(n.abs() < 1 << (WINDOW_A - 1));

    let abs_n = n.unsigned_abs();
    let idx_n = abs_n / 2;

    let mut x = FieldElement::ZERO;
    let mut y = FieldElement::ZERO;
    for (m, p) in pre.iter().enumerate() {
        let hit = Choice::from((m as u32 == idx_n) as u8);
        x = FieldElement::conditional_select(&x, &p.x, hit);
        y = FieldElement::conditional_select(&y, &p.y, hit);
    }
    let neg_y = y.negate(1);
    let y = FieldElement::conditional_select(&y, &neg_y, Choice::from((n < 0) as u8));
    GroupElement::new(x, y)
}

/// `scalar * a` in constant time. `size` bounds the bit length of `scalar`;
/// values above 128 use the endomorphism split.
///
/// `a` must not be the point at infinity.
pub fn ecmult_const(a: &GroupElement, scalar: &Scalar, size: u32) -> GroupElementJacobian {
    debug_assert!(!a.infinity);
    let w = WINDOW_A - 1;
    let split = size > 128;

    let (wnaf_1, wnaf_lam, rsize) = if split {
        let (q_1, q_lam) = scalar.split_lambda();
        (
            Wnaf::constant(&q_1, w, 128),
            Some(Wnaf::constant(&q_lam, w, 128)),
            128,
        )
    } else {
        (Wnaf::constant(scalar, w, size), None, size)
    };

    // Odd multiples of a, all brought to the shared Z denominator `z`. The
    // loop below works as if Z were 1 and fixes the result at the end.
    let (mut pre_a, z) = odd_multiples_table_globalz_windowa(&GroupElementJacobian::from_ge(a));
    for p in pre_a.iter_mut() {
        p.y = p.y.normalize_weak();
    }
    let pre_a_lam: Vec<GroupElement> = if split {
        pre_a.iter().map(|p| p.mul_lambda()).collect()
    } else {
        Vec::new()
    };
    debug_assert_eq!(pre_a.len(), ecmult_table_size(WINDOW_A));

    let top = wnaf_size_bits(rsize, w) as usize;

    // The top digit seeds r directly.
    let mut r = GroupElementJacobian::from_ge(&table_get_ge(&pre_a, wnaf_1.digits()[top]));
    if let Some(wnaf_lam) = &wnaf_lam {
        r = r.add_ge(&table_get_ge(&pre_a_lam, wnaf_lam.digits()[top]));
    }

    for i in (0..top).rev() {
        for _ in 0..w {
            r = r.double_nonzero();
        }
        r = r.add_ge(&table_get_ge(&pre_a, wnaf_1.digits()[i]));
        if let Some(wnaf_lam) = &wnaf_lam {
            r = r.add_ge(&table_get_ge(&pre_a_lam, wnaf_lam.digits()[i]));
        }
    }

    r.z = r.z.mul(&z);

    // Undo the skew: subtract a (skew 1) or 2a (skew 2) for each half.
    let a2 = GroupElementJacobian::from_ge(a).double_var(None).to_ge();
    let a_stor = a.to_storage();
    let a2_stor = a2.to_storage();

    let correction_1 = GroupElementStorage::conditional_select(
        &a_stor,
        &a2_stor,
        Choice::from((wnaf_1.skew() == 2) as u8),
    );
    r = r.add_ge(&GroupElement::from_storage(&correction_1).negate());

    if let Some(wnaf_lam) = &wnaf_lam {
        let correction_lam = GroupElementStorage::conditional_select(
            &a_stor,
            &a2_stor,
            Choice::from((wnaf_lam.skew() == 2) as u8),
        );
        r = r.add_ge(
            &GroupElement::from_storage(&correction_lam)
                .negate()
                .mul_lambda(),
        );
    }

    r
}

impl GroupElement {
    /// `scalar * self` in constant time. See [`ecmult_const`].
    pub fn ecmult_const(&self, scalar: &Scalar, size: u32) -> GroupElementJacobian {
        ecmult_const(self, scalar, size)
    }
}
