//! Variable-time multi-scalar multiplication `na*A + ng*G` (Strauss-wNAF).
//!
//! The point scalar is split with the GLV endomorphism into two ~128-bit
//! halves, each driving an odd-multiples table of A (and of lambda*A). The
//! generator scalar is split into 128-bit halves consumed by two precomputed
//! tables, `pre_g` (odd multiples of G) and `pre_g_128` (of 2^128*G).
//!
//! Only for public scalars: the digit sequence and table indices depend on them.

#![forbid(unsafe_code)]

use std::time::Instant;

use tracing::debug;

use super::field::FieldElement;
use super::group::{GroupElement, GroupElementStorage};
use super::jacobian::GroupElementJacobian;
use super::scalar::Scalar;
use super::wnaf::Wnaf;

/// Window for the per-call tables of the point being multiplied.
pub const WINDOW_A: u32 = 5;

/// Window for the precomputed generator tables.
pub const WINDOW_G: u32 = 15;

/// Odd multiples held by a table for window `w`: 1, 3, ..., 2^(w-1) - 1.
pub const fn ecmult_table_size(w: u32) -> usize {
    1 << (w - 2)
}

/// Compute 1*a, 3*a, ..., (2n-1)*a on the isomorphic curve where 2a is affine.
///
/// Returns the table and the Z-ratios between consecutive entries. Only the
/// last entry carries its true Z; the others are short by the factor `(2a).z`.
pub(crate) fn odd_multiples_table(
    n: usize,
    a: &GroupElementJacobian,
) -> (Vec<GroupElementJacobian>, Vec<FieldElement>) {
    debug_assert!(!a.infinity);
    debug_assert!(n > 0);

    let d = a.double_var(None);
    // Perform the additions where d is affine: drop its Z and scale a's x/y to match.
    let d_ge = GroupElement::new(d.x, d.y);
    let a_ge = GroupElement::set_gej_zinv(a, &d.z);

    let mut prej = Vec::with_capacity(n);
    let mut zr = Vec::with_capacity(n);
    prej.push(GroupElementJacobian {
        x: a_ge.x,
        y: a_ge.y,
        z: a.z,
        infinity: false,
    });
    zr.push(d.z);

    for i in 1..n {
        let mut ratio = FieldElement::ONE;
        let next = prej[i - 1].add_ge_var(&d_ge, Some(&mut ratio));
        prej.push(next);
        zr.push(ratio);
    }

    let last = n - 1;
    prej[last].z = prej[last].z.mul(&d.z);
    (prej, zr)
}

/// Odd multiples of `a` for `WINDOW_A`, as affine points sharing the Z returned alongside.
pub(crate) fn odd_multiples_table_globalz_windowa(
    a: &GroupElementJacobian,
) -> (Vec<GroupElement>, FieldElement) {
    let (prej, zr) = odd_multiples_table(ecmult_table_size(WINDOW_A), a);
    GroupElement::globalz_set_table_gej(&prej, &zr)
}

/// Odd multiples of `a`, fully converted to affine storage form.
fn odd_multiples_table_storage_var(n: usize, a: &GroupElementJacobian) -> Vec<GroupElementStorage> {
    let (prej, zr) = odd_multiples_table(n, a);

    // One inversion of the last (true) Z, then walk the ratios down.
    let mut out = vec![GroupElementStorage::default(); n];
    let mut i = n - 1;
    let mut zi = prej[i].z.inverse_var();
    out[i] = GroupElement::set_gej_zinv(&prej[i], &zi).to_storage();
    while i > 0 {
        zi = zi.mul(&zr[i]);
        i -= 1;
        out[i] = GroupElement::set_gej_zinv(&prej[i], &zi).to_storage();
    }
    out
}

/// Table entry for odd digit `n`: the stored point for |n|, negated when n < 0.
fn table_get_ge(pre: &[GroupElement], n: i32, w: u32) -> GroupElement {
    debug_assert!(n & 1 == 1);
    debug_assert!(n.abs() < 1 << (w - 1));
    if n > 0 {
        pre[((n - 1) / 2) as usize]
    } else {
        pre[((-n - 1) / 2) as usize].negate()
    }
}

fn table_get_ge_storage(pre: &[GroupElementStorage], n: i32, w: u32) -> GroupElement {
    debug_assert!(n & 1 == 1);
    debug_assert!(n.abs() < 1 << (w - 1));
    if n > 0 {
        GroupElement::from_storage(&pre[((n - 1) / 2) as usize])
    } else {
        GroupElement::from_storage(&pre[((-n - 1) / 2) as usize]).negate()
    }
}

/// Digit `i` of a var-length encoding; positions past its length are zero.
fn digit(wnaf: &Wnaf, i: usize) -> i32 {
    wnaf.digits().get(i).copied().unwrap_or(0)
}

/// Precomputed generator tables for `ecmult`. Immutable once built.
pub struct EcMultContext {
    pre_g: Vec<GroupElementStorage>,
    pre_g_128: Vec<GroupElementStorage>,
}

impl std::fmt::Debug for EcMultContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EcMultContext")
            .field("pre_g", &self.pre_g.len())
            .field("pre_g_128", &self.pre_g_128.len())
            .finish()
    }
}

impl EcMultContext {
    /// Build both generator tables.
    pub fn new() -> Self {
        let start = Instant::now();
        let size = ecmult_table_size(WINDOW_G);

        let gj = GroupElementJacobian::from_ge(&GroupElement::G);
        let pre_g = odd_multiples_table_storage_var(size, &gj);

        let mut g_128 = gj;
        for _ in 0..128 {
            g_128 = g_128.double_var(None);
        }
        let pre_g_128 = odd_multiples_table_storage_var(size, &g_128);

        debug!(
            entries = size,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "built ecmult generator tables"
        );
        Self { pre_g, pre_g_128 }
    }

    /// na*a + ng*G. Variable time; both scalars are treated as public.
    pub fn ecmult(
        &self,
        a: &GroupElementJacobian,
        na: &Scalar,
        ng: &Scalar,
    ) -> GroupElementJacobian {
        let mut bits = 0usize;

        // Point part: GLV split into halves of at most 129 bits after sign handling.
        let point = if na.is_zero() || a.infinity {
            None
        } else {
            let (na_1, na_lam) = na.split_lambda();
            let wnaf_1 = Wnaf::var(&na_1, 130, WINDOW_A);
            let wnaf_lam = Wnaf::var(&na_lam, 130, WINDOW_A);
            bits = bits.max(wnaf_1.bits()).max(wnaf_lam.bits());

            let (pre_a, z) = odd_multiples_table_globalz_windowa(a);
            let pre_a_lam: Vec<GroupElement> = pre_a.iter().map(|p| p.mul_lambda()).collect();
            Some((wnaf_1, wnaf_lam, pre_a, pre_a_lam, z))
        };
        let z = point
            .as_ref()
            .map_or(FieldElement::ONE, |(_, _, _, _, z)| *z);

        // Generator part: plain 128-bit split against the two fixed tables.
        let (ng_1, ng_128) = ng.split_128();
        let wnaf_ng_1 = Wnaf::var(&ng_1, 129, WINDOW_G);
        let wnaf_ng_128 = Wnaf::var(&ng_128, 129, WINDOW_G);
        bits = bits.max(wnaf_ng_1.bits()).max(wnaf_ng_128.bits());

        let mut r = GroupElementJacobian::INFINITY;
        for i in (0..bits).rev() {
            r = r.double_var(None);

            if let Some((wnaf_1, wnaf_lam, pre_a, pre_a_lam, _)) = &point {
                let n = digit(wnaf_1, i);
                if n != 0 {
                    r = r.add_ge_var(&table_get_ge(pre_a, n, WINDOW_A), None);
                }
                let n = digit(wnaf_lam, i);
                if n != 0 {
                    r = r.add_ge_var(&table_get_ge(pre_a_lam, n, WINDOW_A), None);
                }
            }

            let n = digit(&wnaf_ng_1, i);
            if n != 0 {
                r = r.add_zinv_var(&table_get_ge_storage(&self.pre_g, n, WINDOW_G), &z);
            }
            let n = digit(&wnaf_ng_128, i);
            if n != 0 {
                r = r.add_zinv_var(&table_get_ge_storage(&self.pre_g_128, n, WINDOW_G), &z);
            }
        }

        if !r.infinity {
            r.z = r.z.mul(&z);
        }
        r
    }
}

impl Default for EcMultContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::OnceLock;

    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    /// Shared across tests; building the tables is the slow part.
    pub(crate) fn ctx() -> &'static EcMultContext {
        static CTX: OnceLock<EcMultContext> = OnceLock::new();
        CTX.get_or_init(EcMultContext::new)
    }

    pub(crate) fn gej_from_words(w: [u32; 16]) -> GroupElementJacobian {
        let mut x = [0u32; 8];
        let mut y = [0u32; 8];
        x.copy_from_slice(&w[..8]);
        y.copy_from_slice(&w[8..]);
        GroupElementJacobian::from_ge(&GroupElement::new(
            FieldElement::from_words(x),
            FieldElement::from_words(y),
        ))
    }

    pub(crate) fn random_scalar(rng: &mut ChaCha20Rng) -> Scalar {
        let mut b = [0u8; 32];
        rng.fill_bytes(&mut b);
        Scalar::set_b32(&b).0
    }

    fn assert_same_point(a: &GroupElementJacobian, b: &GroupElementJacobian) {
        assert!(a.add_var(&b.negate(), None).is_infinity());
    }

    fn chain_start() -> (GroupElementJacobian, Scalar, Scalar) {
        let a = gej_from_words([
            0x8b30bbe9, 0xae2a9906, 0x96b22f67, 0x0709dff3, 0x727fd8bc, 0x04d3362c, 0x6c7bf458,
            0xe2846004, 0xa357ae91, 0x5c4a6528, 0x1309edf2, 0x0504740f, 0x0eb33439, 0x90216b4f,
            0x81063cb6, 0x5f2f7e0f,
        ]);
        let xn = Scalar::from_words([
            0x84cc5452, 0xf7fde1ed, 0xb4d38a8c, 0xe9b1b84c, 0xcef31f14, 0x6e569be9, 0x705d357a,
            0x42985407,
        ]);
        let gn = Scalar::from_words([
            0xa1e58d22, 0x553dcd42, 0xb2398062, 0x5d4c57a9, 0x6e9323d4, 0x2b3152e5, 0xca2c3990,
            0xedc7c9de,
        ]);
        (a, xn, gn)
    }

    /// X = xn*X + gn*G repeatedly, then the same point straight from the
    /// accumulated coefficients.
    fn run_chain(iterations: usize) -> GroupElementJacobian {
        let (a, mut xn, mut gn) = chain_start();
        let xf = Scalar::from_u32(0x1337);
        let gf = Scalar::from_u32(0x7113);
        let mut ae = Scalar::ONE;
        let mut ge = Scalar::ZERO;

        let mut x = a;
        for _ in 0..iterations {
            x = ctx().ecmult(&x, &xn, &gn);
            ae = ae.mul(&xn);
            ge = ge.mul(&xn).add(&gn);
            xn = xn.mul(&xf);
            gn = gn.mul(&gf);
        }

        let direct = ctx().ecmult(&a, &ae, &ge);
        assert_same_point(&direct, &x);
        x
    }

    #[test]
    fn test_ecmult_chain_consistency() {
        run_chain(40);
    }

    #[test]
    fn test_ecmult_short_chain_known_result() {
        let x = run_chain(100);
        let expected = gej_from_words([
            0x82A14766, 0x68855317, 0x90874E87, 0x4535B95D, 0x44B5F9AB, 0xB691F06D, 0x8302C8DF,
            0xB199C3D3, 0xCDFCA68C, 0x50557F21, 0xEEECCE5F, 0x4E450668, 0x4602FA1C, 0x24A48F53,
            0x509E1DC4, 0x3C4163F9,
        ]);
        assert_same_point(&expected, &x);
    }

    #[test]
    #[ignore = "20000 multiplications; run with --ignored"]
    fn test_ecmult_chain_known_result() {
        let x = run_chain(20000);
        let expected = gej_from_words([
            0xD6E96687, 0xF9B10D09, 0x2A6F3543, 0x9D86CEBE, 0xA4535D0D, 0x409F5358, 0x6440BD74,
            0xB933E830, 0xB95CBCA2, 0xC77DA786, 0x539BE8FD, 0x53354D2D, 0x3B4F566A, 0xE6580454,
            0x07ED6015, 0xEE1B2A88,
        ]);
        assert_same_point(&expected, &x);
    }

    #[test]
    fn test_point_times_order() {
        let mut rng = ChaCha20Rng::seed_from_u64(12345);
        let mut x = FieldElement::from_int(2);
        let mut checked = 0;
        for _ in 0..40 {
            if let Some(p) = GroupElement::try_create_xo_var(&x, true) {
                assert!(p.is_valid_var());
                let point = GroupElementJacobian::from_ge(&p);

                // k*(P + G) + (n-k)*(P + G) = infinity
                let k = random_scalar(&mut rng);
                let nk = k.negate();
                let r1 = ctx().ecmult(&point, &k, &k);
                let r2 = ctx().ecmult(&point, &nk, &nk);
                assert!(r1.add_var(&r2, None).is_infinity());

                assert!(ctx().ecmult(&point, &Scalar::ZERO, &Scalar::ZERO).is_infinity());
                assert_eq!(ctx().ecmult(&point, &Scalar::ONE, &Scalar::ZERO).to_ge(), p);
                assert_eq!(
                    ctx().ecmult(&point, &Scalar::ZERO, &Scalar::ONE).to_ge(),
                    GroupElement::G
                );
                checked += 1;
            }
            x = x.sqr();
        }
        assert!(checked > 10);
    }

    #[test]
    fn test_infinity_point_uses_generator_only() {
        let k = Scalar::from_u32(3);
        let r = ctx().ecmult(&GroupElementJacobian::INFINITY, &k, &k);
        let three_g = ctx().ecmult(
            &GroupElementJacobian::from_ge(&GroupElement::G),
            &k,
            &Scalar::ZERO,
        );
        assert_same_point(&r, &three_g);
    }

    #[test]
    fn test_lambda_matches_endomorphism() {
        use crate::secp256k1::scalar::LAMBDA;
        let g = GroupElementJacobian::from_ge(&GroupElement::G);
        let r = ctx().ecmult(&g, &LAMBDA, &Scalar::ZERO).to_ge();
        assert_eq!(r, GroupElement::G.mul_lambda());
    }

    #[test]
    fn test_against_k256() {
        use k256::elliptic_curve::ff::PrimeField;
        use k256::elliptic_curve::sec1::ToEncodedPoint;
        use k256::{FieldBytes, ProjectivePoint, Scalar as K256Scalar};

        fn k256_scalar(s: &Scalar) -> K256Scalar {
            Option::<K256Scalar>::from(K256Scalar::from_repr(FieldBytes::from(s.to_bytes())))
                .unwrap()
        }

        let mut rng = ChaCha20Rng::seed_from_u64(99);
        for _ in 0..10 {
            let k = random_scalar(&mut rng);
            let na = random_scalar(&mut rng);
            let ng = random_scalar(&mut rng);

            let p = ctx().ecmult(&GroupElementJacobian::INFINITY, &Scalar::ZERO, &k);
            let r = ctx().ecmult(&p, &na, &ng).to_ge();

            let kp = ProjectivePoint::GENERATOR * k256_scalar(&k);
            let expected = (kp * k256_scalar(&na) + ProjectivePoint::GENERATOR * k256_scalar(&ng))
                .to_affine()
                .to_encoded_point(false);

            let x: [u8; 32] = expected.x().unwrap().as_slice().try_into().unwrap();
            let y: [u8; 32] = expected.y().unwrap().as_slice().try_into().unwrap();
            assert_eq!(r.x().normalize().to_bytes(), x);
            assert_eq!(r.y().normalize().to_bytes(), y);
        }
    }

    #[test]
    fn test_odd_multiples_storage_table() {
        let g = GroupElementJacobian::from_ge(&GroupElement::G);
        let table = odd_multiples_table_storage_var(8, &g);
        let mut acc = g;
        let two_g = g.double_var(None);
        for entry in &table {
            assert_eq!(GroupElement::from_storage(entry), acc.to_ge());
            acc = acc.add_var(&two_g, None);
        }
    }

    #[test]
    fn test_context_debug_hides_tables() {
        let s = format!("{:?}", ctx());
        assert!(s.contains("pre_g: 8192"));
    }
}
