//! Points in Jacobian coordinates.
//!
//! (X, Y, Z) represents affine (X/Z², Y/Z³). Several routines report a
//! *Z-ratio*: the factor by which the output Z differs from the left input's Z,
//! which lets callers rebuild a common denominator without extra inversions.
//!
//! Magnitudes after each formula are noted as `(m)` in the comments.

#![forbid(unsafe_code)]

use subtle::{Choice, ConditionallySelectable};

use super::field::FieldElement;
use super::group::GroupElement;

#[derive(Clone, Copy, Debug)]
pub struct GroupElementJacobian {
    pub(crate) x: FieldElement,
    pub(crate) y: FieldElement,
    pub(crate) z: FieldElement,
    pub(crate) infinity: bool,
}

impl GroupElementJacobian {
    pub const INFINITY: Self = Self {
        x: FieldElement::ZERO,
        y: FieldElement::ZERO,
        z: FieldElement::ZERO,
        infinity: true,
    };

    pub fn from_ge(a: &GroupElement) -> Self {
        Self {
            x: a.x,
            y: a.y,
            z: FieldElement::ONE,
            infinity: a.infinity,
        }
    }

    pub fn is_infinity(&self) -> bool {
        self.infinity
    }

    pub fn to_ge(&self) -> GroupElement {
        GroupElement::set_gej(self)
    }

    pub fn to_ge_var(&self) -> GroupElement {
        GroupElement::set_gej_var(self)
    }

    pub fn negate(&self) -> Self {
        Self {
            x: self.x,
            y: self.y.normalize_weak().negate(1),
            z: self.z,
            infinity: self.infinity,
        }
    }

    /// Multiply Z by `s` (nonzero), keeping the represented point.
    pub fn rescale(&mut self, s: &FieldElement) {
        debug_assert!(!self.infinity);
        let zz = s.sqr();
        self.x = self.x.mul(&zz);
        self.y = self.y.mul(&zz).mul(s);
        self.z = self.z.mul(s);
    }

    /// Whether the affine y is a quadratic residue. Avoids the inversion:
    /// y/z³ is a residue iff y*z is.
    pub fn has_quad_y_var(&self) -> bool {
        if self.infinity {
            return false;
        }
        self.y.mul(&self.z).is_quad_var()
    }

    /// Whether the affine x equals `x`. Must not be infinity.
    pub fn eq_x_var(&self, x: &FieldElement) -> bool {
        debug_assert!(!self.infinity);
        let r = self.z.sqr().mul(x);
        let r2 = self.x.normalize_weak();
        r.equals_var(&r2)
    }

    /// 2 * self, for a point known not to be infinity.
    ///
    /// On secp256k1 2Q is infinity only when Q is, so no special case is needed.
    pub fn double_nonzero(&self) -> Self {
        debug_assert!(!self.infinity);
        let z = self.z.mul(&self.y).mul_int(2); // Z' = 2*Y*Z (2)
        let t1 = self.x.sqr().mul_int(3); // T1 = 3*X^2 (3)
        let t2 = t1.sqr(); // T2 = 9*X^4 (1)
        let t3 = self.y.sqr().mul_int(2); // T3 = 2*Y^2 (2)
        let t4 = t3.sqr().mul_int(2); // T4 = 8*Y^4 (2)
        let t3 = t3.mul(&self.x); // T3 = 2*X*Y^2 (1)
        let x = t3.mul_int(4).negate(4).add(&t2); // X' = 9*X^4 - 8*X*Y^2 (6)
        let t2 = t2.negate(1); // T2 = -9*X^4 (2)
        let t3 = t3.mul_int(6).add(&t2); // T3 = 12*X*Y^2 - 9*X^4 (8)
        let y = t1.mul(&t3).add(&t4.negate(2)); // Y' = 36*X^3*Y^2 - 27*X^6 - 8*Y^4 (4)
        Self {
            x,
            y,
            z,
            infinity: false,
        }
    }

    /// 2 * self. If `rzr` is given it receives the Z-ratio.
    pub fn double_var(&self, rzr: Option<&mut FieldElement>) -> Self {
        if self.infinity {
            if let Some(rzr) = rzr {
                *rzr = FieldElement::ONE;
            }
            return Self::INFINITY;
        }
        if let Some(rzr) = rzr {
            *rzr = self.y.normalize_weak().mul_int(2);
        }
        self.double_nonzero()
    }

    /// Shared tail of the variable-time additions, once u1, s1, h and i are known.
    fn add_finish(
        u1: &FieldElement,
        s1: &FieldElement,
        h: &FieldElement,
        i: &FieldElement,
        z: FieldElement,
    ) -> Self {
        let i2 = i.sqr();
        let h2 = h.sqr();
        let h3 = h.mul(&h2);
        let t = u1.mul(&h2);
        let x = t.mul_int(2).add(&h3).negate(3).add(&i2); // (5)
        let y = x.negate(5).add(&t).mul(i);
        let y = y.add(&h3.mul(s1).negate(1)); // (3)
        Self {
            x,
            y,
            z,
            infinity: false,
        }
    }

    /// General addition. `rzr` receives the Z-ratio relative to `self`, which
    /// must not be infinity when a ratio is requested.
    pub fn add_var(&self, b: &Self, rzr: Option<&mut FieldElement>) -> Self {
        if self.infinity {
            debug_assert!(rzr.is_none());
            return *b;
        }
        if b.infinity {
            if let Some(rzr) = rzr {
                *rzr = FieldElement::ONE;
            }
            return *self;
        }

        let z22 = b.z.sqr();
        let z12 = self.z.sqr();
        let u1 = self.x.mul(&z22);
        let u2 = b.x.mul(&z12);
        let s1 = self.y.mul(&z22).mul(&b.z);
        let s2 = b.y.mul(&z12).mul(&self.z);
        let h = u1.negate(1).add(&u2);
        let i = s1.negate(1).add(&s2);

        if h.normalizes_to_zero_var() {
            if i.normalizes_to_zero_var() {
                return self.double_var(rzr);
            }
            if let Some(rzr) = rzr {
                *rzr = FieldElement::ZERO;
            }
            return Self::INFINITY;
        }

        let hz = h.mul(&b.z);
        if let Some(rzr) = rzr {
            *rzr = hz;
        }
        let z = self.z.mul(&hz);
        Self::add_finish(&u1, &s1, &h, &i, z)
    }

    /// Mixed addition with an affine point. Variable time.
    pub fn add_ge_var(&self, b: &GroupElement, rzr: Option<&mut FieldElement>) -> Self {
        if self.infinity {
            debug_assert!(rzr.is_none());
            return Self::from_ge(b);
        }
        if b.infinity {
            if let Some(rzr) = rzr {
                *rzr = FieldElement::ONE;
            }
            return *self;
        }

        let z12 = self.z.sqr();
        let u1 = self.x.normalize_weak();
        let u2 = b.x.mul(&z12);
        let s1 = self.y.normalize_weak();
        let s2 = b.y.mul(&z12).mul(&self.z);
        let h = u1.negate(1).add(&u2);
        let i = s1.negate(1).add(&s2);

        if h.normalizes_to_zero_var() {
            if i.normalizes_to_zero_var() {
                return self.double_var(rzr);
            }
            if let Some(rzr) = rzr {
                *rzr = FieldElement::ZERO;
            }
            return Self::INFINITY;
        }

        if let Some(rzr) = rzr {
            *rzr = h;
        }
        let z = self.z.mul(&h);
        Self::add_finish(&u1, &s1, &h, &i, z)
    }

    /// self + b where b's true Z is 1/`bzinv`. Used to add points from a table
    /// that lives on a different isomorphism than the accumulator.
    pub fn add_zinv_var(&self, b: &GroupElement, bzinv: &FieldElement) -> Self {
        if b.infinity {
            return *self;
        }
        if self.infinity {
            let bzinv2 = bzinv.sqr();
            let bzinv3 = bzinv2.mul(bzinv);
            return Self {
                x: b.x.mul(&bzinv2),
                y: b.y.mul(&bzinv3),
                z: FieldElement::ONE,
                infinity: false,
            };
        }

        let az = self.z.mul(bzinv);
        let z12 = az.sqr();
        let u1 = self.x.normalize_weak();
        let u2 = b.x.mul(&z12);
        let s1 = self.y.normalize_weak();
        let s2 = b.y.mul(&z12).mul(&az);
        let h = u1.negate(1).add(&u2);
        let i = s1.negate(1).add(&s2);

        if h.normalizes_to_zero_var() {
            if i.normalizes_to_zero_var() {
                return self.double_var(None);
            }
            return Self::INFINITY;
        }

        let z = self.z.mul(&h);
        Self::add_finish(&u1, &s1, &h, &i, z)
    }

    /// Mixed addition in constant time. `b` must not be infinity; `self` may be.
    ///
    /// Uses the unified formula, with an alternate expression for lambda when
    /// y1 = -y2 and x1 != x2 (the endomorphism case where R/M is 0/0).
    pub fn add_ge(&self, b: &GroupElement) -> Self {
        debug_assert!(!b.infinity);
        let a_inf = Choice::from(self.infinity as u8);

        let zz = self.z.sqr(); // Z1^2
        let u1 = self.x.normalize_weak(); // U1 = X1 (1)
        let u2 = b.x.mul(&zz); // U2 = X2*Z1^2 (1)
        let s1 = self.y.normalize_weak(); // S1 = Y1 (1)
        let s2 = b.y.mul(&zz).mul(&self.z); // S2 = Y2*Z1^3 (1)
        let t = u1.add(&u2); // T = U1+U2 (2)
        let m = s1.add(&s2); // M = S1+S2 (2)
        let neg_u2 = u2.negate(1); // -U2 (2)
        let tt = u1.mul(&neg_u2); // -U1*U2 (1)
        let rr = t.sqr().add(&tt); // R = T^2-U1*U2 (2)

        let degenerate = Choice::from((m.normalizes_to_zero() & rr.normalizes_to_zero()) as u8);
        let rr_alt = s1.mul_int(2); // Y1 - Y2 when degenerate (2)
        let m_alt = neg_u2.add(&u1); // U1 - U2 (3)

        // From here Ralt/Malt is lambda and never 0/0.
        let rr_alt = FieldElement::conditional_select(&rr_alt, &rr, !degenerate);
        let m_alt = FieldElement::conditional_select(&m_alt, &m, !degenerate);

        let n = m_alt.sqr(); // Malt^2 (1)
        let q = n.mul(&t); // Q = T*Malt^2 (1)
        // M is either Malt or zero, so M^3*Malt is Malt^4 or zero.
        let n = FieldElement::conditional_select(&n.sqr(), &m, degenerate);
        let t = rr_alt.sqr(); // Ralt^2 (1)
        let z = self.z.mul(&m_alt); // Malt*Z (1)
        let infinity = z.normalizes_to_zero() & !self.infinity;
        let z = z.mul_int(2); // Z3 = 2*Malt*Z (2)
        let q = q.negate(1); // -Q (2)
        let t = t.add(&q).normalize_weak(); // Ralt^2-Q (1)
        let x = t;
        let t = t.mul_int(2).add(&q).mul(&rr_alt).add(&n); // Ralt*(2*x3 - Q) + M^3*Malt (3)
        let y = t.negate(3).normalize_weak(); // (1)
        let x = x.mul_int(4); // X3 = 4*(Ralt^2-Q) (4)
        let y = y.mul_int(4); // Y3 = 4*Ralt*(Q - 2x3) - 4*M^3*Malt (4)

        // self at infinity: the result is b.
        Self {
            x: FieldElement::conditional_select(&x, &b.x, a_inf),
            y: FieldElement::conditional_select(&y, &b.y, a_inf),
            z: FieldElement::conditional_select(&z, &FieldElement::ONE, a_inf),
            infinity,
        }
    }

    pub fn clear(&mut self) {
        self.x.clear();
        self.y.clear();
        self.z.clear();
        self.infinity = false;
    }
}
