//! Affine points on secp256k1: y² = x³ + 7 over GF(p).
//!
//! `GroupElement` is the working affine form; `GroupElementStorage` is the
//! compact, normalized form kept in precomputed tables.

#![forbid(unsafe_code)]

use subtle::{Choice, ConditionallySelectable};

use super::field::{FieldElement, FieldElementStorage};
use super::jacobian::GroupElementJacobian;

/// Curve constant b.
pub(crate) const CURVE_B: u32 = 7;

/// Cube root of unity in GF(p); (x, y) -> (beta*x, y) is multiplication by lambda.
const BETA: FieldElement = FieldElement::from_words([
    0x7AE96A2B, 0x657C0710, 0x6E64479E, 0xAC3434E9, 0x9CF04975, 0x12F58995, 0xC1396C28, 0x719501EE,
]);

/// Affine point, or the point at infinity.
#[derive(Clone, Copy, Debug)]
pub struct GroupElement {
    pub(crate) x: FieldElement,
    pub(crate) y: FieldElement,
    pub(crate) infinity: bool,
}

/// Normalized affine point for tables. Never the point at infinity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GroupElementStorage {
    x: FieldElementStorage,
    y: FieldElementStorage,
}

impl GroupElementStorage {
    pub const fn from_words(x: [u32; 8], y: [u32; 8]) -> Self {
        Self {
            x: FieldElementStorage::from_words(x),
            y: FieldElementStorage::from_words(y),
        }
    }
}

impl ConditionallySelectable for GroupElementStorage {
    fn conditional_select(a: &Self, b: &Self, choice: Choice) -> Self {
        Self {
            x: FieldElementStorage::conditional_select(&a.x, &b.x, choice),
            y: FieldElementStorage::conditional_select(&a.y, &b.y, choice),
        }
    }
}

impl GroupElement {
    /// The generator G.
    pub const G: Self = Self {
        x: FieldElement::from_words([
            0x79BE667E, 0xF9DCBBAC, 0x55A06295, 0xCE870B07, 0x029BFCDB, 0x2DCE28D9, 0x59F2815B,
            0x16F81798,
        ]),
        y: FieldElement::from_words([
            0x483ADA77, 0x26A3C465, 0x5DA4FBFC, 0x0E1108A8, 0xFD17B448, 0xA6855419, 0x9C47D08F,
            0xFB10D4B8,
        ]),
        infinity: false,
    };

    pub const INFINITY: Self = Self {
        x: FieldElement::ZERO,
        y: FieldElement::ZERO,
        infinity: true,
    };

    /// Point from affine coordinates. Does not check the curve equation.
    pub fn new(x: FieldElement, y: FieldElement) -> Self {
        Self {
            x,
            y,
            infinity: false,
        }
    }

    pub fn x(&self) -> FieldElement {
        self.x
    }

    pub fn y(&self) -> FieldElement {
        self.y
    }

    pub fn is_infinity(&self) -> bool {
        self.infinity
    }

    /// The point with this x whose y is a quadratic residue, if x is on the curve.
    pub fn try_create_x_quad(x: &FieldElement) -> Option<Self> {
        let x3 = x.sqr().mul(x);
        let c = x3.add(&FieldElement::from_int(CURVE_B));
        c.sqrt().map(|y| Self::new(*x, y))
    }

    /// The point with this x and the requested y parity, if x is on the curve.
    pub fn try_create_xo_var(x: &FieldElement, odd: bool) -> Option<Self> {
        let mut r = Self::try_create_x_quad(x)?;
        r.y = r.y.normalize_var();
        if r.y.is_odd() != odd {
            r.y = r.y.negate(1);
        }
        Some(r)
    }

    /// Whether this is a finite point satisfying the curve equation.
    pub fn is_valid_var(&self) -> bool {
        if self.infinity {
            return false;
        }
        let y2 = self.y.sqr();
        let x3 = self
            .x
            .sqr()
            .mul(&self.x)
            .add(&FieldElement::from_int(CURVE_B))
            .normalize_weak();
        y2.equals_var(&x3)
    }

    pub fn negate(&self) -> Self {
        Self {
            x: self.x,
            y: self.y.normalize_weak().negate(1),
            infinity: self.infinity,
        }
    }

    /// (beta*x, y), i.e. lambda times this point.
    pub fn mul_lambda(&self) -> Self {
        Self {
            x: self.x.mul(&BETA),
            y: self.y,
            infinity: self.infinity,
        }
    }

    /// Affine form of a Jacobian point given the inverse of its Z.
    pub fn set_gej_zinv(a: &GroupElementJacobian, zi: &FieldElement) -> Self {
        let zi2 = zi.sqr();
        let zi3 = zi2.mul(zi);
        Self {
            x: a.x.mul(&zi2),
            y: a.y.mul(&zi3),
            infinity: a.infinity,
        }
    }

    /// Affine form of a Jacobian point. Constant time in the coordinates.
    pub fn set_gej(a: &GroupElementJacobian) -> Self {
        let zi = a.z.inverse();
        Self::set_gej_zinv(a, &zi)
    }

    pub fn set_gej_var(a: &GroupElementJacobian) -> Self {
        if a.infinity {
            return Self::INFINITY;
        }
        let zi = a.z.inverse_var();
        Self::set_gej_zinv(a, &zi)
    }

    /// Convert many Jacobian points with one field inversion. Points at infinity stay at infinity.
    pub fn set_all_gej_var(a: &[GroupElementJacobian]) -> Vec<Self> {
        let zs: Vec<FieldElement> = a.iter().filter(|p| !p.infinity).map(|p| p.z).collect();
        let mut zinvs = FieldElement::inverse_all_var(&zs).into_iter();

        a.iter()
            .map(|p| {
                if p.infinity {
                    Self::INFINITY
                } else {
                    match zinvs.next() {
                        Some(zi) => Self::set_gej_zinv(p, &zi),
                        None => Self::INFINITY,
                    }
                }
            })
            .collect()
    }

    /// Bring a table of Jacobian points to a shared Z.
    ///
    /// `zr[i]` is the ratio `a[i].z / a[i-1].z`. The returned affine points are
    /// correct on the isomorphic curve where every point has Z = `globalz`.
    pub fn globalz_set_table_gej(
        a: &[GroupElementJacobian],
        zr: &[FieldElement],
    ) -> (Vec<Self>, FieldElement) {
        debug_assert_eq!(a.len(), zr.len());
        let len = a.len();
        if len == 0 {
            return (Vec::new(), FieldElement::ONE);
        }

        let mut r = vec![Self::INFINITY; len];
        let last = len - 1;
        r[last] = Self::new(a[last].x, a[last].y);
        let globalz = a[last].z;

        let mut zs = zr[last];
        let mut i = last;
        while i > 0 {
            if i != last {
                zs = zs.mul(&zr[i]);
            }
            i -= 1;
            r[i] = Self::set_gej_zinv(&a[i], &zs);
        }
        (r, globalz)
    }

    /// Normalize into table form. Must not be the point at infinity.
    pub fn to_storage(&self) -> GroupElementStorage {
        debug_assert!(!self.infinity);
        GroupElementStorage {
            x: self.x.normalize().to_storage(),
            y: self.y.normalize().to_storage(),
        }
    }

    pub fn from_storage(s: &GroupElementStorage) -> Self {
        Self::new(
            FieldElement::from_storage(&s.x),
            FieldElement::from_storage(&s.y),
        )
    }

    pub fn clear(&mut self) {
        self.x.clear();
        self.y.clear();
        self.infinity = false;
    }
}

impl PartialEq for GroupElement {
    /// Equality of the represented points.
    fn eq(&self, other: &Self) -> bool {
        match (self.infinity, other.infinity) {
            (true, true) => true,
            (false, false) => self.x == other.x && self.y == other.y,
            _ => false,
        }
    }
}

impl Eq for GroupElement {}
