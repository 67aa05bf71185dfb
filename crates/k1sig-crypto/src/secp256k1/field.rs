//! Field arithmetic modulo p = 2^256 - 2^32 - 977.
//!
//! Elements are kept in 5 limbs of 52 bits (the top limb holds 48), leaving
//! 12 spare bits per limb so additions can be chained without carrying.
//! Every value tracks a *magnitude* (how many multiples of p the limbs may
//! exceed a reduced value by) and whether it is fully *normalized*.
//!
//! Multiplication inputs must have magnitude at most 8; `negate(m)` needs
//! `m >= magnitude`. Byte serialization, parity and zero tests require a
//! normalized element.

#![forbid(unsafe_code)]

use std::cmp::Ordering;

use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};
use zeroize::Zeroize;

/// Mask for a 52-bit limb.
const M52: u64 = 0xFFFFFFFFFFFFF;
/// Mask for the 48-bit top limb.
const M48: u64 = 0x0FFFFFFFFFFFF;
/// 2^256 mod p, used to fold the bits above 2^256 back in.
const FOLD: u64 = 0x1000003D1;
/// FOLD shifted by 4 bits; used by the multiplication reduction.
const R: u64 = 0x1000003D10;

/// Lowest limb of p.
const P0: u64 = 0xFFFFEFFFFFC2F;

/// Element of GF(p).
#[derive(Clone, Copy, Debug, Zeroize)]
pub struct FieldElement {
    n: [u64; 5],
    magnitude: u32,
    normalized: bool,
}

/// Canonical, fully reduced 4x64 form used in precomputed tables.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroize)]
pub struct FieldElementStorage {
    n: [u64; 4],
}

impl FieldElementStorage {
    /// Build from big-endian 32-bit words (`w[0]` most significant).
    pub const fn from_words(w: [u32; 8]) -> Self {
        Self {
            n: words_to_u64(w),
        }
    }
}

impl ConditionallySelectable for FieldElementStorage {
    fn conditional_select(a: &Self, b: &Self, choice: Choice) -> Self {
        Self {
            n: [
                u64::conditional_select(&a.n[0], &b.n[0], choice),
                u64::conditional_select(&a.n[1], &b.n[1], choice),
                u64::conditional_select(&a.n[2], &b.n[2], choice),
                u64::conditional_select(&a.n[3], &b.n[3], choice),
            ],
        }
    }
}

const fn words_to_u64(w: [u32; 8]) -> [u64; 4] {
    [
        (w[7] as u64) | ((w[6] as u64) << 32),
        (w[5] as u64) | ((w[4] as u64) << 32),
        (w[3] as u64) | ((w[2] as u64) << 32),
        (w[1] as u64) | ((w[0] as u64) << 32),
    ]
}

const fn split_u64(w: [u64; 4]) -> [u64; 5] {
    [
        w[0] & M52,
        ((w[0] >> 52) | (w[1] << 12)) & M52,
        ((w[1] >> 40) | (w[2] << 24)) & M52,
        ((w[2] >> 28) | (w[3] << 36)) & M52,
        w[3] >> 16,
    ]
}

impl Default for FieldElement {
    fn default() -> Self {
        Self::ZERO
    }
}

impl FieldElement {
    pub const ZERO: Self = Self::from_int(0);
    pub const ONE: Self = Self::from_int(1);

    /// Build from big-endian 32-bit words (`w[0]` most significant).
    ///
    /// The value must already be below p; this is meant for known constants.
    pub const fn from_words(w: [u32; 8]) -> Self {
        Self {
            n: split_u64(words_to_u64(w)),
            magnitude: 1,
            normalized: true,
        }
    }

    /// Small integer constant.
    pub const fn from_int(a: u32) -> Self {
        Self {
            n: [a as u64, 0, 0, 0, 0],
            magnitude: 1,
            normalized: true,
        }
    }

    /// Parse 32 big-endian bytes. Returns None if the value is >= p.
    pub fn from_bytes(bytes: &[u8; 32]) -> Option<Self> {
        let mut w = [0u64; 4];
        for (i, chunk) in bytes.chunks_exact(8).enumerate() {
            let mut b = [0u8; 8];
            b.copy_from_slice(chunk);
            w[3 - i] = u64::from_be_bytes(b);
        }
        let n = split_u64(w);
        let overflow =
            n[4] == M48 && (n[3] & n[2] & n[1]) == M52 && n[0] >= P0;
        if overflow {
            return None;
        }
        Some(Self {
            n,
            magnitude: 1,
            normalized: true,
        })
    }

    fn to_u64(self) -> [u64; 4] {
        let n = self.n;
        [
            n[0] | (n[1] << 52),
            (n[1] >> 12) | (n[2] << 40),
            (n[2] >> 24) | (n[3] << 28),
            (n[3] >> 36) | (n[4] << 16),
        ]
    }

    /// Serialize to 32 big-endian bytes. Requires a normalized element.
    pub fn to_bytes(&self) -> [u8; 32] {
        debug_assert!(self.normalized, "to_bytes on unnormalized field element");
        let w = self.to_u64();
        let mut out = [0u8; 32];
        for i in 0..4 {
            out[i * 8..(i + 1) * 8].copy_from_slice(&w[3 - i].to_be_bytes());
        }
        out
    }

    pub fn to_storage(&self) -> FieldElementStorage {
        debug_assert!(self.normalized, "to_storage on unnormalized field element");
        FieldElementStorage { n: self.to_u64() }
    }

    pub fn from_storage(s: &FieldElementStorage) -> Self {
        Self {
            n: split_u64(s.n),
            magnitude: 1,
            normalized: true,
        }
    }

    pub fn magnitude(&self) -> u32 {
        self.magnitude
    }

    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    /// Checks the limb bounds implied by the tracked magnitude.
    fn verify(&self) -> bool {
        let m = if self.normalized {
            1
        } else {
            2 * self.magnitude as u64
        };
        let mut ok = self.n[..4].iter().all(|&l| l <= M52 * m) && self.n[4] <= M48 * m;
        if self.normalized {
            ok &= self.magnitude <= 1;
            if self.n[4] == M48 && (self.n[3] & self.n[2] & self.n[1]) == M52 {
                ok &= self.n[0] < P0;
            }
        }
        ok
    }

    /// Fully reduce to the unique representative in [0, p). Constant time.
    pub fn normalize(&self) -> Self {
        let [mut t0, mut t1, mut t2, mut t3, mut t4] = self.n;

        // Reduce t4 first so the first pass carries at most once.
        let mut x = t4 >> 48;
        t4 &= M48;

        t0 += x * FOLD;
        t1 += t0 >> 52;
        t0 &= M52;
        t2 += t1 >> 52;
        t1 &= M52;
        let mut m = t1;
        t3 += t2 >> 52;
        t2 &= M52;
        m &= t2;
        t4 += t3 >> 52;
        t3 &= M52;
        m &= t3;

        debug_assert!(t4 >> 49 == 0);

        // At most one more subtraction of p.
        x = (t4 >> 48)
            | ((t4 == M48) as u64 & (m == M52) as u64 & (t0 >= P0) as u64);

        t0 += x * FOLD;
        t1 += t0 >> 52;
        t0 &= M52;
        t2 += t1 >> 52;
        t1 &= M52;
        t3 += t2 >> 52;
        t2 &= M52;
        t4 += t3 >> 52;
        t3 &= M52;

        debug_assert!(t4 >> 48 == x);
        t4 &= M48;

        Self {
            n: [t0, t1, t2, t3, t4],
            magnitude: 1,
            normalized: true,
        }
    }

    /// Reduce to magnitude 1 without guaranteeing a value below p.
    pub fn normalize_weak(&self) -> Self {
        let [mut t0, mut t1, mut t2, mut t3, mut t4] = self.n;

        let x = t4 >> 48;
        t4 &= M48;

        t0 += x * FOLD;
        t1 += t0 >> 52;
        t0 &= M52;
        t2 += t1 >> 52;
        t1 &= M52;
        t3 += t2 >> 52;
        t2 &= M52;
        t4 += t3 >> 52;
        t3 &= M52;

        debug_assert!(t4 >> 49 == 0);

        Self {
            n: [t0, t1, t2, t3, t4],
            magnitude: 1,
            normalized: self.normalized,
        }
    }

    /// Same result as `normalize`, but branches on the value.
    pub fn normalize_var(&self) -> Self {
        let [mut t0, mut t1, mut t2, mut t3, mut t4] = self.n;

        let mut x = t4 >> 48;
        t4 &= M48;

        t0 += x * FOLD;
        t1 += t0 >> 52;
        t0 &= M52;
        t2 += t1 >> 52;
        t1 &= M52;
        let mut m = t1;
        t3 += t2 >> 52;
        t2 &= M52;
        m &= t2;
        t4 += t3 >> 52;
        t3 &= M52;
        m &= t3;

        x = (t4 >> 48) | ((t4 == M48 && m == M52 && t0 >= P0) as u64);

        if x != 0 {
            t0 += FOLD;
            t1 += t0 >> 52;
            t0 &= M52;
            t2 += t1 >> 52;
            t1 &= M52;
            t3 += t2 >> 52;
            t2 &= M52;
            t4 += t3 >> 52;
            t3 &= M52;
            t4 &= M48;
        }

        Self {
            n: [t0, t1, t2, t3, t4],
            magnitude: 1,
            normalized: true,
        }
    }

    /// Whether the value is congruent to zero, without producing the normalized form.
    pub fn normalizes_to_zero(&self) -> bool {
        let [mut t0, mut t1, mut t2, mut t3, mut t4] = self.n;

        let x = t4 >> 48;
        t4 &= M48;

        // z0 tracks a raw value of 0, z1 a raw value of p.
        t0 += x * FOLD;
        t1 += t0 >> 52;
        t0 &= M52;
        let mut z0 = t0;
        let mut z1 = t0 ^ 0x1000003D0;
        t2 += t1 >> 52;
        t1 &= M52;
        z0 |= t1;
        z1 &= t1;
        t3 += t2 >> 52;
        t2 &= M52;
        z0 |= t2;
        z1 &= t2;
        t4 += t3 >> 52;
        t3 &= M52;
        z0 |= t3;
        z1 &= t3;
        z0 |= t4;
        z1 &= t4 ^ 0xF000000000000;

        (z0 == 0) | (z1 == M52)
    }

    /// Variable-time `normalizes_to_zero`; exits early on the common nonzero case.
    pub fn normalizes_to_zero_var(&self) -> bool {
        let mut t0 = self.n[0];
        let mut t4 = self.n[4];

        let x = t4 >> 48;
        t0 += x * FOLD;

        let mut z0 = t0 & M52;
        let mut z1 = z0 ^ 0x1000003D0;

        if z0 != 0 && z1 != M52 {
            return false;
        }

        let mut t1 = self.n[1];
        let mut t2 = self.n[2];
        let mut t3 = self.n[3];

        t4 &= M48;

        t1 += t0 >> 52;
        t2 += t1 >> 52;
        t1 &= M52;
        z0 |= t1;
        z1 &= t1;
        t3 += t2 >> 52;
        t2 &= M52;
        z0 |= t2;
        z1 &= t2;
        t4 += t3 >> 52;
        t3 &= M52;
        z0 |= t3;
        z1 &= t3;
        z0 |= t4;
        z1 &= t4 ^ 0xF000000000000;

        (z0 == 0) || (z1 == M52)
    }

    /// Requires a normalized element.
    pub fn is_zero(&self) -> bool {
        debug_assert!(self.normalized);
        (self.n[0] | self.n[1] | self.n[2] | self.n[3] | self.n[4]) == 0
    }

    /// Requires a normalized element.
    pub fn is_odd(&self) -> bool {
        debug_assert!(self.normalized);
        self.n[0] & 1 == 1
    }

    /// Compare two normalized elements as integers.
    pub fn cmp_var(&self, other: &Self) -> Ordering {
        debug_assert!(self.normalized && other.normalized);
        for i in (0..5).rev() {
            match self.n[i].cmp(&other.n[i]) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }

    /// Equality for public data; `self` must have magnitude 1.
    pub fn equals_var(&self, other: &Self) -> bool {
        self.negate(1).add(other).normalizes_to_zero_var()
    }

    /// -self, given that self has magnitude at most `m`. Result has magnitude m + 1.
    pub fn negate(&self, m: u32) -> Self {
        debug_assert!(self.magnitude <= m);
        let k = 2 * (m as u64 + 1);
        let r = Self {
            n: [
                P0 * k - self.n[0],
                M52 * k - self.n[1],
                M52 * k - self.n[2],
                M52 * k - self.n[3],
                M48 * k - self.n[4],
            ],
            magnitude: m + 1,
            normalized: false,
        };
        debug_assert!(r.verify());
        r
    }

    /// self * a for a small integer a. Magnitude scales by a.
    pub fn mul_int(&self, a: u32) -> Self {
        let a64 = a as u64;
        let r = Self {
            n: self.n.map(|l| l * a64),
            magnitude: self.magnitude * a,
            normalized: false,
        };
        debug_assert!(r.verify());
        r
    }

    /// self + other. Magnitudes add.
    pub fn add(&self, other: &Self) -> Self {
        let r = Self {
            n: [
                self.n[0] + other.n[0],
                self.n[1] + other.n[1],
                self.n[2] + other.n[2],
                self.n[3] + other.n[3],
                self.n[4] + other.n[4],
            ],
            magnitude: self.magnitude + other.magnitude,
            normalized: false,
        };
        debug_assert!(r.verify());
        r
    }

    /// self - other, given other has magnitude at most `m`.
    pub fn sub(&self, other: &Self, m: u32) -> Self {
        self.add(&other.negate(m))
    }

    /// Multiplication. Both inputs magnitude <= 8; result magnitude 1.
    pub fn mul(&self, other: &Self) -> Self {
        debug_assert!(self.magnitude <= 8 && other.magnitude <= 8);
        debug_assert!(self.verify() && other.verify());
        let r = Self {
            n: mul_inner(&self.n, &other.n),
            magnitude: 1,
            normalized: false,
        };
        debug_assert!(r.verify());
        r
    }

    /// Squaring. Input magnitude <= 8; result magnitude 1.
    pub fn sqr(&self) -> Self {
        self.mul(self)
    }

    fn sqr_n(&self, n: usize) -> Self {
        let mut r = *self;
        for _ in 0..n {
            r = r.sqr();
        }
        r
    }

    /// x^(2^k - 1) for the block lengths shared by `inverse` and `sqrt`.
    fn pow_blocks(&self) -> (Self, Self, Self, Self, Self) {
        let x2 = self.sqr().mul(self);
        let x3 = x2.sqr().mul(self);
        let x6 = x3.sqr_n(3).mul(&x3);
        let x9 = x6.sqr_n(3).mul(&x3);
        let x11 = x9.sqr_n(2).mul(&x2);
        let x22 = x11.sqr_n(11).mul(&x11);
        let x44 = x22.sqr_n(22).mul(&x22);
        let x88 = x44.sqr_n(44).mul(&x44);
        let x176 = x88.sqr_n(88).mul(&x88);
        let x220 = x176.sqr_n(44).mul(&x44);
        let x223 = x220.sqr_n(3).mul(&x3);
        (x2, x3, x22, x223, *self)
    }

    /// Square root, if one exists. The returned root is either of the two.
    ///
    /// Computes self^((p+1)/4); the exponent has 1-blocks of length 2, 22 and 223.
    pub fn sqrt(&self) -> Option<Self> {
        let (x2, _x3, x22, x223, _) = self.pow_blocks();

        let mut t1 = x223.sqr_n(23).mul(&x22);
        t1 = t1.sqr_n(6).mul(&x2);
        t1 = t1.sqr();
        let r = t1.sqr();

        if r.sqr().ct_eq(self).into() {
            Some(r)
        } else {
            None
        }
    }

    /// Whether a square root exists.
    pub fn is_quad_var(&self) -> bool {
        self.sqrt().is_some()
    }

    /// Multiplicative inverse via self^(p-2). Inverse of zero is zero. Constant time.
    ///
    /// The exponent has 1-blocks of length 1, 2, 22 and 223.
    pub fn inverse(&self) -> Self {
        let (x2, _x3, x22, x223, a) = self.pow_blocks();

        let mut t1 = x223.sqr_n(23).mul(&x22);
        t1 = t1.sqr_n(5).mul(&a);
        t1 = t1.sqr_n(3).mul(&x2);
        t1 = t1.sqr_n(2);
        a.mul(&t1)
    }

    pub fn inverse_var(&self) -> Self {
        self.inverse()
    }

    /// Invert every element with a single inversion (Montgomery's trick).
    /// No input may be zero.
    pub fn inverse_all_var(a: &[Self]) -> Vec<Self> {
        let len = a.len();
        if len == 0 {
            return Vec::new();
        }

        let mut r = Vec::with_capacity(len);
        r.push(a[0]);
        for i in 1..len {
            let prev = r[i - 1].mul(&a[i]);
            r.push(prev);
        }

        let mut u = r[len - 1].inverse_var();
        let mut i = len - 1;
        while i > 0 {
            r[i] = r[i - 1].mul(&u);
            u = u.mul(&a[i]);
            i -= 1;
        }
        r[0] = u;
        r
    }

    /// Overwrite with zero.
    pub fn clear(&mut self) {
        self.zeroize();
        self.normalized = true;
    }
}

impl ConditionallySelectable for FieldElement {
    /// Selects `b` when `choice` is set. The tracked magnitude is the larger of the two.
    fn conditional_select(a: &Self, b: &Self, choice: Choice) -> Self {
        Self {
            n: [
                u64::conditional_select(&a.n[0], &b.n[0], choice),
                u64::conditional_select(&a.n[1], &b.n[1], choice),
                u64::conditional_select(&a.n[2], &b.n[2], choice),
                u64::conditional_select(&a.n[3], &b.n[3], choice),
                u64::conditional_select(&a.n[4], &b.n[4], choice),
            ],
            magnitude: a.magnitude.max(b.magnitude),
            normalized: a.normalized && b.normalized,
        }
    }
}

impl ConstantTimeEq for FieldElement {
    /// Value equality; both sides are normalized internally.
    fn ct_eq(&self, other: &Self) -> Choice {
        let a = self.normalize();
        let b = other.normalize();
        a.n[0].ct_eq(&b.n[0])
            & a.n[1].ct_eq(&b.n[1])
            & a.n[2].ct_eq(&b.n[2])
            & a.n[3].ct_eq(&b.n[3])
            & a.n[4].ct_eq(&b.n[4])
    }
}

impl PartialEq for FieldElement {
    fn eq(&self, other: &Self) -> bool {
        self.ct_eq(other).into()
    }
}

impl Eq for FieldElement {}

/// 5x52 schoolbook product with the reduction by 2^256 = 0x1000003D1 (mod p)
/// interleaved, so no intermediate exceeds 128 bits.
///
/// Notation in comments: [.. a b c] means .. + a<<104 + b<<52 + c.
fn mul_inner(a: &[u64; 5], b: &[u64; 5]) -> [u64; 5] {
    let [a0, a1, a2, a3, a4] = a.map(|x| x as u128);
    let [b0, b1, b2, b3, b4] = b.map(|x| x as u128);
    let m = M52 as u128;
    let r = R as u128;

    // [d 0 0 0] = [p3 0 0 0]
    let mut d = a0 * b3 + a1 * b2 + a2 * b1 + a3 * b0;
    // [c 0 0 0 0 d 0 0 0] = [p8 0 0 0 0 p3 0 0 0]
    let mut c = a4 * b4;
    d += (c & m) * r;
    c >>= 52;
    let t3 = d & m;
    d >>= 52;

    d += a0 * b4 + a1 * b3 + a2 * b2 + a3 * b1 + a4 * b0;
    d += c * r;
    // [d t4 t3 0 0 0] = [p8 0 0 0 p4 p3 0 0 0]
    let mut t4 = d & m;
    d >>= 52;
    let tx = t4 >> 48;
    t4 &= m >> 4;

    c = a0 * b0;
    d += a1 * b4 + a2 * b3 + a3 * b2 + a4 * b1;
    let mut u0 = d & m;
    d >>= 52;
    u0 = (u0 << 4) | tx;
    c += u0 * (r >> 4);
    // [d 0 t4 t3 0 0 c] = [p8 0 0 p5 p4 p3 0 0 p0]
    let r0 = c & m;
    c >>= 52;

    c += a0 * b1 + a1 * b0;
    d += a2 * b4 + a3 * b3 + a4 * b2;
    c += (d & m) * r;
    d >>= 52;
    let r1 = c & m;
    c >>= 52;

    c += a0 * b2 + a1 * b1 + a2 * b0;
    d += a3 * b4 + a4 * b3;
    c += (d & m) * r;
    d >>= 52;
    // [d 0 0 0 t4 t3 c r1 r0] = [p8 p7 p6 p5 p4 p3 p2 p1 p0]
    let r2 = c & m;
    c >>= 52;

    c += d * r + t3;
    let r3 = c & m;
    c >>= 52;
    c += t4;
    let r4 = c;

    [r0 as u64, r1 as u64, r2 as u64, r3 as u64, r4 as u64]
}

impl TryFrom<&[u8]> for FieldElement {
    type Error = k1sig_core::Error;

    /// Strict parse of a 32-byte big-endian value below p.
    fn try_from(bytes: &[u8]) -> k1sig_core::Result<Self> {
        let b: &[u8; 32] = bytes.try_into().map_err(|_| k1sig_core::Error::InvalidLength {
            expected: 32,
            got: bytes.len(),
        })?;
        Self::from_bytes(b).ok_or(k1sig_core::Error::FieldOutOfRange)
    }
}
