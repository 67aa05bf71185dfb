//! Scalar arithmetic modulo curve order n.
//!
//! n = 0xFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFFEBAAEDCE6AF48A03BBFD25E8CD0364141
//! Used for private keys, nonces and signature components. Everything except
//! the `_var` functions runs in constant time.

#![forbid(unsafe_code)]

use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};
use zeroize::Zeroize;

/// The secp256k1 curve order n.
/// Represented as 4 x 64-bit limbs in little-endian order.
const N: [u64; 4] = [
    0xBFD25E8CD0364141,
    0xBAAEDCE6AF48A03B,
    0xFFFFFFFFFFFFFFFE,
    0xFFFFFFFFFFFFFFFF,
];

/// 2^256 - n.
const N_C: [u64; 3] = [0x402DA1732FC9BEBF, 0x4551231950B75FC4, 1];

/// n / 2, rounded down.
const N_H: [u64; 4] = [
    0xDFE92F46681B20A0,
    0x5D576E7357A4501D,
    0xFFFFFFFFFFFFFFFF,
    0x7FFFFFFFFFFFFFFF,
];

/// Scalar element in Z/nZ where n is the secp256k1 curve order.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroize)]
pub struct Scalar {
    limbs: [u64; 4],
}

// Constants for the GLV decomposition (see `split_lambda`).
const MINUS_LAMBDA: Scalar = Scalar::from_words([
    0xAC9C52B3, 0x3FA3CF1F, 0x5AD9E3FD, 0x77ED9BA4, 0xA880B9FC, 0x8EC739C2, 0xE0CFC810, 0xB51283CF,
]);
const MINUS_B1: Scalar = Scalar::from_words([
    0x00000000, 0x00000000, 0x00000000, 0x00000000, 0xE4437ED6, 0x010E8828, 0x6F547FA9, 0x0ABFE4C3,
]);
const MINUS_B2: Scalar = Scalar::from_words([
    0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFF, 0xFFFFFFFE, 0x8A280AC5, 0x0774346D, 0xD765CDA8, 0x3DB1562C,
]);
const G1: Scalar = Scalar::from_words([
    0x00000000, 0x00000000, 0x00000000, 0x00003086, 0xD221A7D4, 0x6BCDE86C, 0x90E49284, 0xEB153DAB,
]);
const G2: Scalar = Scalar::from_words([
    0x00000000, 0x00000000, 0x00000000, 0x0000E443, 0x7ED6010E, 0x88286F54, 0x7FA90ABF, 0xE4C42212,
]);

/// Cube root of unity mod n matching the curve endomorphism (x, y) -> (beta*x, y).
pub const LAMBDA: Scalar = Scalar::from_words([
    0x5363AD4C, 0xC05C30E0, 0xA5261C02, 0x8812645A, 0x122E22EA, 0x20816678, 0xDF02967C, 0x1B23BD72,
]);

impl Scalar {
    /// Zero scalar.
    pub const ZERO: Self = Self {
        limbs: [0, 0, 0, 0],
    };

    /// One scalar.
    pub const ONE: Self = Self {
        limbs: [1, 0, 0, 0],
    };

    /// Create scalar from 4 limbs (little-endian). No range check.
    pub const fn from_limbs(limbs: [u64; 4]) -> Self {
        Self { limbs }
    }

    /// Create scalar from big-endian 32-bit words (`w[0]` most significant).
    /// The value must be below n; used for constants.
    pub const fn from_words(w: [u32; 8]) -> Self {
        Self {
            limbs: [
                (w[7] as u64) | ((w[6] as u64) << 32),
                (w[5] as u64) | ((w[4] as u64) << 32),
                (w[3] as u64) | ((w[2] as u64) << 32),
                (w[1] as u64) | ((w[0] as u64) << 32),
            ],
        }
    }

    pub const fn from_u32(v: u32) -> Self {
        Self {
            limbs: [v as u64, 0, 0, 0],
        }
    }

    /// Parse 32 big-endian bytes, reducing mod n.
    /// The flag reports whether the input was >= n.
    pub fn set_b32(bytes: &[u8; 32]) -> (Self, bool) {
        let mut limbs = [0u64; 4];
        for (i, chunk) in bytes.chunks_exact(8).enumerate() {
            let mut b = [0u8; 8];
            b.copy_from_slice(chunk);
            limbs[3 - i] = u64::from_be_bytes(b);
        }
        let mut s = Self { limbs };
        let overflow = s.check_overflow();
        s.reduce(overflow);
        (s, overflow != 0)
    }

    /// Create scalar from bytes (big-endian).
    /// Returns None if value >= n.
    pub fn from_bytes(bytes: &[u8; 32]) -> Option<Self> {
        match Self::set_b32(bytes) {
            (s, false) => Some(s),
            (_, true) => None,
        }
    }

    /// Convert to bytes (big-endian).
    pub fn to_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        bytes[0..8].copy_from_slice(&self.limbs[3].to_be_bytes());
        bytes[8..16].copy_from_slice(&self.limbs[2].to_be_bytes());
        bytes[16..24].copy_from_slice(&self.limbs[1].to_be_bytes());
        bytes[24..32].copy_from_slice(&self.limbs[0].to_be_bytes());
        bytes
    }

    /// 1 if the limbs encode a value >= n, else 0. Constant time.
    fn check_overflow(&self) -> u64 {
        let a = &self.limbs;
        let mut yes = 0u64;
        let mut no = 0u64;
        no |= (a[3] < N[3]) as u64;
        no |= (a[2] < N[2]) as u64;
        yes |= (a[2] > N[2]) as u64 & !no;
        no |= (a[1] < N[1]) as u64;
        yes |= (a[1] > N[1]) as u64 & !no;
        yes |= (a[0] >= N[0]) as u64 & !no;
        yes
    }

    /// Subtract n once if `overflow` is 1 (by adding 2^256 - n).
    fn reduce(&mut self, overflow: u64) {
        debug_assert!(overflow <= 1);
        let o = overflow as u128;
        let mut t = self.limbs[0] as u128 + o * N_C[0] as u128;
        self.limbs[0] = t as u64;
        t >>= 64;
        t += self.limbs[1] as u128 + o * N_C[1] as u128;
        self.limbs[1] = t as u64;
        t >>= 64;
        t += self.limbs[2] as u128 + o * N_C[2] as u128;
        self.limbs[2] = t as u64;
        t >>= 64;
        t += self.limbs[3] as u128;
        self.limbs[3] = t as u64;
    }

    /// Extract `count` bits starting at `offset`; the range must lie in one limb.
    pub fn get_bits(&self, offset: u32, count: u32) -> u32 {
        debug_assert!((offset + count - 1) >> 6 == offset >> 6);
        ((self.limbs[(offset >> 6) as usize] >> (offset & 0x3F)) & ((1u64 << count) - 1)) as u32
    }

    /// Extract `count` bits (< 32) starting at `offset`; the range may straddle limbs.
    pub fn get_bits_var(&self, offset: u32, count: u32) -> u32 {
        debug_assert!(count < 32);
        debug_assert!(offset + count <= 256);
        if (offset + count - 1) >> 6 == offset >> 6 {
            self.get_bits(offset, count)
        } else {
            let idx = (offset >> 6) as usize;
            let low = offset & 0x3F;
            (((self.limbs[idx] >> low) | (self.limbs[idx + 1] << (64 - low)))
                & ((1u64 << count) - 1)) as u32
        }
    }

    /// Check if zero.
    pub fn is_zero(&self) -> bool {
        (self.limbs[0] | self.limbs[1] | self.limbs[2] | self.limbs[3]) == 0
    }

    pub fn is_one(&self) -> bool {
        ((self.limbs[0] ^ 1) | self.limbs[1] | self.limbs[2] | self.limbs[3]) == 0
    }

    pub fn is_even(&self) -> bool {
        self.limbs[0] & 1 == 0
    }

    /// Whether self > n/2.
    pub fn is_high(&self) -> bool {
        let a = &self.limbs;
        let mut yes = 0u64;
        let mut no = 0u64;
        no |= (a[3] < N_H[3]) as u64;
        yes |= (a[3] > N_H[3]) as u64 & !no;
        no |= (a[2] < N_H[2]) as u64 & !yes;
        no |= (a[1] < N_H[1]) as u64 & !yes;
        yes |= (a[1] > N_H[1]) as u64 & !no;
        yes |= (a[0] > N_H[0]) as u64 & !no;
        yes != 0
    }

    /// Addition mod n. Also reports whether the raw sum wrapped past n.
    pub fn add_overflow(&self, other: &Self) -> (Self, bool) {
        let mut r = Self::ZERO;
        let mut t: u128 = 0;
        for i in 0..4 {
            t += self.limbs[i] as u128 + other.limbs[i] as u128;
            r.limbs[i] = t as u64;
            t >>= 64;
        }
        let overflow = t as u64 + r.check_overflow();
        debug_assert!(overflow <= 1);
        r.reduce(overflow);
        (r, overflow != 0)
    }

    /// Addition: self + other (mod n).
    pub fn add(&self, other: &Self) -> Self {
        self.add_overflow(other).0
    }

    /// Subtraction: self - other (mod n).
    pub fn sub(&self, other: &Self) -> Self {
        self.add(&other.negate())
    }

    /// Conditionally add 2^bit. The result must not wrap past n.
    pub fn cadd_bit(&self, bit: u32, flag: bool) -> Self {
        debug_assert!(bit < 256);
        // Push the bit out of range when the flag is clear.
        let bit = bit + ((flag as u32).wrapping_sub(1) & 0x100);
        let mut r = Self::ZERO;
        let mut t: u128 = 0;
        for i in 0..4 {
            let add = if (bit >> 6) as usize == i {
                1u64 << (bit & 0x3F)
            } else {
                0
            };
            t += self.limbs[i] as u128 + add as u128;
            r.limbs[i] = t as u64;
            t >>= 64;
        }
        debug_assert!(t == 0);
        debug_assert!(r.check_overflow() == 0);
        r
    }

    /// Negation: -self (mod n). Zero stays zero.
    pub fn negate(&self) -> Self {
        let nonzero = 0u64.wrapping_sub(!self.is_zero() as u64);
        let mut r = Self::ZERO;
        let mut t: u128 = (!self.limbs[0]) as u128 + N[0] as u128 + 1;
        r.limbs[0] = (t as u64) & nonzero;
        t >>= 64;
        for i in 1..4 {
            t += (!self.limbs[i]) as u128 + N[i] as u128;
            r.limbs[i] = (t as u64) & nonzero;
            t >>= 64;
        }
        r
    }

    /// Negate in constant time when `flag` is set. Returns -1 if negated, 1 otherwise.
    pub fn cond_negate(&mut self, flag: bool) -> i32 {
        let neg = self.negate();
        *self = Self::conditional_select(self, &neg, Choice::from(flag as u8));
        if flag {
            -1
        } else {
            1
        }
    }

    /// Full 512-bit product as 8 little-endian limbs.
    fn mul_512(&self, other: &Self) -> [u64; 8] {
        let mut wide = [0u64; 8];

        for i in 0..4 {
            let mut carry: u128 = 0;
            for j in 0..4 {
                let acc = wide[i + j] as u128
                    + (self.limbs[i] as u128) * (other.limbs[j] as u128)
                    + carry;
                wide[i + j] = acc as u64;
                carry = acc >> 64;
            }
            wide[i + 4] = carry as u64;
        }

        wide
    }

    /// Reduce a 512-bit number mod n by folding the high part with 2^256 = N_C (mod n).
    fn reduce_512(wide: &[u64; 8]) -> Self {
        // 512 -> 385 bits.
        let mut m = [0u64; 7];
        m[..4].copy_from_slice(&wide[..4]);
        mul_add_nc(&mut m, &wide[4..]);

        // 385 -> 258 bits.
        let mut p = [0u64; 5];
        p[..4].copy_from_slice(&m[..4]);
        mul_add_nc(&mut p, &m[4..]);

        // 258 -> 256 bits plus a carry.
        let mut r = [0u64; 5];
        r[..4].copy_from_slice(&p[..4]);
        mul_add_nc(&mut r, &p[4..]);

        let mut s = Self {
            limbs: [r[0], r[1], r[2], r[3]],
        };
        let overflow = r[4] + s.check_overflow();
        s.reduce(overflow);
        s
    }

    /// Multiplication: self * other (mod n).
    pub fn mul(&self, other: &Self) -> Self {
        Self::reduce_512(&self.mul_512(other))
    }

    /// Square: self^2 (mod n).
    pub fn sqr(&self) -> Self {
        self.mul(self)
    }

    /// round(self * other / 2^shift), for shift >= 256. Variable time in `shift` only.
    pub fn mul_shift_var(&self, other: &Self, shift: u32) -> Self {
        debug_assert!(shift >= 256);
        let l = self.mul_512(other);
        let limbs = (shift >> 6) as usize;
        let low = shift & 0x3F;

        let mut r = Self::ZERO;
        for i in 0..4 {
            let idx = limbs + i;
            let lo = if idx < 8 { l[idx] >> low } else { 0 };
            let hi = if low != 0 && idx + 1 < 8 {
                l[idx + 1] << (64 - low)
            } else {
                0
            };
            r.limbs[i] = lo | hi;
        }

        let round = (l[((shift - 1) >> 6) as usize] >> ((shift - 1) & 0x3F)) & 1;
        r.cadd_bit(0, round == 1)
    }

    /// Shift right by `n` bits (0 < n < 16), returning the bits shifted out.
    pub fn shr_int(&mut self, n: u32) -> u32 {
        debug_assert!(n > 0 && n < 16);
        let ret = (self.limbs[0] & ((1u64 << n) - 1)) as u32;
        self.limbs[0] = (self.limbs[0] >> n) | (self.limbs[1] << (64 - n));
        self.limbs[1] = (self.limbs[1] >> n) | (self.limbs[2] << (64 - n));
        self.limbs[2] = (self.limbs[2] >> n) | (self.limbs[3] << (64 - n));
        self.limbs[3] >>= n;
        ret
    }

    /// Split into the low and high 128-bit halves: self = lo + hi * 2^128.
    pub fn split_128(&self) -> (Self, Self) {
        (
            Self {
                limbs: [self.limbs[0], self.limbs[1], 0, 0],
            },
            Self {
                limbs: [self.limbs[2], self.limbs[3], 0, 0],
            },
        )
    }

    /// GLV decomposition: find (k1, k2) with self = k1 + k2 * lambda (mod n),
    /// where k1 and k2 (or their negations) fit in 128 bits.
    pub fn split_lambda(&self) -> (Self, Self) {
        let c1 = self.mul_shift_var(&G1, 272).mul(&MINUS_B1);
        let c2 = self.mul_shift_var(&G2, 272).mul(&MINUS_B2);
        let r2 = c1.add(&c2);
        let r1 = r2.mul(&MINUS_LAMBDA).add(self);
        (r1, r2)
    }

    /// Multiplicative inverse via self^(n-2). Inverse of zero is zero.
    ///
    /// The exponent is public, so the square-and-multiply schedule leaks nothing.
    pub fn inverse(&self) -> Self {
        let mut e = N;
        e[0] -= 2;

        let mut r = Self::ONE;
        for i in (0..256).rev() {
            r = r.sqr();
            if (e[i >> 6] >> (i & 0x3F)) & 1 == 1 {
                r = r.mul(self);
            }
        }
        r
    }

    pub fn inverse_var(&self) -> Self {
        self.inverse()
    }

    /// Overwrite with zero.
    pub fn clear(&mut self) {
        self.zeroize();
    }
}

/// acc += hi * N_C. `acc` must be wide enough for the result.
fn mul_add_nc(acc: &mut [u64], hi: &[u64]) {
    for (i, &h) in hi.iter().enumerate() {
        let mut carry: u128 = 0;
        for (j, &c) in N_C.iter().enumerate() {
            let t = acc[i + j] as u128 + (h as u128) * (c as u128) + carry;
            acc[i + j] = t as u64;
            carry = t >> 64;
        }
        for a in acc[i + N_C.len()..].iter_mut() {
            let t = *a as u128 + carry;
            *a = t as u64;
            carry = t >> 64;
        }
        debug_assert!(carry == 0);
    }
}

impl ConditionallySelectable for Scalar {
    fn conditional_select(a: &Self, b: &Self, choice: Choice) -> Self {
        Self {
            limbs: [
                u64::conditional_select(&a.limbs[0], &b.limbs[0], choice),
                u64::conditional_select(&a.limbs[1], &b.limbs[1], choice),
                u64::conditional_select(&a.limbs[2], &b.limbs[2], choice),
                u64::conditional_select(&a.limbs[3], &b.limbs[3], choice),
            ],
        }
    }
}

impl ConstantTimeEq for Scalar {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.limbs[0].ct_eq(&other.limbs[0])
            & self.limbs[1].ct_eq(&other.limbs[1])
            & self.limbs[2].ct_eq(&other.limbs[2])
            & self.limbs[3].ct_eq(&other.limbs[3])
    }
}

impl TryFrom<&[u8]> for Scalar {
    type Error = k1sig_core::Error;

    /// Strict parse of a 32-byte big-endian value below n.
    fn try_from(bytes: &[u8]) -> k1sig_core::Result<Self> {
        let b: &[u8; 32] = bytes.try_into().map_err(|_| k1sig_core::Error::InvalidLength {
            expected: 32,
            got: bytes.len(),
        })?;
        Self::from_bytes(b).ok_or(k1sig_core::Error::ScalarOutOfRange)
    }
}
