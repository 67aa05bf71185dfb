//! Windowed non-adjacent form (wNAF) encodings of scalars.
//!
//! Three encoders:
//! - [`Wnaf::var`]: minimal-weight digits for public scalars.
//! - [`Wnaf::constant`]: every digit odd and nonzero, fixed length, no
//!   secret-dependent branches. Encodes `s + skew` where skew is 1 or 2.
//! - [`Wnaf::fixed`]: one digit per window over the full 256 bits, digits
//!   may be zero. Encodes `s + skew` where skew is 0 or 1.
//!
//! In all cases `sum(digits[i] * 2^(i * step)) == s + skew`, with `step` equal
//! to 1 for `var` and `w` for the window-indexed encoders.

#![forbid(unsafe_code)]

use super::scalar::Scalar;

/// Bit length covered by [`Wnaf::fixed`].
pub const WNAF_BITS: u32 = 256;

/// Number of w-bit windows needed for `bits` bits.
pub const fn wnaf_size_bits(bits: u32, w: u32) -> u32 {
    (bits + w - 1) / w
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Wnaf {
    digits: Vec<i32>,
    skew: u32,
}

impl Wnaf {
    pub fn digits(&self) -> &[i32] {
        &self.digits
    }

    /// Amount added to the scalar before encoding; callers subtract `skew * P` afterwards.
    pub fn skew(&self) -> u32 {
        self.skew
    }

    /// One past the index of the highest nonzero digit (0 if all digits are zero).
    pub fn bits(&self) -> usize {
        self.digits
            .iter()
            .rposition(|&d| d != 0)
            .map_or(0, |p| p + 1)
    }

    /// Variable-time wNAF with `len` bit positions and window `w` (2..=31).
    ///
    /// Digit `i` has weight 2^i. Nonzero digits are odd, lie in
    /// ±(2^(w-1) - 1), and are separated by at least w - 1 zeros.
    /// The scalar must fit in `len` bits after taking its low form.
    pub fn var(a: &Scalar, len: usize, w: u32) -> Self {
        debug_assert!((2..=31).contains(&w));
        debug_assert!(len <= 256);

        let mut digits = vec![0i32; len];
        let mut s = *a;
        let mut sign = 1i32;
        let mut carry = 0u32;

        if s.get_bits(255, 1) == 1 {
            s = s.negate();
            sign = -1;
        }

        let mut bit = 0usize;
        while bit < len {
            if s.get_bits(bit as u32, 1) == carry {
                bit += 1;
                continue;
            }

            let now = (w as usize).min(len - bit);
            let mut word = (s.get_bits_var(bit as u32, now as u32) + carry) as i32;

            carry = ((word >> (w - 1)) & 1) as u32;
            word -= (carry as i32) << w;

            digits[bit] = sign * word;
            bit += now;
        }
        debug_assert_eq!(carry, 0);

        Self { digits, skew: 0 }
    }

    /// Constant-time wNAF of `size` bits with window `w`.
    ///
    /// Returns `wnaf_size_bits(size, w) + 1` digits, digit `i` with weight
    /// 2^(i*w), all odd and in ±(2^w - 1). The scalar (or its negation, if
    /// that is smaller) must fit in `size` bits.
    pub fn constant(scalar: &Scalar, w: u32, size: u32) -> Self {
        debug_assert!(w > 0 && w < 16);
        debug_assert!(size > 0);

        let words = wnaf_size_bits(size, w) as usize;
        let mut digits = vec![0i32; words + 1];

        // Odd scalars get 2 added, even ones 1, so the encoded value is odd.
        // Negation flips parity, and -1 must not be pushed past n by the addition.
        let flip = scalar.is_high();
        let bit = (flip ^ !scalar.is_even()) as u32;
        let not_neg_one = !scalar.negate().is_one();

        let mut s = scalar.cadd_bit(bit, not_neg_one);
        // For -1 the negation alone already yields the skewed value.
        let global_sign = s.cond_negate(flip) * (not_neg_one as i32 * 2 - 1);
        let skew = 1u32 << bit;

        let mut u_last = s.shr_int(w) as i32;
        let mut word = 0usize;
        let mut u;
        loop {
            u = s.shr_int(w) as i32;
            let even = ((u & 1) == 0) as i32;
            debug_assert!(u_last > 0 && (u_last & 1) == 1);
            u += even;
            u_last -= even * (1 << w);

            digits[word] = u_last * global_sign;
            word += 1;

            u_last = u;
            if word * w as usize >= size as usize {
                break;
            }
        }
        digits[word] = u * global_sign;

        debug_assert!(s.is_zero());
        debug_assert_eq!(word, words);
        Self { digits, skew }
    }

    /// Fixed-length wNAF over `WNAF_BITS` bits with window `w`.
    ///
    /// Returns `wnaf_size_bits(WNAF_BITS, w)` digits with weight 2^(i*w).
    /// Nonzero digits are odd; zero encodes to all-zero digits with skew 0,
    /// and even scalars are encoded as `s + 1` with skew 1.
    ///
    /// Variable time: the zero check, the leading-window scan and the digit
    /// fixups all branch on `s`. Do not feed it secret scalars.
    pub fn fixed(s: &Scalar, w: u32) -> Self {
        debug_assert!(w >= 2 && w < 32);
        let size = wnaf_size_bits(WNAF_BITS, w) as usize;
        let mut wnaf = vec![0i32; size];

        if s.is_zero() {
            return Self {
                digits: wnaf,
                skew: 0,
            };
        }

        let skew = s.is_even() as i32;
        let last_w = WNAF_BITS - (size as u32 - 1) * w;
        let window = |pos: usize| -> i32 {
            let count = if pos == size - 1 { last_w } else { w };
            s.get_bits_var(pos as u32 * w, count) as i32
        };

        wnaf[0] = window(0) + skew;

        // Skip leading zero windows.
        let mut max_pos = size - 1;
        while max_pos > 0 && window(max_pos) == 0 {
            max_pos -= 1;
        }

        for pos in 1..=max_pos {
            let val = window(pos);
            if val & 1 == 0 {
                wnaf[pos - 1] -= 1 << w;
                wnaf[pos] = val + 1;
            } else {
                wnaf[pos] = val;
            }
            // Fold a ±1 into the digit below when the signs disagree, keeping
            // wnaf[pos - 1] odd for the next step.
            if pos >= 2
                && ((wnaf[pos - 1] == 1 && wnaf[pos - 2] < 0)
                    || (wnaf[pos - 1] == -1 && wnaf[pos - 2] > 0))
            {
                if wnaf[pos - 1] == 1 {
                    wnaf[pos - 2] += 1 << w;
                } else {
                    wnaf[pos - 2] -= 1 << w;
                }
                wnaf[pos - 1] = 0;
            }
        }

        Self {
            digits: wnaf,
            skew: skew as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{RngCore, SeedableRng};
    use rand_chacha::ChaCha20Rng;

    fn random_scalar(rng: &mut ChaCha20Rng) -> Scalar {
        let mut b = [0u8; 32];
        rng.fill_bytes(&mut b);
        Scalar::set_b32(&b).0
    }

    /// sum(digits[i] * 2^(i * step)) mod n.
    fn recombine(digits: &[i32], step: u32) -> Scalar {
        let mut acc = Scalar::ZERO;
        let shift = Scalar::from_u32(1 << step);
        for &d in digits.iter().rev() {
            acc = acc.mul(&shift);
            let v = Scalar::from_u32(d.unsigned_abs());
            acc = if d < 0 { acc.sub(&v) } else { acc.add(&v) };
        }
        acc
    }

    fn check_var(s: &Scalar, w: u32) {
        let wnaf = Wnaf::var(s, 256, w);
        let mut zeros = w as usize;
        for &d in wnaf.digits() {
            if d == 0 {
                zeros += 1;
                continue;
            }
            assert_eq!(d & 1, 1, "digit {d} not odd");
            assert!(d.abs() < 1 << (w - 1), "digit {d} out of range");
            assert!(zeros >= w as usize - 1, "digits too close");
            zeros = 0;
        }
        assert_eq!(recombine(wnaf.digits(), 1), *s);
    }

    #[test]
    fn test_var_random() {
        let mut rng = ChaCha20Rng::seed_from_u64(12345);
        for w in [4u32, 5, 15] {
            for _ in 0..20 {
                check_var(&random_scalar(&mut rng), w);
            }
        }
        check_var(&Scalar::ZERO, 5);
        check_var(&Scalar::ONE.negate(), 5);
    }

    #[test]
    fn test_var_bits() {
        let wnaf = Wnaf::var(&Scalar::from_u32(1), 130, 5);
        assert_eq!(wnaf.bits(), 1);
        assert_eq!(Wnaf::var(&Scalar::ZERO, 130, 5).bits(), 0);
        // 2^20 - 1 = 2^20 - 1, ends in a carry: digits -1 at 0 and 1 at 20.
        let wnaf = Wnaf::var(&Scalar::from_u32((1 << 20) - 1), 130, 5);
        assert_eq!(wnaf.bits(), 21);
        assert_eq!(wnaf.digits()[0], -1);
        assert_eq!(wnaf.digits()[20], 1);
    }

    #[test]
    fn test_var_negative_half() {
        // A split half near n is encoded through its negation.
        let s = Scalar::from_u32(77).negate();
        let wnaf = Wnaf::var(&s, 130, 5);
        assert!(wnaf.bits() <= 8);
        assert_eq!(recombine(wnaf.digits(), 1), s);
    }

    fn check_const(s: &Scalar, w: u32, size: u32) {
        let wnaf = Wnaf::constant(s, w, size);
        assert_eq!(wnaf.digits().len(), wnaf_size_bits(size, w) as usize + 1);
        for &d in wnaf.digits() {
            assert_ne!(d, 0);
            assert_eq!(d & 1, 1);
            assert!(d.abs() < 1 << w);
        }
        assert!(wnaf.skew() == 1 || wnaf.skew() == 2);
        let expected = s.add(&Scalar::from_u32(wnaf.skew()));
        assert_eq!(recombine(wnaf.digits(), w), expected);
    }

    #[test]
    fn test_const_random() {
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        for _ in 0..20 {
            let s = random_scalar(&mut rng);
            check_const(&s, 4, 256);
            let (k1, k2) = s.split_lambda();
            check_const(&k1, 4, 128);
            check_const(&k2, 4, 128);
        }
    }

    #[test]
    fn test_const_edge_values() {
        for s in [
            Scalar::ZERO,
            Scalar::ONE,
            Scalar::from_u32(2),
            Scalar::ONE.negate(),
            Scalar::from_u32(2).negate(),
        ] {
            check_const(&s, 4, 128);
            check_const(&s, 4, 256);
        }
        assert_eq!(Wnaf::constant(&Scalar::ZERO, 4, 128).skew(), 1);
        assert_eq!(Wnaf::constant(&Scalar::ONE, 4, 128).skew(), 2);
        assert_eq!(Wnaf::constant(&Scalar::ONE.negate(), 4, 128).skew(), 2);
    }

    fn check_fixed(s: &Scalar, w: u32) {
        let wnaf = Wnaf::fixed(s, w);
        assert_eq!(wnaf.digits().len(), wnaf_size_bits(WNAF_BITS, w) as usize);
        for &d in wnaf.digits() {
            assert!(d == 0 || d & 1 == 1, "digit {d} even");
            assert!(d.abs() <= 1 << w);
        }
        let expected = s.add(&Scalar::from_u32(wnaf.skew()));
        assert_eq!(recombine(wnaf.digits(), w), expected);
    }

    #[test]
    fn test_fixed_random() {
        let mut rng = ChaCha20Rng::seed_from_u64(10);
        for w in [2u32, 4, 5, 6] {
            for _ in 0..10 {
                check_fixed(&random_scalar(&mut rng), w);
            }
        }
    }

    #[test]
    fn test_fixed_small_cases() {
        let w = 4;
        let zero = Wnaf::fixed(&Scalar::ZERO, w);
        assert_eq!(zero.skew(), 0);
        assert!(zero.digits().iter().all(|&d| d == 0));

        let one = Wnaf::fixed(&Scalar::ONE, w);
        assert_eq!(one.skew(), 0);
        assert_eq!(one.digits()[0], 1);
        assert!(one.digits()[1..].iter().all(|&d| d == 0));

        let two = Wnaf::fixed(&Scalar::from_u32(2), w);
        assert_eq!(two.skew(), 1);
        assert_eq!(two.digits()[0], 3);

        // 0x11 would give digits [1, 1]; the low digit stays odd.
        check_fixed(&Scalar::from_u32(0x11), w);
        check_fixed(&Scalar::from_u32(0x10), w);
        check_fixed(&Scalar::ONE.negate(), w);
        check_fixed(&Scalar::from_limbs([0, 0, 0, 1 << 63]), w);
    }
}
