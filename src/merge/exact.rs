//! Exact summation of `f32` predictions.
//!
//! Every finite `f32` is an integer multiple of `2^-149` below `2^128`, so a
//! sum of them is an integer in those units. [`ExactSum`] keeps that integer
//! split across a few `i128` bins, one per 64-bit band of exponents. Integer
//! addition is associative, so the bins hold the same value whatever order the
//! terms arrive in, and [`ExactSum::to_f64`] rounds that value once.

/// Exponent of the smallest `f32` subnormal.
const MIN_EXP: i32 = -149;

/// Exponent bands of 64 bits each. Four cover every `f32`; the fifth holds an
/// `f64` seed close to the `u32::MAX * f32::MAX` bound.
const BINS: usize = 5;

/// Width of the two's-complement integer the bins are folded into.
const LIMBS: usize = BINS + 1;

/// Significand bits of an `f64`, including the implicit one.
const F64_DIGITS: usize = 53;

/// Exact running sum of `f32` terms.
///
/// Each term contributes at most `2^87` to its bin, so `u32::MAX` terms plus
/// one seed cannot overflow an `i128`.
#[derive(Debug, Clone, Default)]
pub(crate) struct ExactSum {
    bins: [i128; BINS],
}

impl ExactSum {
    /// Add `value` exactly.
    ///
    /// `value` must be finite and a multiple of `2^-149`: any `f32`, or an
    /// `f64` that holds an exact sum of `f32`s.
    pub(crate) fn add(&mut self, value: f64) {
        debug_assert!(value.is_finite());
        if value == 0.0 {
            return;
        }
        let bits = value.to_bits();
        let negative = bits >> 63 == 1;
        let biased = ((bits >> 52) & 0x7ff) as i32;
        let fraction = bits & ((1 << 52) - 1);
        let (mut mantissa, mut exp) = if biased == 0 {
            (fraction, -1074)
        } else {
            (fraction | 1 << 52, biased - 1075)
        };

        let zeros = mantissa.trailing_zeros();
        mantissa >>= zeros;
        exp += zeros as i32;
        debug_assert!(exp >= MIN_EXP, "{value:e} is not a multiple of 2^-149");

        let offset = (exp - MIN_EXP) as usize;
        let term = i128::from(mantissa) << (offset % 64);
        if negative {
            self.bins[offset / 64] -= term;
        } else {
            self.bins[offset / 64] += term;
        }
    }

    /// The sum rounded to the nearest `f64`, ties to even.
    pub(crate) fn to_f64(&self) -> f64 {
        let mut limbs = [0u64; LIMBS];
        for (k, &bin) in self.bins.iter().enumerate() {
            add_shifted(&mut limbs, bin, k);
        }
        let negative = limbs[LIMBS - 1] >> 63 == 1;
        if negative {
            negate(&mut limbs);
        }

        let Some(top) = highest_bit(&limbs) else {
            return 0.0;
        };
        let magnitude = if top < F64_DIGITS {
            limbs[0] as f64 * pow2(MIN_EXP)
        } else {
            let shift = top + 1 - F64_DIGITS;
            let mut mantissa = (0..F64_DIGITS)
                .filter(|&i| bit(&limbs, shift + i))
                .fold(0u64, |m, i| m | 1 << i);
            let round = bit(&limbs, shift - 1);
            let sticky = any_below(&limbs, shift - 1);
            if round && (sticky || mantissa & 1 == 1) {
                mantissa += 1;
            }
            mantissa as f64 * pow2(shift as i32 + MIN_EXP)
        };

        if negative {
            -magnitude
        } else {
            magnitude
        }
    }
}

/// `a + b` and its rounding error, so that `sum + err == a + b` exactly.
pub(crate) fn two_sum(a: f64, b: f64) -> (f64, f64) {
    let sum = a + b;
    let b_virtual = sum - a;
    let a_virtual = sum - b_virtual;
    let err = (a - a_virtual) + (b - b_virtual);
    (sum, err)
}

// =============================================================================
// Wide Integer Helpers
// =============================================================================

/// Add `value * 2^(64 * limb)` to a two's-complement integer.
fn add_shifted(limbs: &mut [u64; LIMBS], value: i128, limb: usize) {
    let extension = if value < 0 { u64::MAX } else { 0 };
    let mut carry = false;
    for (i, slot) in limbs.iter_mut().enumerate().skip(limb) {
        let word = match i - limb {
            0 => value as u64,
            1 => (value >> 64) as u64,
            _ => extension,
        };
        let (partial, c1) = slot.overflowing_add(word);
        let (total, c2) = partial.overflowing_add(u64::from(carry));
        *slot = total;
        carry = c1 || c2;
    }
}

fn negate(limbs: &mut [u64; LIMBS]) {
    let mut carry = true;
    for slot in limbs.iter_mut() {
        let (value, c) = (!*slot).overflowing_add(u64::from(carry));
        *slot = value;
        carry = c;
    }
}

fn highest_bit(limbs: &[u64; LIMBS]) -> Option<usize> {
    limbs
        .iter()
        .enumerate()
        .rev()
        .find(|(_, &l)| l != 0)
        .map(|(i, &l)| i * 64 + 63 - l.leading_zeros() as usize)
}

fn bit(limbs: &[u64; LIMBS], index: usize) -> bool {
    (limbs[index / 64] >> (index % 64)) & 1 == 1
}

/// Whether any of the lowest `count` bits is set.
fn any_below(limbs: &[u64; LIMBS], count: usize) -> bool {
    let (word, offset) = (count / 64, count % 64);
    limbs[..word].iter().any(|&l| l != 0)
        || (offset > 0 && limbs[word] & ((1u64 << offset) - 1) != 0)
}

/// `2^exp` for exponents in the normal `f64` range.
fn pow2(exp: i32) -> f64 {
    f64::from_bits(((exp + 1023) as u64) << 52)
}

// =============================================================================
// Tests
// =============================================================================
