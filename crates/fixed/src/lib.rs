//! 18-decimal unsigned fixed-point arithmetic.
//!
//! Amounts are `u128` values scaled by `ONE` (1e18). The exponential-decay
//! helper `pow2_neg` evaluates `2^(-x)` through a 61-entry lookup table with
//! linear interpolation between entries; the exponent is given in
//! `POW2_SCALE` (1e5) fixed units.

/// One unit in 18-decimal fixed representation.
pub const ONE: u128 = 1_000_000_000_000_000_000;

/// Scale of the `pow2_neg` exponent (5 decimals).
pub const POW2_SCALE: u64 = 100_000;

/// `2^(-i) * 1e18` for `i` in `0..=60`, truncated. Entry 60 underflows to
/// zero, which also serves as the implicit `T[61]` interpolation endpoint.
const POW2_TABLE: [u128; 61] = [
    1_000_000_000_000_000_000,
    500_000_000_000_000_000,
    250_000_000_000_000_000,
    125_000_000_000_000_000,
    62_500_000_000_000_000,
    31_250_000_000_000_000,
    15_625_000_000_000_000,
    7_812_500_000_000_000,
    3_906_250_000_000_000,
    1_953_125_000_000_000,
    976_562_500_000_000,
    488_281_250_000_000,
    244_140_625_000_000,
    122_070_312_500_000,
    61_035_156_250_000,
    30_517_578_125_000,
    15_258_789_062_500,
    7_629_394_531_250,
    3_814_697_265_625,
    1_907_348_632_812,
    953_674_316_406,
    476_837_158_203,
    238_418_579_101,
    119_209_289_550,
    59_604_644_775,
    29_802_322_387,
    14_901_161_193,
    7_450_580_596,
    3_725_290_298,
    1_862_645_149,
    931_322_574,
    465_661_287,
    232_830_643,
    116_415_321,
    58_207_660,
    29_103_830,
    14_551_915,
    7_275_957,
    3_637_978,
    1_818_989,
    909_494,
    454_747,
    227_373,
    113_686,
    56_843,
    28_421,
    14_210,
    7_105,
    3_552,
    1_776,
    888,
    444,
    222,
    111,
    55,
    27,
    13,
    6,
    3,
    1,
    0,
];

/// Evaluate `2^(-x)` in 1e18 fixed, where `x` is in `POW2_SCALE` fixed units.
///
/// Piecewise linear between table entries: for `x = i*SCALE + r` the result
/// is `T[i] - (T[i] - T[i+1]) * r / SCALE`, with `T[61] = 0`. Exponents of
/// 61 or more underflow to zero.
pub fn pow2_neg(x: u128) -> u128 {
    let scale = POW2_SCALE as u128;
    let i = (x / scale) as usize;
    if i >= 61 {
        return 0;
    }
    let r = x % scale;
    let hi = POW2_TABLE[i];
    let lo = if i + 1 < 61 { POW2_TABLE[i + 1] } else { 0 };
    if r == 0 {
        hi
    } else {
        hi - (hi - lo) * r / scale
    }
}

/// Saturating fixed-point addition.
pub fn saturating_add(a: u128, b: u128) -> u128 {
    a.saturating_add(b)
}

/// Saturating fixed-point subtraction (floors at zero).
pub fn saturating_sub(a: u128, b: u128) -> u128 {
    a.saturating_sub(b)
}

/// `a * b / d` with a 256-bit intermediate product, truncating.
///
/// The quotient saturates at `u128::MAX` in the (unreachable for 1e18-scale
/// amounts) case where it does not fit.
///
/// Panics if `d == 0`.
pub fn mul_div(a: u128, b: u128, d: u128) -> u128 {
    assert!(d != 0, "mul_div by zero");
    match a.checked_mul(b) {
        Some(p) => p / d,
        None => {
            let (lo, hi) = wide_mul(a, b);
            wide_div(hi, lo, d)
        }
    }
}

/// Full 256-bit product of two `u128` values as `(low, high)` halves.
fn wide_mul(a: u128, b: u128) -> (u128, u128) {
    const MASK: u128 = (1u128 << 64) - 1;
    let (a_hi, a_lo) = (a >> 64, a & MASK);
    let (b_hi, b_lo) = (b >> 64, b & MASK);

    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    let mid = (ll >> 64) + (lh & MASK) + (hl & MASK);
    let lo = (mid << 64) | (ll & MASK);
    let hi = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
    (lo, hi)
}

/// Divide the 256-bit value `hi:lo` by `d`, saturating the quotient.
fn wide_div(hi: u128, lo: u128, d: u128) -> u128 {
    if hi == 0 {
        return lo / d;
    }
    // Binary long division over the 256-bit dividend. The remainder is kept
    // in 129 bits as (carry, rem): rem < d always holds on entry to each
    // step, so one conditional subtraction restores the invariant.
    let mut q: u128 = 0;
    let mut rem: u128 = 0;
    let mut saturated = false;
    for i in (0..256).rev() {
        let bit = if i >= 128 {
            (hi >> (i - 128)) & 1
        } else {
            (lo >> i) & 1
        };
        let carry = rem >> 127;
        rem = (rem << 1) | bit;
        let q_bit = if carry == 1 || rem >= d {
            rem = rem.wrapping_sub(d);
            1
        } else {
            0
        };
        if q >> 127 == 1 {
            saturated = true;
        }
        q = (q << 1) | q_bit;
    }
    if saturated {
        u128::MAX
    } else {
        q
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pow2_neg_integer_points() {
        assert_eq!(pow2_neg(0), ONE);
        assert_eq!(pow2_neg(POW2_SCALE as u128), ONE / 2);
        assert_eq!(pow2_neg(2 * POW2_SCALE as u128), ONE / 4);
        assert_eq!(pow2_neg(10 * POW2_SCALE as u128), 976_562_500_000_000);
        assert_eq!(pow2_neg(60 * POW2_SCALE as u128), 0);
    }

    #[test]
    fn test_pow2_neg_underflow() {
        assert_eq!(pow2_neg(61 * POW2_SCALE as u128), 0);
        assert_eq!(pow2_neg(u128::MAX), 0);
    }

    #[test]
    fn test_pow2_neg_interpolates() {
        // Halfway between 2^-1 and 2^-2: 0.5e18 - 0.125e18.
        let x = POW2_SCALE as u128 + POW2_SCALE as u128 / 2;
        assert_eq!(pow2_neg(x), 375_000_000_000_000_000);

        // True 2^-1.5 is ~0.35355e18; the linear segment overshoots by ~6%.
        let exact = 353_553_390_593_273_762u128;
        let approx = pow2_neg(x);
        assert!(approx > exact);
        assert!(approx - exact < ONE / 10);
    }

    #[test]
    fn test_pow2_neg_monotone() {
        let mut prev = pow2_neg(0);
        for x in (0..62 * POW2_SCALE as u128).step_by(12_345) {
            let v = pow2_neg(x);
            assert!(v <= prev, "pow2_neg not monotone at {x}");
            prev = v;
        }
    }

    #[test]
    fn test_mul_div_narrow() {
        assert_eq!(mul_div(6, 7, 3), 14);
        assert_eq!(mul_div(10, 10, 3), 33);
        assert_eq!(mul_div(0, u128::MAX, 5), 0);
    }

    #[test]
    fn test_mul_div_wide() {
        // 9e18 tokens at 1e18 scale times a table entry overflows u128.
        let a = 9_000_000_000_000_000_000_000_000_000_000_000_000u128;
        assert_eq!(mul_div(a, ONE / 4, ONE), a / 4);
        assert_eq!(mul_div(a, ONE, ONE), a);
        assert_eq!(mul_div(u128::MAX, u128::MAX, u128::MAX), u128::MAX);
    }

    #[test]
    fn test_mul_div_truncates() {
        assert_eq!(mul_div(7, 3, 2), 10);
    }

    #[test]
    #[should_panic(expected = "mul_div by zero")]
    fn test_mul_div_zero_denominator() {
        mul_div(1, 1, 0);
    }

    #[test]
    fn test_saturating_ops() {
        assert_eq!(saturating_add(u128::MAX, 1), u128::MAX);
        assert_eq!(saturating_sub(1, 2), 0);
        assert_eq!(saturating_sub(5, 2), 3);
    }
}
