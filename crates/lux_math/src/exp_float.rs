//! Exponent-safe floating point accumulation.
//!
//! Long chains of per-bounce sampling densities overflow or underflow `f64`
//! long before the final ratio is taken. `ExpFloat` stores a mantissa in
//! `[0.5, 1)` (or exactly zero) next to an unbounded power-of-two exponent, and
//! renormalizes after every operation.

use std::ops::{Add, Div, Mul};

/// A real number stored as `mantissa * 2^exponent`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExpFloat {
    mantissa: f64,
    exponent: i64,
}

impl ExpFloat {
    pub const ZERO: ExpFloat = ExpFloat {
        mantissa: 0.0,
        exponent: 0,
    };

    pub const ONE: ExpFloat = ExpFloat {
        mantissa: 0.5,
        exponent: 1,
    };

    /// Decompose a native float.
    pub fn new(x: f64) -> Self {
        let (mantissa, exponent) = frexp(x);
        Self { mantissa, exponent }
    }

    /// The mantissa, in `[0.5, 1)` in magnitude unless the value is zero or
    /// not finite.
    pub fn mantissa(&self) -> f64 {
        self.mantissa
    }

    pub fn exponent(&self) -> i64 {
        self.exponent
    }

    pub fn is_zero(&self) -> bool {
        self.mantissa == 0.0
    }

    /// Non-finite values only arise from division by zero or from
    /// non-finite inputs.
    pub fn is_finite(&self) -> bool {
        self.mantissa.is_finite()
    }

    /// Convert back to a native float, saturating to zero or infinity.
    pub fn to_f64(self) -> f64 {
        ldexp(self.mantissa, self.exponent)
    }

    fn normalize(mantissa: f64, exponent: i64) -> Self {
        if mantissa == 0.0 {
            return Self::ZERO;
        }
        if !mantissa.is_finite() {
            return Self { mantissa, exponent: 0 };
        }
        let (m, e) = frexp(mantissa);
        Self {
            mantissa: m,
            exponent: exponent + e,
        }
    }
}

impl Default for ExpFloat {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<f64> for ExpFloat {
    fn from(x: f64) -> Self {
        Self::new(x)
    }
}

impl Mul for ExpFloat {
    type Output = ExpFloat;

    fn mul(self, rhs: ExpFloat) -> ExpFloat {
        if !self.is_finite() || !rhs.is_finite() {
            return Self::new(self.mantissa * rhs.mantissa);
        }
        Self::normalize(self.mantissa * rhs.mantissa, self.exponent + rhs.exponent)
    }
}

impl Mul<f64> for ExpFloat {
    type Output = ExpFloat;

    fn mul(self, rhs: f64) -> ExpFloat {
        self * ExpFloat::new(rhs)
    }
}

impl Div for ExpFloat {
    type Output = ExpFloat;

    fn div(self, rhs: ExpFloat) -> ExpFloat {
        if rhs.is_zero() || !self.is_finite() || !rhs.is_finite() {
            return Self::new(self.mantissa / rhs.mantissa);
        }
        Self::normalize(self.mantissa / rhs.mantissa, self.exponent - rhs.exponent)
    }
}

impl Div<f64> for ExpFloat {
    type Output = ExpFloat;

    fn div(self, rhs: f64) -> ExpFloat {
        self / ExpFloat::new(rhs)
    }
}

impl Add for ExpFloat {
    type Output = ExpFloat;

    fn add(self, rhs: ExpFloat) -> ExpFloat {
        if self.is_zero() {
            return rhs;
        }
        if rhs.is_zero() {
            return self;
        }
        if !self.is_finite() || !rhs.is_finite() {
            return Self::new(self.mantissa + rhs.mantissa);
        }
        let (big, small) = if self.exponent >= rhs.exponent {
            (self, rhs)
        } else {
            (rhs, self)
        };
        let shift = big.exponent - small.exponent;
        if shift > f64::MANTISSA_DIGITS as i64 + 2 {
            return big;
        }
        let mantissa = big.mantissa + ldexp(small.mantissa, -shift);
        Self::normalize(mantissa, big.exponent)
    }
}

/// Split `x` into a mantissa with magnitude in `[0.5, 1)` and a power of two.
fn frexp(x: f64) -> (f64, i64) {
    if x == 0.0 || !x.is_finite() {
        return (x, 0);
    }
    let bits = x.to_bits();
    let exp_field = ((bits >> 52) & 0x7ff) as i64;
    if exp_field == 0 {
        // Subnormal: scale into the normal range first.
        let (m, e) = frexp(x * 2f64.powi(54));
        return (m, e - 54);
    }
    let mantissa = f64::from_bits((bits & !(0x7ff_u64 << 52)) | (1022_u64 << 52));
    (mantissa, exp_field - 1022)
}

/// Compute `x * 2^exp` in steps that cannot overflow the intermediate power.
fn ldexp(x: f64, exp: i64) -> f64 {
    const STEP: i64 = 1000;
    let mut x = x;
    let mut exp = exp;
    while exp > STEP {
        x *= 2f64.powi(STEP as i32);
        exp -= STEP;
        if !x.is_finite() {
            return x;
        }
    }
    while exp < -STEP {
        x *= 2f64.powi(-STEP as i32);
        exp += STEP;
        if x == 0.0 {
            return x;
        }
    }
    x * 2f64.powi(exp as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-10 * a.abs().max(b.abs())
    }

    #[test]
    fn test_frexp_matches_value() {
        for &x in &[1.0, 0.75, 3.0, 1e-300, 1e300, -6.5, 5e-324] {
            let (m, e) = frexp(x);
            assert!(m.abs() >= 0.5 && m.abs() < 1.0, "bad mantissa {m} for {x}");
            assert_eq!(ldexp(m, e), x);
        }
    }

    #[test]
    fn test_round_trip_small_values() {
        for &x in &[0.0, 1.0, 2.5, 0.001, 123456.789] {
            assert_eq!(ExpFloat::new(x).to_f64(), x);
        }
        assert_eq!(ExpFloat::ONE.to_f64(), 1.0);
    }

    #[test]
    fn test_mul_div_add() {
        let a = ExpFloat::new(3.0);
        let b = ExpFloat::new(0.25);
        assert!(close((a * b).to_f64(), 0.75));
        assert!(close((a / b).to_f64(), 12.0));
        assert!(close((a + b).to_f64(), 3.25));
        assert!(close((a + ExpFloat::ZERO).to_f64(), 3.0));
    }

    #[test]
    fn test_product_beyond_native_range() {
        // Each chain alone underflows f64, but their ratio is representable.
        let mut num = ExpFloat::ONE;
        let mut denom = ExpFloat::ONE;
        let mut native = 1.0f64;
        for _ in 0..400 {
            num = num * 1e-3;
            denom = denom * 2e-3;
            native *= 1e-3;
        }
        assert_eq!(native, 0.0);
        assert!(!num.is_zero());
        let ratio = (num / denom).to_f64();
        assert!(close(ratio, 0.5f64.powi(400)), "ratio {ratio}");
    }

    #[test]
    fn test_sum_of_overflowing_terms() {
        let big = ExpFloat::new(1e300) * 1e300;
        assert!(big.is_finite());
        assert_eq!(big.to_f64(), f64::INFINITY);
        let sum = big + big;
        assert!(close((sum / big).to_f64(), 2.0));
        // Tiny addends vanish without disturbing the larger term.
        let tiny = ExpFloat::new(1e-300) * 1e-300;
        assert!(close(((big + tiny) / big).to_f64(), 1.0));
    }

    #[test]
    fn test_division_by_zero_is_infinite() {
        let x = ExpFloat::new(2.0) / ExpFloat::ZERO;
        assert!(!x.is_finite());
        assert_eq!(x.to_f64(), f64::INFINITY);
        assert_eq!((ExpFloat::new(1.0) / x).to_f64(), 0.0);
    }
}
