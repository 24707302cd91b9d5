//! Precision genericity for the kernels.
//!
//! Every layer works on either `f32` or `f64` buffers. [`Float`] collects the
//! arithmetic the kernels need, plus the conversions used to carry `f64`
//! configuration values (such as the TV exponent) into the buffer precision.

use core::fmt::Debug;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Div, Mul, MulAssign, Neg, Sub, SubAssign};

/// A floating point element type usable in tensors.
pub trait Float:
    Copy
    + Default
    + Debug
    + PartialOrd
    + Send
    + Sync
    + 'static
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + Neg<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + Sum
{
    /// Additive identity.
    const ZERO: Self;
    /// Multiplicative identity.
    const ONE: Self;

    /// Convert from `f64`, rounding if needed.
    fn from_f64(x: f64) -> Self;
    /// Convert to `f64`.
    fn into_f64(self) -> f64;

    /// `self` raised to a floating point power.
    fn powf(self, y: Self) -> Self;
    /// Absolute value.
    fn abs(self) -> Self;

    /// Whether the value is neither infinite nor NaN.
    fn is_finite(self) -> bool;

    /// Largest of `self` and `other`.
    #[must_use]
    fn max(self, other: Self) -> Self {
        if other > self { other } else { self }
    }
}

impl Float for f32 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    #[allow(clippy::cast_possible_truncation)]
    fn from_f64(x: f64) -> Self {
        x as Self
    }

    fn into_f64(self) -> f64 {
        f64::from(self)
    }

    #[inline]
    fn powf(self, y: Self) -> Self {
        libm::powf(self, y)
    }

    #[inline]
    fn abs(self) -> Self {
        libm::fabsf(self)
    }

    fn is_finite(self) -> bool {
        Self::is_finite(self)
    }
}

impl Float for f64 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    fn from_f64(x: f64) -> Self {
        x
    }

    fn into_f64(self) -> f64 {
        self
    }

    #[inline]
    fn powf(self, y: Self) -> Self {
        libm::pow(self, y)
    }

    #[inline]
    fn abs(self) -> Self {
        libm::fabs(self)
    }

    fn is_finite(self) -> bool {
        Self::is_finite(self)
    }
}

#[cfg(test)]
mod tests {
    use super::Float;

    #[test]
    fn powf_matches_std_for_both_precisions() {
        assert!((Float::powf(1.01_f64, 1.25) - 1.01_f64.powf(1.25)).abs() < 1e-15);
        assert!((Float::powf(1.01_f32, 1.25) - 1.01_f32.powf(1.25)).abs() < 1e-6);
    }

    #[test]
    fn zero_to_a_negative_power_is_infinite() {
        assert!(!Float::is_finite(Float::powf(0.0_f64, -0.5)));
    }

    #[test]
    fn max_prefers_larger() {
        assert_eq!(Float::max(1.0_f32, 3.0), 3.0);
        assert_eq!(Float::max(-1.0_f64, -3.0), -1.0);
    }
}
