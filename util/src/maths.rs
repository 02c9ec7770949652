//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Clamp a value into the range [min, max].
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float,
{
    value.max(min).min(max)
}

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float,
{
    let r = lhs % rhs;
    if r < T::zero() {
        r + rhs.abs()
    } else {
        r
    }
}

/// Wrap an angle in degrees into the range [-180, 180).
pub fn wrap_180<T>(value: T) -> T
where
    T: Float,
{
    let half = T::from(180.0).unwrap_or_else(T::zero);
    rem_euclid(value + half, half + half) - half
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(5.0, -1.0, 1.0), 1.0);
        assert_eq!(clamp(-5.0, -1.0, 1.0), -1.0);
        assert_eq!(clamp(0.5, -1.0, 1.0), 0.5);
    }

    #[test]
    fn test_wrap_180() {
        assert!((wrap_180(270.0) + 90.0).abs() < 1e-9);
        assert!((wrap_180(-190.0) - 170.0).abs() < 1e-9);
        assert!((wrap_180(45.0) - 45.0).abs() < 1e-9);
    }
}
