//! Multiplicative inverses modulo a power of two.

use crate::error::{MitmError, MitmResult};

/// The widest supported word, in bits.
pub const MAX_WIDTH: u32 = 64;

/// Returns a mask keeping the `width` low bits of a word.
#[inline]
pub fn width_mask(width: u32) -> u64 {
    if width >= MAX_WIDTH {
        u64::MAX
    } else {
        (1 << width) - 1
    }
}

/// Checks that words of `width` bits are supported.
pub fn check_width(width: u32) -> MitmResult<()> {
    if (1..=MAX_WIDTH).contains(&width) {
        Ok(())
    } else {
        Err(MitmError::UnsupportedWidth(width))
    }
}

/// Checks that `value` fits in `width` bits, and returns it.
#[inline]
pub fn check_value(value: u64, width: u32) -> MitmResult<u64> {
    if value & !width_mask(width) == 0 {
        Ok(value)
    } else {
        Err(MitmError::WidthMismatch { value, width })
    }
}

/// Returns the odd multiplier `m` such that `x += x << shift` is `x *= m`.
/// The shift must be in `1..width`.
#[inline]
pub fn shift_add_multiplier(shift: u32, width: u32) -> u64 {
    ((1u64 << shift) + 1) & width_mask(width)
}

/// Returns true if `a * b == 1` modulo `2^width`.
#[inline]
pub fn is_inverse(a: u64, b: u64, width: u32) -> bool {
    a.wrapping_mul(b) & width_mask(width) == 1
}

/// Computes the multiplicative inverse of an odd `constant` modulo `2^width`.
///
/// The bits of the product `constant * inverse` are cleared from the least significant one
/// upwards: whenever bit `i` is set, adding `constant << i` clears it (and may carry into higher
/// bits that are handled later), and bit `i` of the inverse is set accordingly.
/// Only shifts, additions and masks are involved.
pub fn compute_inverse(constant: u64, width: u32) -> MitmResult<u64> {
    check_width(width)?;
    check_value(constant, width)?;

    if constant & 1 == 0 {
        return Err(MitmError::InvalidConstant(constant));
    }

    Ok(invert_odd(constant, width))
}

/// Same as [`compute_inverse`], for inputs that are known to be valid.
pub(crate) fn invert_odd(constant: u64, width: u32) -> u64 {
    let mask = width_mask(width);

    // `product` is always `constant * inverse` modulo 2^width
    let mut product = constant;
    let mut inverse = 1u64;

    for i in 1..width {
        if (product >> i) & 1 == 1 {
            product = product.wrapping_add(constant << i) & mask;
            inverse |= 1 << i;
        }
    }

    debug_assert_eq!(product, 1);
    debug_assert!(is_inverse(constant, inverse, width));

    inverse
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverse_8_bits() {
        assert_eq!(Ok(0x8D), compute_inverse(0x45, 8));
    }

    #[test]
    fn test_inverse_64_bits() {
        assert_eq!(
            Ok(0xA761C9B0BCBEDEC5),
            compute_inverse(0xDEADBEEFCAFEF00D, 64)
        );
    }

    #[test]
    fn test_inverse_of_one() {
        for width in 1..=MAX_WIDTH {
            assert_eq!(Ok(1), compute_inverse(1, width));
        }
    }

    #[test]
    fn test_inverse_all_16_bits() {
        for constant in (1..=u16::MAX as u64).step_by(2) {
            let inverse = compute_inverse(constant, 16).unwrap();
            assert!(is_inverse(constant, inverse, 16), "{constant:#x}");
            assert_eq!(Ok(constant), compute_inverse(inverse, 16));
        }
    }

    #[test]
    fn test_even_constant() {
        assert_eq!(Err(MitmError::InvalidConstant(0x44)), compute_inverse(0x44, 8));
        assert_eq!(Err(MitmError::InvalidConstant(0)), compute_inverse(0, 32));
    }

    #[test]
    fn test_constant_too_wide() {
        assert_eq!(
            Err(MitmError::WidthMismatch {
                value: 0x145,
                width: 8
            }),
            compute_inverse(0x145, 8)
        );
    }

    #[test]
    fn test_unsupported_width() {
        assert_eq!(Err(MitmError::UnsupportedWidth(0)), compute_inverse(1, 0));
        assert_eq!(Err(MitmError::UnsupportedWidth(65)), compute_inverse(1, 65));
    }

    #[test]
    fn test_shift_add_multiplier() {
        let x: u64 = 0x1234_5678;
        let mask = width_mask(32);
        let shifted = x.wrapping_add(x << 10) & mask;
        let multiplied = x.wrapping_mul(shift_add_multiplier(10, 32)) & mask;
        assert_eq!(shifted, multiplied);

        let inverse = compute_inverse(shift_add_multiplier(10, 32), 32).unwrap();
        assert_eq!(x, shifted.wrapping_mul(inverse) & mask);
    }

    #[test]
    fn test_width_mask() {
        assert_eq!(0x1, width_mask(1));
        assert_eq!(0xFF, width_mask(8));
        assert_eq!(0xFFFF_FFFF, width_mask(32));
        assert_eq!(u64::MAX, width_mask(64));
    }
}
