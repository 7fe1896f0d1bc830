//! Galois Field GF(256) arithmetic implementation.
//!
//! The field is generated by the primitive polynomial x^8 + x^7 + x^2 + x + 1.
//! Exponential and logarithm tables are built once, at compile time, and shared
//! read-only by every codec in the process.
use core::ops::{Add, Mul};

/// Low byte of the defining relation x^8 = x^7 + x^2 + x + 1.
pub const REDUCTION: u8 = 0x87;

/// Number of non-zero field elements.
const ORDER: usize = 255;

/// Exponent and logarithm tables for GF(256).
///
/// `exp[i]` is alpha^i for i in 0..255 and `log[exp[i]] == i`. The logarithm
/// of zero is undefined; its slot holds zero and is never consulted.
#[derive(Debug)]
pub struct FieldTables {
    exp: [u8; ORDER],
    log: [u8; 256],
}

impl FieldTables {
    const fn build() -> Self {
        let mut exp = [0u8; ORDER];
        let mut log = [0u8; 256];

        let mut i = 0;
        while i < ORDER {
            exp[i] = if i < 8 {
                1 << i
            } else {
                let prev = exp[i - 1];
                let next = prev << 1;
                if prev & 0x80 != 0 {
                    next ^ REDUCTION
                } else {
                    next
                }
            };
            log[exp[i] as usize] = i as u8;
            i += 1;
        }

        Self { exp, log }
    }

    /// Returns alpha raised to `power` (taken modulo 255).
    #[inline]
    pub fn exp(&self, power: usize) -> u8 {
        self.exp[power % ORDER]
    }

    /// Returns the discrete logarithm of `element`, or `None` for zero.
    #[inline]
    pub fn log(&self, element: u8) -> Option<u8> {
        if element == 0 {
            None
        } else {
            Some(self.log[element as usize])
        }
    }

    /// Multiplies two raw field elements.
    #[inline]
    pub fn mul(&self, a: u8, b: u8) -> u8 {
        if a == 0 || b == 0 {
            return 0;
        }
        let x = self.log[a as usize] as usize;
        let y = self.log[b as usize] as usize;
        self.exp[(x + y) % ORDER]
    }
}

/// The process-wide GF(256) tables.
pub static TABLES: FieldTables = FieldTables::build();

/// An element in the Galois Field GF(256).
///
/// Addition is XOR; multiplication goes through [`TABLES`]. There is no
/// carry or overflow: this is not integer arithmetic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct GF256(pub u8);

impl GF256 {
    /// The zero element in GF(256).
    pub const ZERO: Self = Self(0);

    /// The one element in GF(256).
    pub const ONE: Self = Self(1);

    /// Creates a new GF(256) element from a byte value.
    #[inline]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Returns the underlying byte value.
    #[inline]
    pub const fn value(self) -> u8 {
        self.0
    }
}

// Addition in GF(256) is XOR
#[allow(clippy::suspicious_arithmetic_impl)]
impl Add for GF256 {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self::Output {
        Self(self.0 ^ other.0)
    }
}

impl Mul for GF256 {
    type Output = Self;

    #[inline]
    fn mul(self, other: Self) -> Self::Output {
        Self(TABLES.mul(self.0, other.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_low_powers_are_single_bits() {
        for i in 0..8 {
            assert_eq!(TABLES.exp(i), 1 << i);
        }
        assert_eq!(TABLES.exp(8), REDUCTION);
    }

    #[test]
    fn test_exp_covers_every_nonzero_element() {
        let elements: HashSet<u8> = (0..255).map(|i| TABLES.exp(i)).collect();
        assert_eq!(elements.len(), 255);
        assert!(!elements.contains(&0));
    }

    #[test]
    fn test_log_inverts_exp() {
        for i in 0..255usize {
            assert_eq!(TABLES.log(TABLES.exp(i)), Some(i as u8));
        }
        assert_eq!(TABLES.log(0), None);
        assert_eq!(TABLES.exp(255), TABLES.exp(0));
    }

    #[test]
    fn test_basic_arithmetic() {
        let a = GF256(3);
        let b = GF256(5);

        assert_eq!(a + b, GF256(6));
        assert_eq!(a * b, GF256(15));
    }

    #[test]
    fn test_reduction_applies_above_degree_seven() {
        // x * x^7 = x^8 = x^7 + x^2 + x + 1
        assert_eq!(GF256(0x02) * GF256(0x80), GF256(0x87));
        assert_eq!(GF256(2) * GF256(2), GF256(4));
        assert_eq!(GF256(4) * GF256(4), GF256(16));
    }

    #[test]
    fn test_zero_multiplication() {
        for i in 0..=255u8 {
            assert_eq!(GF256(i) * GF256::ZERO, GF256::ZERO);
            assert_eq!(GF256::ZERO * GF256(i), GF256::ZERO);
        }
    }

    #[test]
    fn test_one_multiplication() {
        for i in 0..=255u8 {
            assert_eq!(GF256(i) * GF256::ONE, GF256(i));
        }
    }

    #[test]
    fn test_every_element_is_its_own_additive_inverse() {
        for i in 0..=255u8 {
            let val = GF256::new(i);
            assert_eq!(val + val, GF256::ZERO);
        }
    }

    #[test]
    fn test_every_nonzero_element_has_an_inverse() {
        for i in 1..=255u8 {
            let log = TABLES.log(i).map(usize::from);
            let inverse = log.map(|l| TABLES.exp(255 - l));
            assert_eq!(inverse.map(|inv| TABLES.mul(i, inv)), Some(1));
        }
        assert_eq!(TABLES.mul(2, 0xc3), 1);
    }

    #[test]
    fn test_mathematical_consistency() {
        let test_vals = [0, 1, 2, 3, 7, 0x09, 0x11, 0x20, 85, 128, 170, 255];

        for &a in &test_vals {
            for &b in &test_vals {
                for &c in &test_vals {
                    let x = GF256::new(a);
                    let y = GF256::new(b);
                    let z = GF256::new(c);

                    assert_eq!((x + y) + z, x + (y + z));
                    assert_eq!((x * y) * z, x * (y * z));
                    assert_eq!(x * y, y * x);
                    assert_eq!(x * (y + z), (x * y) + (x * z));
                }
            }
        }
    }
}
