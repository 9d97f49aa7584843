//! The fixed-width low-tier word ("octa-trit") and its wire encoding.

use core::cmp::Ordering;
use core::fmt;

use crate::error::AsmError;

/// Size in bytes of a [`Digit81`] on the wire: 4 bytes `a`, 4 bytes `b`, 1
/// byte `c`, all big-endian.
pub const DIGIT81_WIRE_LEN: usize = 9;

/// A value of the fixed-width low tier.
///
/// The three fields are independent, free-bit lanes; equality and ordering
/// are defined bitwise/lexicographically over `(a, b, c)`, not over some
/// packed numeric interpretation. Arithmetic wraps per-lane within the
/// lane's own width (32, 32, 8 bits).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digit81 {
    pub a: u32,
    pub b: u32,
    pub c: u8,
}

/// Outcome of [`Digit81::cmp3`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp3 {
    Less,
    Equal,
    Greater,
}

impl Digit81 {
    /// The canonical zero value.
    pub const ZERO: Self = Self { a: 0, b: 0, c: 0 };

    pub const fn new(a: u32, b: u32, c: u8) -> Self {
        Self { a, b, c }
    }

    pub fn add(self, rhs: Self) -> Self {
        Self {
            a: self.a.wrapping_add(rhs.a),
            b: self.b.wrapping_add(rhs.b),
            c: self.c.wrapping_add(rhs.c),
        }
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self {
            a: self.a.wrapping_sub(rhs.a),
            b: self.b.wrapping_sub(rhs.b),
            c: self.c.wrapping_sub(rhs.c),
        }
    }

    pub fn mul(self, rhs: Self) -> Self {
        Self {
            a: self.a.wrapping_mul(rhs.a),
            b: self.b.wrapping_mul(rhs.b),
            c: self.c.wrapping_mul(rhs.c),
        }
    }

    /// Unsigned wrapping negation. Since every lane is unsigned,
    /// `0u32.wrapping_neg() == 0`, so negating the canonical zero always
    /// yields the canonical zero again: there is no negative zero.
    pub fn neg(self) -> Self {
        Self {
            a: self.a.wrapping_neg(),
            b: self.b.wrapping_neg(),
            c: self.c.wrapping_neg(),
        }
    }

    /// Identity: the lanes are unsigned, so there is no sign to strip.
    pub fn abs(self) -> Self {
        self
    }

    /// Per-lane remainder. A lane of `rhs` that is zero leaves the
    /// corresponding lane of `self` unchanged, *unless* `rhs` is the
    /// canonical zero digit as a whole, which is a division by zero.
    pub fn modulo(self, rhs: Self) -> Result<Self, AsmError> {
        if rhs == Self::ZERO {
            return Err(AsmError::DivByZero);
        }
        Ok(Self {
            a: if rhs.a == 0 { self.a } else { self.a % rhs.a },
            b: if rhs.b == 0 { self.b } else { self.b % rhs.b },
            c: if rhs.c == 0 { self.c } else { self.c % rhs.c },
        })
    }

    /// Lexicographic three-way compare over `(a, b, c)`.
    pub fn cmp3(self, rhs: Self) -> Cmp3 {
        match (self.a, self.b, self.c).cmp(&(rhs.a, rhs.b, rhs.c)) {
            Ordering::Less => Cmp3::Less,
            Ordering::Equal => Cmp3::Equal,
            Ordering::Greater => Cmp3::Greater,
        }
    }

    /// Canonical projection used when widening a `Digit81` into a single
    /// mid-tier (base-243) digit: the three lanes are summed (wrapping) and
    /// reduced modulo 243, which guarantees the result fits a base-243
    /// digit by construction.
    pub fn to_mid_digit(self) -> u8 {
        let sum = (self.a as u64)
            .wrapping_add(self.b as u64)
            .wrapping_add(self.c as u64);
        (sum % 243) as u8
    }

    /// Big-endian 9-byte wire encoding: `a` (4B), `b` (4B), `c` (1B).
    pub fn to_bytes(self) -> [u8; DIGIT81_WIRE_LEN] {
        let mut out = [0u8; DIGIT81_WIRE_LEN];
        out[0..4].copy_from_slice(&self.a.to_be_bytes());
        out[4..8].copy_from_slice(&self.b.to_be_bytes());
        out[8] = self.c;
        out
    }

    /// Decode from a 9-byte big-endian slice.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AsmError> {
        if bytes.len() < DIGIT81_WIRE_LEN {
            return Err(AsmError::TruncatedOperand);
        }
        let a = u32::from_be_bytes(bytes[0..4].try_into().expect("len checked"));
        let b = u32::from_be_bytes(bytes[4..8].try_into().expect("len checked"));
        let c = bytes[8];
        Ok(Self { a, b, c })
    }
}

impl fmt::Display for Digit81 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.a, self.b, self.c)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_matches_seed_scenario() {
        let x = Digit81::new(0, 0, 5);
        let y = Digit81::new(0, 0, 7);
        assert_eq!(x.add(y), Digit81::new(0, 0, 12));
    }

    #[test]
    fn add_then_neg_is_zero() {
        let d = Digit81::new(7, 11, 200);
        assert_eq!(d.add(d.neg()), Digit81::ZERO);
    }

    #[test]
    fn neg_of_zero_is_zero() {
        assert_eq!(Digit81::ZERO.neg(), Digit81::ZERO);
    }

    #[test]
    fn modulo_by_canonical_zero_fails() {
        let d = Digit81::new(1, 2, 3);
        assert_eq!(d.modulo(Digit81::ZERO), Err(AsmError::DivByZero));
    }

    #[test]
    fn modulo_skips_zero_lanes() {
        let d = Digit81::new(10, 20, 30);
        let divisor = Digit81::new(0, 7, 4);
        assert_eq!(d.modulo(divisor).unwrap(), Digit81::new(10, 20 % 7, 30 % 4));
    }

    #[test]
    fn cmp3_is_lexicographic() {
        assert_eq!(
            Digit81::new(0, 0, 1).cmp3(Digit81::new(0, 0, 2)),
            Cmp3::Less
        );
        assert_eq!(
            Digit81::new(1, 0, 0).cmp3(Digit81::new(0, 9, 9)),
            Cmp3::Greater
        );
        assert_eq!(Digit81::ZERO.cmp3(Digit81::ZERO), Cmp3::Equal);
    }

    #[test]
    fn wire_round_trip() {
        let d = Digit81::new(0xdead_beef, 0x1234_5678, 0x9a);
        let bytes = d.to_bytes();
        assert_eq!(Digit81::from_bytes(&bytes).unwrap(), d);
    }

    #[test]
    fn to_mid_digit_is_below_243() {
        let d = Digit81::new(u32::MAX, u32::MAX, 255);
        assert!(d.to_mid_digit() < 243);
    }
}
