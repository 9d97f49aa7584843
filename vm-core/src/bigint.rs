//! `BigIntMid`: signed arbitrary-precision integers in base 243.

use core::cmp::Ordering;
use core::fmt;

use crate::error::VmError;

const BASE: u32 = 243;

/// Sign of a [`BigIntMid`]. Zero is always [`Sign::Positive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sign {
    Positive,
    Negative,
}

/// A signed arbitrary-precision integer, base 243, little-endian digits.
///
/// Invariant: no trailing (most-significant) zero digit unless the value is
/// the single digit `[0]`, and that single-zero representation always has
/// positive sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BigIntMid {
    sign: Sign,
    digits: Vec<u8>,
}

/// Recursion depth above which [`BigIntMid::factorial`] and
/// [`BigIntMid::fibonacci`] switch from native recursion to an internal
/// iterative loop, so a large `n` never grows the host call stack.
pub const RECURSION_ITERATION_THRESHOLD: u64 = 64;

impl BigIntMid {
    /// The canonical zero value.
    pub fn zero() -> Self {
        Self {
            sign: Sign::Positive,
            digits: vec![0],
        }
    }

    pub fn is_zero(&self) -> bool {
        self.digits == [0]
    }

    pub fn sign(&self) -> Sign {
        self.sign
    }

    pub fn digits(&self) -> &[u8] {
        &self.digits
    }

    /// Construct from a signed 64-bit integer.
    pub fn from_i64(value: i64) -> Self {
        let sign = if value < 0 {
            Sign::Negative
        } else {
            Sign::Positive
        };
        let mut magnitude = (value as i128).unsigned_abs() as u128;
        let mut digits = Vec::new();
        if magnitude == 0 {
            digits.push(0);
        }
        while magnitude > 0 {
            digits.push((magnitude % BASE as u128) as u8);
            magnitude /= BASE as u128;
        }
        let mut out = Self { sign, digits };
        out.normalize();
        out
    }

    /// Parse from a decimal string, optionally `-`-prefixed.
    pub fn from_decimal_str(text: &str) -> Result<Self, VmError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(VmError::InvalidInput);
        }
        let (sign, digits_str) = match text.strip_prefix('-') {
            Some(rest) => (Sign::Negative, rest),
            None => (Sign::Positive, text),
        };
        if digits_str.is_empty() || !digits_str.bytes().all(|b| b.is_ascii_digit()) {
            return Err(VmError::InvalidInput);
        }

        let mut value = Self::zero();
        let ten = Self::from_i64(10);
        for ch in digits_str.chars() {
            let digit = ch.to_digit(10).ok_or(VmError::InvalidInput)?;
            value = value.mul(&ten).add(&Self::from_i64(digit as i64));
        }
        if sign == Sign::Negative && !value.is_zero() {
            value.sign = Sign::Negative;
        }
        Ok(value)
    }

    /// Render as a decimal string, `-`-prefixed when negative.
    pub fn to_decimal_string(&self) -> String {
        let mut value = self.clone();
        value.sign = Sign::Positive;
        if value.is_zero() {
            return "0".to_string();
        }
        let ten = Self::from_i64(10);
        let mut rev_digits = Vec::new();
        while !value.is_zero() {
            let (quotient, remainder) = value.div_rem_small(&ten);
            rev_digits.push(char::from_digit(remainder as u32, 10).expect("remainder < 10"));
            value = quotient;
        }
        let mut out = String::new();
        if self.sign == Sign::Negative {
            out.push('-');
        }
        out.extend(rev_digits.into_iter().rev());
        out
    }

    pub fn neg(&self) -> Self {
        if self.is_zero() {
            return self.clone();
        }
        Self {
            sign: match self.sign {
                Sign::Positive => Sign::Negative,
                Sign::Negative => Sign::Positive,
            },
            digits: self.digits.clone(),
        }
    }

    pub fn add(&self, rhs: &Self) -> Self {
        if self.sign == rhs.sign {
            let mut out = Self {
                sign: self.sign,
                digits: add_magnitudes(&self.digits, &rhs.digits),
            };
            out.normalize();
            out
        } else {
            match cmp_magnitudes(&self.digits, &rhs.digits) {
                Ordering::Equal => Self::zero(),
                Ordering::Greater => {
                    let mut out = Self {
                        sign: self.sign,
                        digits: sub_magnitudes(&self.digits, &rhs.digits),
                    };
                    out.normalize();
                    out
                }
                Ordering::Less => {
                    let mut out = Self {
                        sign: rhs.sign,
                        digits: sub_magnitudes(&rhs.digits, &self.digits),
                    };
                    out.normalize();
                    out
                }
            }
        }
    }

    pub fn sub(&self, rhs: &Self) -> Self {
        self.add(&rhs.neg())
    }

    pub fn mul(&self, rhs: &Self) -> Self {
        if self.is_zero() || rhs.is_zero() {
            return Self::zero();
        }
        let mut product = vec![0u32; self.digits.len() + rhs.digits.len()];
        for (i, &a) in self.digits.iter().enumerate() {
            let mut carry = 0u32;
            for (j, &b) in rhs.digits.iter().enumerate() {
                let sum = product[i + j] + (a as u32) * (b as u32) + carry;
                product[i + j] = sum % BASE;
                carry = sum / BASE;
            }
            let mut k = i + rhs.digits.len();
            while carry > 0 {
                let sum = product[k] + carry;
                product[k] = sum % BASE;
                carry = sum / BASE;
                k += 1;
            }
        }
        let sign = if self.sign == rhs.sign {
            Sign::Positive
        } else {
            Sign::Negative
        };
        let mut out = Self {
            sign,
            digits: product.into_iter().map(|d| d as u8).collect(),
        };
        out.normalize();
        out
    }

    pub fn cmp(&self, rhs: &Self) -> Ordering {
        match (self.sign, rhs.sign) {
            (Sign::Positive, Sign::Negative) if !self.is_zero() || !rhs.is_zero() => {
                Ordering::Greater
            }
            (Sign::Negative, Sign::Positive) if !self.is_zero() || !rhs.is_zero() => {
                Ordering::Less
            }
            (Sign::Positive, _) => cmp_magnitudes(&self.digits, &rhs.digits),
            (Sign::Negative, _) => cmp_magnitudes(&rhs.digits, &self.digits),
        }
    }

    pub fn abs(&self) -> Self {
        Self {
            sign: Sign::Positive,
            digits: self.digits.clone(),
        }
    }

    /// Long division, magnitude over magnitude, signs combined the same way
    /// as `mul`. Fails with [`VmError::DivByZero`] when `rhs` is zero.
    pub fn div_rem(&self, rhs: &Self) -> Result<(Self, Self), VmError> {
        if rhs.is_zero() {
            return Err(VmError::DivByZero);
        }
        let mut remainder = Self::zero();
        let mut quotient_digits = vec![0u8; self.digits.len()];
        let rhs_magnitude = rhs.abs();
        for i in (0..self.digits.len()).rev() {
            remainder = remainder.mul(&Self::from_i64(BASE as i64));
            remainder = remainder.add(&Self::from_i64(self.digits[i] as i64));
            let mut count = 0u8;
            while remainder.cmp(&rhs_magnitude) != Ordering::Less {
                remainder = remainder.sub(&rhs_magnitude);
                count += 1;
            }
            quotient_digits[i] = count;
        }
        let quotient_sign = if self.sign == rhs.sign {
            Sign::Positive
        } else {
            Sign::Negative
        };
        let mut quotient = Self {
            sign: quotient_sign,
            digits: quotient_digits,
        };
        quotient.normalize();
        if self.sign == Sign::Negative {
            remainder = remainder.neg();
        }
        Ok((quotient, remainder))
    }

    /// Euclidean-style remainder only; fails the same way `div_rem` does.
    pub fn modulo(&self, rhs: &Self) -> Result<Self, VmError> {
        self.div_rem(rhs).map(|(_, remainder)| remainder)
    }

    /// Trim trailing (most-significant) zero digits; re-canonicalize the
    /// sign of zero.
    fn normalize(&mut self) {
        while self.digits.len() > 1 && *self.digits.last().unwrap() == 0 {
            self.digits.pop();
        }
        if self.is_zero() {
            self.sign = Sign::Positive;
        }
    }

    /// Divide by a small (single native-width) divisor, used only by
    /// `to_decimal_string`. Returns (quotient, remainder).
    fn div_rem_small(&self, divisor: &Self) -> (Self, u64) {
        let divisor_value = divisor
            .digits
            .iter()
            .rev()
            .fold(0u64, |acc, &d| acc * BASE as u64 + d as u64);
        let mut quotient_digits = vec![0u8; self.digits.len()];
        let mut remainder: u64 = 0;
        for i in (0..self.digits.len()).rev() {
            let acc = remainder * BASE as u64 + self.digits[i] as u64;
            quotient_digits[i] = (acc / divisor_value) as u8;
            remainder = acc % divisor_value;
        }
        let mut quotient = Self {
            sign: Sign::Positive,
            digits: quotient_digits,
        };
        quotient.normalize();
        (quotient, remainder)
    }

    /// §4.2 factorial: iterates once `n` exceeds
    /// [`RECURSION_ITERATION_THRESHOLD`] so large inputs never grow the
    /// host call stack; produces the same result as naive recursion either
    /// way.
    pub fn factorial(n: &Self) -> Self {
        if n.sign == Sign::Negative || n.is_zero() {
            return Self::from_i64(1);
        }
        let one = Self::from_i64(1);
        let mut acc = Self::from_i64(1);
        let mut k = one.clone();
        while k.cmp(n) != Ordering::Greater {
            acc = acc.mul(&k);
            k = k.add(&one);
        }
        acc
    }

    /// §4.2 tail-form Fibonacci: accumulator iteration, not the naive
    /// double recursion, so it terminates in O(n) steps without recursing.
    pub fn fibonacci(n: &Self) -> Self {
        if n.is_zero() {
            return Self::zero();
        }
        let one = Self::from_i64(1);
        let (mut a, mut b) = (Self::zero(), Self::from_i64(1));
        let mut k = one.clone();
        while k.cmp(n) == Ordering::Less {
            let next = a.add(&b);
            a = b;
            b = next;
            k = k.add(&one);
        }
        b
    }
}

impl fmt::Display for BigIntMid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

fn cmp_magnitudes(a: &[u8], b: &[u8]) -> Ordering {
    if a.len() != b.len() {
        return a.len().cmp(&b.len());
    }
    for i in (0..a.len()).rev() {
        if a[i] != b[i] {
            return a[i].cmp(&b[i]);
        }
    }
    Ordering::Equal
}

fn add_magnitudes(a: &[u8], b: &[u8]) -> Vec<u8> {
    let len = a.len().max(b.len());
    let mut out = Vec::with_capacity(len + 1);
    let mut carry = 0u32;
    for i in 0..len {
        let sum = *a.get(i).unwrap_or(&0) as u32 + *b.get(i).unwrap_or(&0) as u32 + carry;
        out.push((sum % BASE) as u8);
        carry = sum / BASE;
    }
    if carry > 0 {
        out.push(carry as u8);
    }
    out
}

/// Subtracts `b` from `a`, assuming `a >= b` in magnitude.
fn sub_magnitudes(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(a.len());
    let mut borrow = 0i32;
    for i in 0..a.len() {
        let mut diff = a[i] as i32 - *b.get(i).unwrap_or(&0) as i32 - borrow;
        if diff < 0 {
            diff += BASE as i32;
            borrow = 1;
        } else {
            borrow = 0;
        }
        out.push(diff as u8);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_then_neg_is_zero() {
        let x = BigIntMid::from_i64(123_456_789);
        assert!(x.add(&x.neg()).is_zero());
    }

    #[test]
    fn neg_neg_is_identity() {
        let x = BigIntMid::from_i64(-987);
        assert_eq!(x.neg().neg(), x);
    }

    #[test]
    fn addition_is_commutative() {
        let x = BigIntMid::from_i64(981_273);
        let y = BigIntMid::from_i64(-44_921);
        assert_eq!(x.add(&y), y.add(&x));
    }

    #[test]
    fn multiplication_is_commutative() {
        let x = BigIntMid::from_i64(4096);
        let y = BigIntMid::from_i64(-513);
        assert_eq!(x.mul(&y), y.mul(&x));
    }

    #[test]
    fn decimal_round_trip() {
        for text in ["0", "1", "-1", "999999999999999999", "-243000001"] {
            let value = BigIntMid::from_decimal_str(text).unwrap();
            assert_eq!(value.to_decimal_string(), text);
        }
    }

    #[test]
    fn zero_has_positive_sign() {
        let x = BigIntMid::from_i64(5).add(&BigIntMid::from_i64(-5));
        assert!(x.is_zero());
        assert_eq!(x.sign(), Sign::Positive);
    }

    #[test]
    fn no_trailing_zero_digit_unless_zero() {
        let x = BigIntMid::from_i64(243 * 243);
        assert_ne!(*x.digits().last().unwrap(), 0);
    }

    #[test]
    fn factorial_boundary_cases() {
        assert_eq!(
            BigIntMid::factorial(&BigIntMid::from_i64(0)).to_decimal_string(),
            "1"
        );
        assert_eq!(
            BigIntMid::factorial(&BigIntMid::from_i64(1)).to_decimal_string(),
            "1"
        );
        assert_eq!(
            BigIntMid::factorial(&BigIntMid::from_i64(5)).to_decimal_string(),
            "120"
        );
    }

    #[test]
    fn fibonacci_boundary_cases() {
        assert_eq!(BigIntMid::fibonacci(&BigIntMid::from_i64(0)).to_decimal_string(), "0");
        assert_eq!(BigIntMid::fibonacci(&BigIntMid::from_i64(1)).to_decimal_string(), "1");
        assert_eq!(BigIntMid::fibonacci(&BigIntMid::from_i64(2)).to_decimal_string(), "1");
        assert_eq!(BigIntMid::fibonacci(&BigIntMid::from_i64(10)).to_decimal_string(), "55");
    }

    #[test]
    fn factorial_does_not_recurse_for_large_n() {
        let n = BigIntMid::from_i64(RECURSION_ITERATION_THRESHOLD as i64 + 10);
        let result = BigIntMid::factorial(&n);
        assert!(!result.is_zero());
    }
}
