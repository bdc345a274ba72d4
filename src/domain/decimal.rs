//! Lossless decimal numeric type backed by rust_decimal.
//!
//! Points are stored and served in canonical string form (no exponent, no trailing
//! zeros) so that long-running totals never pass through floating point.

use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::TokenAmount;

/// Lossless decimal numeric type for point arithmetic.
///
/// Serializes to a JSON string to keep full precision on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
pub struct Decimal(#[serde(deserialize_with = "rust_decimal::serde::str::deserialize")] RustDecimal);

/// Always the canonical form, whatever scale arithmetic left behind.
impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_canonical_string())
    }
}

impl Decimal {
    /// Create a Decimal from a RustDecimal.
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Decimal)
    }

    /// Express an integer amount of a token's smallest unit in whole tokens.
    ///
    /// `1_000_000_000_000_000_000` with 18 decimals becomes `1`.
    ///
    /// # Errors
    /// Returns an error if the amount does not fit the 96-bit mantissa or the
    /// scale exceeds 28.
    pub fn from_token_units(amount: TokenAmount, decimals: u32) -> Result<Self, rust_decimal::Error> {
        let raw = i128::try_from(amount.as_u128())
            .map_err(|_| rust_decimal::Error::ExceedsMaximumPossibleValue)?;
        RustDecimal::try_from_i128_with_scale(raw, decimals).map(|d| Decimal(d.normalize()))
    }

    /// Format the Decimal as a canonical string (no exponent notation).
    pub fn to_canonical_string(&self) -> String {
        let normalized = self.0.normalize();
        format!("{}", normalized)
    }

    /// Get the underlying RustDecimal.
    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    /// The additive identity (0).
    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    /// Returns true if the value is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    pub fn checked_add(self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_add(rhs.0).map(Decimal)
    }

    pub fn checked_mul(self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_mul(rhs.0).map(Decimal)
    }

    pub fn checked_div(self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_div(rhs.0).map(Decimal)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl From<u32> for Decimal {
    fn from(value: u32) -> Self {
        Decimal(RustDecimal::from(value))
    }
}

impl From<i64> for Decimal {
    fn from(value: i64) -> Self {
        Decimal(RustDecimal::from(value))
    }
}

impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl std::ops::Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}

impl std::iter::Sum for Decimal {
    fn sum<I: Iterator<Item = Decimal>>(iter: I) -> Self {
        iter.fold(Decimal::zero(), |acc, d| acc + d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_decimal_canonical_strips_trailing_zeros() {
        assert_eq!(d("1.500000").to_canonical_string(), "1.5");
        assert_eq!(d("123").to_canonical_string(), "123");
        assert!(!d("0.0000001").to_canonical_string().contains('e'));
    }

    #[test]
    fn test_from_token_units_eighteen_decimals() {
        let one = Decimal::from_token_units(TokenAmount::new(1_000_000_000_000_000_000), 18).unwrap();
        assert_eq!(one, d("1"));

        let half = Decimal::from_token_units(TokenAmount::new(500_000_000_000_000_000), 18).unwrap();
        assert_eq!(half, d("0.5"));

        let dust = Decimal::from_token_units(TokenAmount::new(1), 18).unwrap();
        assert_eq!(dust.to_canonical_string(), "0.000000000000000001");
    }

    #[test]
    fn test_from_token_units_rejects_oversized_amounts() {
        // Above the 96-bit mantissa.
        let huge = TokenAmount::new(1u128 << 100);
        assert!(Decimal::from_token_units(huge, 18).is_err());
    }

    #[test]
    fn test_checked_arithmetic() {
        assert_eq!(d("10.5").checked_add(d("2.5")), Some(d("13")));
        assert_eq!(d("10.5").checked_mul(d("2")), Some(d("21")));
        assert_eq!(d("1").checked_div(Decimal::zero()), None);
        assert_eq!(Decimal::new(RustDecimal::MAX).checked_add(d("1")), None);
    }

    #[test]
    fn test_decimal_json_is_string() {
        let json = serde_json::to_value(d("123.456")).unwrap();
        assert_eq!(json, serde_json::json!("123.456"));
        let back: Decimal = serde_json::from_value(json).unwrap();
        assert_eq!(back, d("123.456"));
    }

    #[test]
    fn test_json_uses_canonical_form() {
        let json = serde_json::to_value(d("2.500")).unwrap();
        assert_eq!(json, serde_json::json!("2.5"));
    }

    #[test]
    fn test_sum() {
        let total: Decimal = vec![d("1.25"), d("2"), d("0.75")].into_iter().sum();
        assert_eq!(total, d("4"));
    }
}
