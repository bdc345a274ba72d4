//! Domain primitives: TimeMs, BlockHeight, Address, PositionId, TokenAmount.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        TimeMs(chrono::Utc::now().timestamp_millis())
    }

    /// Get the underlying milliseconds value.
    pub fn as_ms(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for TimeMs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Block number an event was emitted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockHeight(pub u64);

impl BlockHeight {
    pub fn new(height: u64) -> Self {
        BlockHeight(height)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BlockHeight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressParseError {
    #[error("address must start with 0x: {0}")]
    MissingPrefix(String),
    #[error("address must be 20 bytes of hex: {0}")]
    InvalidHex(String),
}

/// EVM account address, normalized to lowercase `0x`-prefixed hex.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// The null address. Transfers to it are burns, transfers from it are mints.
    pub const NULL: &'static str = "0x0000000000000000000000000000000000000000";

    pub fn null() -> Self {
        Address(Self::NULL.to_string())
    }

    pub fn is_null(&self) -> bool {
        self.0 == Self::NULL
    }

    /// Build an address from its 20 raw bytes.
    pub fn from_bytes(bytes: &[u8; 20]) -> Self {
        Address(format!("0x{}", hex::encode(bytes)))
    }

    /// Get the address as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw 20 bytes of the address.
    pub fn to_bytes(&self) -> [u8; 20] {
        let mut out = [0u8; 20];
        // Validated on construction, so decoding cannot fail.
        if let Ok(bytes) = hex::decode(&self.0[2..]) {
            out.copy_from_slice(&bytes);
        }
        out
    }
}

impl FromStr for Address {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let body = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| AddressParseError::MissingPrefix(s.to_string()))?;
        match hex::decode(body) {
            Ok(bytes) if bytes.len() == 20 => Ok(Address(format!("0x{}", body.to_lowercase()))),
            _ => Err(AddressParseError::InvalidHex(s.to_string())),
        }
    }
}

impl TryFrom<String> for Address {
    type Error = AddressParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Address::from_str(&value)
    }
}

impl From<Address> for String {
    fn from(value: Address) -> Self {
        value.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-fungible position token id, kept in its decimal string form.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PositionId(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("position id must be a decimal integer: {0}")]
pub struct PositionIdParseError(String);

impl PositionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PositionId {
    type Err = PositionIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PositionIdParseError(s.to_string()));
        }
        let canonical = trimmed.trim_start_matches('0');
        let canonical = if canonical.is_empty() { "0" } else { canonical };
        Ok(PositionId(canonical.to_string()))
    }
}

impl TryFrom<String> for PositionId {
    type Error = PositionIdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        PositionId::from_str(&value)
    }
}

impl From<u64> for PositionId {
    fn from(value: u64) -> Self {
        PositionId(value.to_string())
    }
}

impl From<PositionId> for String {
    fn from(value: PositionId) -> Self {
        value.0
    }
}

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Non-negative integer amount in a token's smallest unit (or raw liquidity units).
///
/// Serialized as a decimal string since values routinely exceed 2^53.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenAmount(u128);

impl TokenAmount {
    pub const ZERO: TokenAmount = TokenAmount(0);

    pub fn new(value: u128) -> Self {
        TokenAmount(value)
    }

    pub fn as_u128(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, rhs: TokenAmount) -> Option<TokenAmount> {
        self.0.checked_add(rhs.0).map(TokenAmount)
    }

    /// `None` when the result would be negative.
    pub fn checked_sub(self, rhs: TokenAmount) -> Option<TokenAmount> {
        self.0.checked_sub(rhs.0).map(TokenAmount)
    }
}

impl FromStr for TokenAmount {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u128>().map(TokenAmount)
    }
}

impl TryFrom<String> for TokenAmount {
    type Error = std::num::ParseIntError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TokenAmount::from_str(&value)
    }
}

impl From<TokenAmount> for String {
    fn from(value: TokenAmount) -> Self {
        value.0.to_string()
    }
}

impl From<u128> for TokenAmount {
    fn from(value: u128) -> Self {
        TokenAmount(value)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_normalizes_case() {
        let addr = Address::from_str("0x2416092F143378750BB29B79eD961ab195CcEea5").unwrap();
        assert_eq!(addr.as_str(), "0x2416092f143378750bb29b79ed961ab195cceea5");
    }

    #[test]
    fn test_address_rejects_bad_input() {
        assert!(matches!(
            Address::from_str("2416092f143378750bb29b79ed961ab195cceea5"),
            Err(AddressParseError::MissingPrefix(_))
        ));
        assert!(matches!(
            Address::from_str("0x1234"),
            Err(AddressParseError::InvalidHex(_))
        ));
        assert!(matches!(
            Address::from_str("0xzz16092f143378750bb29b79ed961ab195cceea5"),
            Err(AddressParseError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_address_bytes_roundtrip() {
        let addr = Address::from_str("0xaa45265a94c93802be9511e426933239117e658f").unwrap();
        assert_eq!(Address::from_bytes(&addr.to_bytes()), addr);
        assert!(Address::null().is_null());
    }

    #[test]
    fn test_address_serde_validates() {
        let ok: Result<Address, _> =
            serde_json::from_str("\"0x00C7F3082833E796A5B3E4BD59F6642FF44DCD15\"");
        assert_eq!(
            ok.unwrap().as_str(),
            "0x00c7f3082833e796a5b3e4bd59f6642ff44dcd15"
        );
        let bad: Result<Address, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_position_id_canonical() {
        assert_eq!(PositionId::from_str("000123").unwrap().as_str(), "123");
        assert_eq!(PositionId::from_str("0").unwrap().as_str(), "0");
        assert!(PositionId::from_str("12a").is_err());
        assert!(PositionId::from_str("").is_err());
    }

    #[test]
    fn test_token_amount_checked_ops() {
        let a = TokenAmount::new(5);
        assert_eq!(a.checked_sub(TokenAmount::new(6)), None);
        assert_eq!(a.checked_add(TokenAmount::new(6)), Some(TokenAmount::new(11)));
        assert_eq!(
            TokenAmount::new(u128::MAX).checked_add(TokenAmount::new(1)),
            None
        );
    }

    #[test]
    fn test_token_amount_serializes_as_string() {
        let json = serde_json::to_string(&TokenAmount::new(1_000_000_000_000_000_000)).unwrap();
        assert_eq!(json, "\"1000000000000000000\"");
    }

    #[test]
    fn test_timems_ordering() {
        assert!(TimeMs::new(1000) < TimeMs::new(2000));
    }
}
