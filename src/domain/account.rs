//! Point-earning account keyed by wallet address.

use serde::{Deserialize, Serialize};

use super::{Address, Decimal};

/// Settled point totals for one wallet.
///
/// Both totals only ever grow: settlement adds non-negative deltas and nothing
/// else mutates an account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub address: Address,
    pub linear_points: Decimal,
    pub boosted_points: Decimal,
}

impl Account {
    /// A fresh account with zero points.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            linear_points: Decimal::zero(),
            boosted_points: Decimal::zero(),
        }
    }

    /// Add a settlement delta. Returns `None` if either total would overflow.
    pub fn credit(&self, linear: Decimal, boosted: Decimal) -> Option<Account> {
        Some(Account {
            address: self.address.clone(),
            linear_points: self.linear_points.checked_add(linear)?,
            boosted_points: self.boosted_points.checked_add(boosted)?,
        })
    }
}

/// Running totals across every account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointTotals {
    pub linear_points: Decimal,
    pub boosted_points: Decimal,
}
