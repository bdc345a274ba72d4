//! Token balance tracker: the accrual state of one holder of the tracked token.

use serde::{Deserialize, Serialize};

use super::{Address, TimeMs, TokenAmount};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceTracker {
    pub address: Address,
    pub balance: TokenAmount,
    /// `None` until the first settlement; the first observation accrues nothing.
    pub last_settled_at: Option<TimeMs>,
}

impl BalanceTracker {
    /// Zero-balance tracker for an address seen for the first time.
    pub fn new(address: Address) -> Self {
        Self {
            address,
            balance: TokenAmount::ZERO,
            last_settled_at: None,
        }
    }
}
