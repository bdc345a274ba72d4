//! Concentrated-liquidity position tracked for points.

use serde::{Deserialize, Serialize};

use super::{Address, PositionId, TimeMs, TokenAmount};

/// A liquidity position in the tracked pool.
///
/// `synthetic_balance` is the amount of the tracked token (token0) the position
/// currently represents; points accrue on it rather than on raw liquidity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityPosition {
    pub token_id: PositionId,
    pub owner: Address,
    pub liquidity: TokenAmount,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub synthetic_balance: TokenAmount,
    pub last_settled_at: Option<TimeMs>,
}
