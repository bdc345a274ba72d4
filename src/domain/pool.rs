//! Concentrated-liquidity pool and position-manager snapshots.

use primitive_types::U256;

use super::{Address, TokenAmount};

/// Live state of the tracked pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolState {
    /// Current sqrt(price) as a Q64.96 fixed-point number.
    pub sqrt_price_x96: U256,
    pub tick: i32,
    /// Total in-range liquidity.
    pub liquidity: u128,
    pub token0: Address,
    pub token1: Address,
}

/// A position as reported by the position-manager contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionInfo {
    pub owner: Address,
    pub token0: Address,
    pub token1: Address,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: TokenAmount,
}
