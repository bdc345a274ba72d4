//! Domain types for the points ledger.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Domain primitives: TimeMs, BlockHeight, Address, PositionId, TokenAmount
//! - Ledger entities: Account, BalanceTracker, LiquidityPosition
//! - Pool snapshots and the typed event stream

pub mod account;
pub mod decimal;
pub mod event;
pub mod pool;
pub mod position;
pub mod primitives;
pub mod tracker;

pub use account::{Account, PointTotals};
pub use decimal::Decimal;
pub use event::{
    EventMeta, LedgerEvent, LiquidityChange, PoolSwap, PositionTransfer, TokenTransfer,
};
pub use pool::{PoolState, PositionInfo};
pub use position::LiquidityPosition;
pub use primitives::{
    Address, AddressParseError, BlockHeight, PositionId, PositionIdParseError, TimeMs,
    TokenAmount,
};
pub use tracker::BalanceTracker;
