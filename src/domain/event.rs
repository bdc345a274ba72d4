//! Typed chain events delivered by the upstream dispatcher.

use serde::{Deserialize, Serialize};

use super::{Address, BlockHeight, PositionId, TimeMs, TokenAmount};

/// Where an event was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMeta {
    pub block_height: BlockHeight,
    pub timestamp: TimeMs,
}

/// Transfer of the tracked token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTransfer {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub from: Address,
    pub to: Address,
    pub value: TokenAmount,
}

/// Transfer of a position NFT. `from == null` is a mint, `to == null` a burn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionTransfer {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub token_id: PositionId,
    pub from: Address,
    pub to: Address,
}

/// Liquidity added to or removed from a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidityChange {
    #[serde(flatten)]
    pub meta: EventMeta,
    pub token_id: PositionId,
    pub pool: Address,
    /// Amount of the tracked token moved by the change.
    pub amount_of_token: TokenAmount,
    pub liquidity_delta: TokenAmount,
}

/// A swap on the tracked pool; price and tick may have moved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolSwap {
    #[serde(flatten)]
    pub meta: EventMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum LedgerEvent {
    TokenTransfer(TokenTransfer),
    PositionTransfer(PositionTransfer),
    IncreaseLiquidity(LiquidityChange),
    DecreaseLiquidity(LiquidityChange),
    PoolSwap(PoolSwap),
}

impl LedgerEvent {
    pub fn meta(&self) -> EventMeta {
        match self {
            LedgerEvent::TokenTransfer(e) => e.meta,
            LedgerEvent::PositionTransfer(e) => e.meta,
            LedgerEvent::IncreaseLiquidity(e) => e.meta,
            LedgerEvent::DecreaseLiquidity(e) => e.meta,
            LedgerEvent::PoolSwap(e) => e.meta,
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::TokenTransfer(_) => "tokenTransfer",
            LedgerEvent::PositionTransfer(_) => "positionTransfer",
            LedgerEvent::IncreaseLiquidity(_) => "increaseLiquidity",
            LedgerEvent::DecreaseLiquidity(_) => "decreaseLiquidity",
            LedgerEvent::PoolSwap(_) => "poolSwap",
        }
    }
}
