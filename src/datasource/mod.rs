//! Chain-state abstraction: pool state, position-manager and pool-registry reads.

use crate::domain::{Address, BlockHeight, PoolState, PositionId, PositionInfo};
use async_trait::async_trait;
use std::fmt;

pub mod mock;
pub mod rpc;

pub use mock::MockChainSource;
pub use rpc::JsonRpcChainSource;

/// Block whose state a query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockTag {
    /// Chain head.
    Latest,
    /// State after the given block.
    Number(BlockHeight),
}

impl BlockTag {
    /// JSON-RPC block parameter.
    pub fn to_rpc_param(&self) -> String {
        match self {
            BlockTag::Latest => "latest".to_string(),
            BlockTag::Number(height) => format!("0x{:x}", height.as_u64()),
        }
    }
}

impl From<BlockHeight> for BlockTag {
    fn from(height: BlockHeight) -> Self {
        BlockTag::Number(height)
    }
}

impl fmt::Display for BlockTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockTag::Latest => write!(f, "latest"),
            BlockTag::Number(height) => write!(f, "{}", height),
        }
    }
}

/// Read-only view of the contracts the ledger depends on, at a chosen block.
///
/// Implementations must handle retry/backoff for transient failures; any error
/// that still escapes is treated as transient by the reconciler.
#[async_trait]
pub trait ChainSource: Send + Sync + fmt::Debug {
    /// Price, tick and liquidity of a pool.
    async fn pool_state(&self, pool: &Address, at: BlockTag) -> Result<PoolState, ChainError>;

    /// Position details by token id.
    ///
    /// # Returns
    /// `None` if the position does not exist at `at` (not yet minted or already burned).
    async fn position_info(
        &self,
        token_id: &PositionId,
        at: BlockTag,
    ) -> Result<Option<PositionInfo>, ChainError>;

    /// Pool address registered for a token pair.
    async fn pool_by_pair(
        &self,
        token0: &Address,
        token1: &Address,
        at: BlockTag,
    ) -> Result<Address, ChainError>;
}

/// Error type for chain-state queries.
#[derive(Debug, Clone)]
pub enum ChainError {
    /// Network error (connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error from the RPC endpoint
    HttpError { status: u16, message: String },
    /// JSON-RPC error object returned by the node
    Rpc { code: i64, message: String },
    /// The call reverted
    Reverted(String),
    /// Malformed response or ABI data
    DecodeError(String),
    /// Rate limit exceeded
    RateLimited,
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            ChainError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            ChainError::Rpc { code, message } => write!(f, "RPC error {}: {}", code, message),
            ChainError::Reverted(msg) => write!(f, "Execution reverted: {}", msg),
            ChainError::DecodeError(msg) => write!(f, "Decode error: {}", msg),
            ChainError::RateLimited => write!(f, "Rate limited"),
        }
    }
}

impl std::error::Error for ChainError {}
