pub mod api;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;

pub use config::Config;
pub use datasource::{BlockTag, ChainError, ChainSource, JsonRpcChainSource, MockChainSource};
pub use db::{init_db, LedgerBatch, PointsUpdated, Repository};
pub use domain::{
    Account, Address, BalanceTracker, BlockHeight, Decimal, LedgerEvent, LiquidityPosition,
    PointTotals, PositionId, TimeMs, TokenAmount,
};
pub use error::AppError;
pub use orchestration::{Dispatcher, EventOutcome, IgnoreReason, Ledger, ReconcileError};
