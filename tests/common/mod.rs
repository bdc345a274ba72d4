#![allow(dead_code)]

use points_ledger::config::Config;
use points_ledger::datasource::MockChainSource;
use points_ledger::db::init_db;
use points_ledger::domain::{
    Address, BlockHeight, Decimal, EventMeta, LedgerEvent, LiquidityChange, PoolState, PoolSwap,
    PositionId, PositionInfo, PositionTransfer, TimeMs, TokenAmount, TokenTransfer,
};
use points_ledger::engine::tick_math::sqrt_ratio_at_tick;
use points_ledger::{Dispatcher, Ledger, Repository};
use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempDir;

pub const ONE_TOKEN: u128 = 1_000_000_000_000_000_000;
pub const HOUR_MS: i64 = 3_600_000;
pub const LIQUIDITY: u128 = 1_000_000_000_000_000_000_000;

pub fn token() -> Address {
    Address::from_str("0x2416092f143378750bb29b79ed961ab195cceea5").unwrap()
}

pub fn weth() -> Address {
    Address::from_str("0x82af49447d8a07e3bd95bd0d56f35241523fbab1").unwrap()
}

pub fn pool() -> Address {
    Address::from_str("0xaa45265a94c93802be9511e426933239117e658f").unwrap()
}

pub fn addr(n: u8) -> Address {
    Address::from_bytes(&[n; 20])
}

pub fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn test_config() -> Config {
    let mut excluded_addresses = BTreeSet::new();
    excluded_addresses.insert(Address::null());
    excluded_addresses.insert(pool());
    Config {
        port: 0,
        database_path: ":memory:".to_string(),
        rpc_url: "http://example.invalid".to_string(),
        tracked_token: token(),
        tracked_pool: pool(),
        position_manager: Address::from_str("0x00c7f3082833e796a5b3e4bd59f6642ff44dcd15").unwrap(),
        pool_registry: Address::from_str("0x9c2abd632771b433e5e7507bcaa41ca3b25d8544").unwrap(),
        token_decimals: 18,
        token_start_block: BlockHeight::new(0),
        position_manager_start_block: BlockHeight::new(0),
        pool_start_block: BlockHeight::new(0),
        token_boost: Decimal::from(1u32),
        pool_boost: Decimal::from(4u32),
        excluded_addresses,
        sweep_interval_secs: 3600,
        sweep_concurrency: 4,
    }
}

pub fn pool_at(tick: i32) -> PoolState {
    PoolState {
        sqrt_price_x96: sqrt_ratio_at_tick(tick).unwrap(),
        tick,
        liquidity: LIQUIDITY,
        token0: token(),
        token1: weth(),
    }
}

pub fn position_info(owner: Address, liquidity: u128) -> PositionInfo {
    PositionInfo {
        owner,
        token0: token(),
        token1: weth(),
        tick_lower: 100,
        tick_upper: 200,
        liquidity: TokenAmount::new(liquidity),
    }
}

pub struct Harness {
    pub dispatcher: Arc<Dispatcher>,
    pub repo: Arc<Repository>,
    pub chain: Arc<MockChainSource>,
    _temp: TempDir,
}

pub async fn setup(chain: MockChainSource) -> Harness {
    setup_with_config(chain, test_config()).await
}

pub async fn setup_with_config(chain: MockChainSource, config: Config) -> Harness {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();
    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let chain = Arc::new(chain);
    let ledger = Arc::new(Ledger::new(repo.clone(), chain.clone(), config));
    Harness {
        dispatcher: Arc::new(Dispatcher::new(ledger)),
        repo,
        chain,
        _temp: temp_dir,
    }
}

/// Chain with the tracked pool at `tick`.
pub fn chain_at(tick: i32) -> MockChainSource {
    MockChainSource::new().with_pool(pool(), pool_at(tick))
}

fn meta(block: u64, timestamp: i64) -> EventMeta {
    EventMeta {
        block_height: BlockHeight::new(block),
        timestamp: TimeMs::new(timestamp),
    }
}

pub fn token_transfer(timestamp: i64, from: Address, to: Address, value: u128) -> LedgerEvent {
    LedgerEvent::TokenTransfer(TokenTransfer {
        meta: meta(1_000, timestamp),
        from,
        to,
        value: TokenAmount::new(value),
    })
}

pub fn position_transfer(timestamp: i64, id: u64, from: Address, to: Address) -> LedgerEvent {
    LedgerEvent::PositionTransfer(PositionTransfer {
        meta: meta(1_000, timestamp),
        token_id: PositionId::from(id),
        from,
        to,
    })
}

fn liquidity_change(timestamp: i64, id: u64, delta: u128) -> LiquidityChange {
    LiquidityChange {
        meta: meta(1_000, timestamp),
        token_id: PositionId::from(id),
        pool: pool(),
        amount_of_token: TokenAmount::new(0),
        liquidity_delta: TokenAmount::new(delta),
    }
}

pub fn increase(timestamp: i64, id: u64, delta: u128) -> LedgerEvent {
    LedgerEvent::IncreaseLiquidity(liquidity_change(timestamp, id, delta))
}

pub fn decrease(timestamp: i64, id: u64, delta: u128) -> LedgerEvent {
    LedgerEvent::DecreaseLiquidity(liquidity_change(timestamp, id, delta))
}

pub fn swap(timestamp: i64) -> LedgerEvent {
    LedgerEvent::PoolSwap(PoolSwap {
        meta: meta(1_000, timestamp),
    })
}

/// Re-stamp an event with another block height.
pub fn at_block(mut event: LedgerEvent, block: u64) -> LedgerEvent {
    let meta = match &mut event {
        LedgerEvent::TokenTransfer(e) => &mut e.meta,
        LedgerEvent::PositionTransfer(e) => &mut e.meta,
        LedgerEvent::IncreaseLiquidity(e) | LedgerEvent::DecreaseLiquidity(e) => &mut e.meta,
        LedgerEvent::PoolSwap(e) => &mut e.meta,
    };
    meta.block_height = BlockHeight::new(block);
    event
}

/// Points for holding `amount` base units for `ms` milliseconds at 18 decimals.
pub fn points_for(amount: TokenAmount, ms: i64) -> Decimal {
    Decimal::from_token_units(amount, 18)
        .unwrap()
        .checked_mul(Decimal::from(ms))
        .unwrap()
        .checked_div(Decimal::from(HOUR_MS))
        .unwrap()
}
