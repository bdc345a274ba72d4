//! In-memory chain source for tests.

use super::{BlockTag, ChainError, ChainSource};
use crate::domain::{Address, BlockHeight, PoolState, PositionId, PositionInfo};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};

/// Values keyed by the block they take effect at. `None` means absent from then on.
#[derive(Debug, Clone)]
struct History<T>(BTreeMap<u64, Option<T>>);

impl<T> Default for History<T> {
    fn default() -> Self {
        History(BTreeMap::new())
    }
}

impl<T: Clone> History<T> {
    fn set(&mut self, block: BlockHeight, value: Option<T>) {
        self.0.insert(block.as_u64(), value);
    }

    fn at(&self, tag: BlockTag) -> Option<T> {
        let entry = match tag {
            BlockTag::Latest => self.0.values().next_back(),
            BlockTag::Number(height) => self.0.range(..=height.as_u64()).next_back().map(|(_, v)| v),
        };
        entry.cloned().flatten()
    }

    fn latest_mut(&mut self) -> Option<&mut T> {
        self.0.values_mut().next_back().and_then(Option::as_mut)
    }
}

/// Mock chain source with per-block state so tests can replay history.
///
/// Plain setters write at block 0, i.e. state that holds for every block until a
/// later `*_at` entry overrides it.
#[derive(Debug, Default)]
pub struct MockChainSource {
    pools: RwLock<HashMap<Address, History<PoolState>>>,
    positions: RwLock<HashMap<PositionId, History<PositionInfo>>>,
    registry: RwLock<HashMap<(Address, Address), Address>>,
    fail_pool_queries: AtomicBool,
    fail_pool_after: Mutex<Option<usize>>,
    pool_queries: AtomicUsize,
    queried_blocks: Mutex<Vec<BlockTag>>,
}

impl MockChainSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pool, also recording it in the pair registry.
    pub fn with_pool(self, pool: Address, state: PoolState) -> Self {
        self.set_pool(pool, state);
        self
    }

    pub fn with_position(self, token_id: PositionId, info: PositionInfo) -> Self {
        self.set_position(token_id, info);
        self
    }

    pub fn set_pool(&self, pool: Address, state: PoolState) {
        self.set_pool_at(pool, BlockHeight::new(0), state);
    }

    /// Pool state from `block` onwards.
    pub fn set_pool_at(&self, pool: Address, block: BlockHeight, state: PoolState) {
        if let Ok(mut registry) = self.registry.write() {
            registry.insert((state.token0.clone(), state.token1.clone()), pool.clone());
        }
        if let Ok(mut pools) = self.pools.write() {
            pools.entry(pool).or_default().set(block, Some(state));
        }
    }

    /// Move the pool's most recent state to a new tick / sqrt price.
    pub fn set_pool_price(&self, pool: &Address, tick: i32, sqrt_price_x96: primitive_types::U256) {
        if let Ok(mut pools) = self.pools.write() {
            if let Some(state) = pools.get_mut(pool).and_then(History::latest_mut) {
                state.tick = tick;
                state.sqrt_price_x96 = sqrt_price_x96;
            }
        }
    }

    pub fn set_position(&self, token_id: PositionId, info: PositionInfo) {
        self.set_position_at(token_id, BlockHeight::new(0), info);
    }

    /// Position state from `block` onwards.
    pub fn set_position_at(&self, token_id: PositionId, block: BlockHeight, info: PositionInfo) {
        if let Ok(mut positions) = self.positions.write() {
            positions.entry(token_id).or_default().set(block, Some(info));
        }
    }

    /// Burn the position at `block`; queries from then on return `None`.
    pub fn remove_position_at(&self, token_id: &PositionId, block: BlockHeight) {
        if let Ok(mut positions) = self.positions.write() {
            positions.entry(token_id.clone()).or_default().set(block, None);
        }
    }

    /// Make every pool-state query fail with a network error.
    pub fn fail_pool_queries(&self, fail: bool) {
        self.fail_pool_queries.store(fail, Ordering::SeqCst);
    }

    /// Serve `served` more pool-state queries, then fail every one after that.
    pub fn fail_pool_queries_after(&self, served: usize) {
        if let Ok(mut limit) = self.fail_pool_after.lock() {
            *limit = Some(self.pool_query_count() + served);
        }
    }

    /// Number of pool-state queries served so far.
    pub fn pool_query_count(&self) -> usize {
        self.pool_queries.load(Ordering::SeqCst)
    }

    /// Block of every query served so far, in arrival order.
    pub fn queried_blocks(&self) -> Vec<BlockTag> {
        self.queried_blocks
            .lock()
            .map(|blocks| blocks.clone())
            .unwrap_or_default()
    }

    fn record(&self, at: BlockTag) {
        if let Ok(mut blocks) = self.queried_blocks.lock() {
            blocks.push(at);
        }
    }
}

#[async_trait]
impl ChainSource for MockChainSource {
    async fn pool_state(&self, pool: &Address, at: BlockTag) -> Result<PoolState, ChainError> {
        let served = self.pool_queries.fetch_add(1, Ordering::SeqCst);
        self.record(at);
        let over_limit = self
            .fail_pool_after
            .lock()
            .map(|limit| limit.map_or(false, |limit| served >= limit))
            .unwrap_or(false);
        if over_limit || self.fail_pool_queries.load(Ordering::SeqCst) {
            return Err(ChainError::NetworkError("mock pool query failure".to_string()));
        }
        self.pools
            .read()
            .map_err(|e| ChainError::NetworkError(e.to_string()))?
            .get(pool)
            .and_then(|history| history.at(at))
            .ok_or_else(|| ChainError::Reverted(format!("no pool at {} (block {})", pool, at)))
    }

    async fn position_info(
        &self,
        token_id: &PositionId,
        at: BlockTag,
    ) -> Result<Option<PositionInfo>, ChainError> {
        self.record(at);
        Ok(self
            .positions
            .read()
            .map_err(|e| ChainError::NetworkError(e.to_string()))?
            .get(token_id)
            .and_then(|history| history.at(at)))
    }

    async fn pool_by_pair(
        &self,
        token0: &Address,
        token1: &Address,
        at: BlockTag,
    ) -> Result<Address, ChainError> {
        self.record(at);
        Ok(self
            .registry
            .read()
            .map_err(|e| ChainError::NetworkError(e.to_string()))?
            .get(&(token0.clone(), token1.clone()))
            .cloned()
            .unwrap_or_else(Address::null))
    }
}
