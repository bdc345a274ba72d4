//! Shared load, settle and commit steps used by the reconciler and the sweeper.

use crate::config::{Config, PointSource};
use crate::datasource::{BlockTag, ChainSource};
use crate::db::{LedgerBatch, PointsUpdated, Repository};
use crate::domain::{
    Address, BalanceTracker, Decimal, LiquidityPosition, PoolState, PositionId, TimeMs,
    TokenAmount,
};
use crate::engine::{accrual, synthetic_balance, AccrualCalculator, AccrualState};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use super::{IgnoreReason, ReconcileError};

const NOTIFICATION_CAPACITY: usize = 1024;

/// What to do when a tracker does not exist yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationPolicy {
    /// Return nothing.
    Reject,
    /// Start a zero-balance tracker.
    Synthesize,
}

/// How an unseen position is initialised from the position manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionCreation {
    /// Observed on its mint transfer: liquidity arrives with the following increase.
    Mint,
    /// Observed late: take the position manager's current liquidity.
    Discover,
}

/// An entity together with whether this load created it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Loaded<T> {
    Existing(T),
    Created(T),
}

impl<T> Loaded<T> {
    pub fn is_created(&self) -> bool {
        matches!(self, Loaded::Created(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Loaded::Existing(t) | Loaded::Created(t) => t,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionLoad {
    Found(Loaded<LiquidityPosition>),
    Ignored(IgnoreReason),
}

/// Ledger state access plus the accrual rules every handler applies.
#[derive(Debug)]
pub struct Ledger {
    repo: Arc<Repository>,
    chain: Arc<dyn ChainSource>,
    config: Config,
    calculator: AccrualCalculator,
    notifier: broadcast::Sender<PointsUpdated>,
}

impl Ledger {
    pub fn new(repo: Arc<Repository>, chain: Arc<dyn ChainSource>, config: Config) -> Self {
        let (notifier, _) = broadcast::channel(NOTIFICATION_CAPACITY);
        Self {
            calculator: AccrualCalculator::new(config.token_decimals),
            repo,
            chain,
            config,
            notifier,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn repo(&self) -> &Arc<Repository> {
        &self.repo
    }

    /// Settlement notifications, one per credited account per commit.
    pub fn subscribe(&self) -> broadcast::Receiver<PointsUpdated> {
        self.notifier.subscribe()
    }

    /// Load a tracker. Excluded addresses always yield `None`.
    pub async fn load_tracker(
        &self,
        address: &Address,
        policy: CreationPolicy,
    ) -> Result<Option<Loaded<BalanceTracker>>, ReconcileError> {
        if self.config.is_excluded(address) {
            return Ok(None);
        }
        match self.repo.get_tracker(address).await? {
            Some(tracker) => Ok(Some(Loaded::Existing(tracker))),
            None => match policy {
                CreationPolicy::Reject => Ok(None),
                CreationPolicy::Synthesize => {
                    Ok(Some(Loaded::Created(BalanceTracker::new(address.clone()))))
                }
            },
        }
    }

    /// Load a position, synthesizing it from the position manager's state at `at`
    /// when it is not stored yet.
    ///
    /// A synthesized position has a zero synthetic balance and no settlement
    /// timestamp; the caller syncs it against the pool before persisting.
    pub async fn load_position(
        &self,
        token_id: &PositionId,
        creation: PositionCreation,
        at: BlockTag,
    ) -> Result<PositionLoad, ReconcileError> {
        if let Some(position) = self.repo.get_position(token_id).await? {
            return Ok(PositionLoad::Found(Loaded::Existing(position)));
        }
        if self.repo.is_position_removed(token_id).await? {
            return Ok(PositionLoad::Ignored(IgnoreReason::PositionRemoved));
        }

        let info = match self.chain.position_info(token_id, at).await? {
            Some(info) => info,
            None => return Ok(PositionLoad::Ignored(IgnoreReason::UnknownPosition)),
        };
        let pool = self
            .chain
            .pool_by_pair(&info.token0, &info.token1, at)
            .await?;
        if pool != self.config.tracked_pool {
            debug!(token_id = %token_id, pool = %pool, "Position belongs to another pool");
            return Ok(PositionLoad::Ignored(IgnoreReason::ForeignPool));
        }
        if info.tick_lower >= info.tick_upper {
            return Err(ReconcileError::InvariantViolation(format!(
                "position {} has tick range [{}, {})",
                token_id, info.tick_lower, info.tick_upper
            )));
        }

        let liquidity = match creation {
            PositionCreation::Mint => TokenAmount::ZERO,
            PositionCreation::Discover => info.liquidity,
        };
        Ok(PositionLoad::Found(Loaded::Created(LiquidityPosition {
            token_id: token_id.clone(),
            owner: info.owner,
            liquidity,
            tick_lower: info.tick_lower,
            tick_upper: info.tick_upper,
            synthetic_balance: TokenAmount::ZERO,
            last_settled_at: None,
        })))
    }

    pub async fn tracked_pool_state(&self, at: BlockTag) -> Result<PoolState, ReconcileError> {
        Ok(self.chain.pool_state(&self.config.tracked_pool, at).await?)
    }

    /// Settle a tracker's pending accrual into `batch` and advance its timestamp.
    pub fn settle_tracker(
        &self,
        tracker: &mut BalanceTracker,
        now: TimeMs,
        batch: &mut LedgerBatch,
    ) -> Result<(), ReconcileError> {
        let settlement = self.calculator.settle(
            now,
            &AccrualState {
                balance: tracker.balance,
                last_settled_at: tracker.last_settled_at,
            },
        )?;
        tracker.last_settled_at = settlement.state.last_settled_at;
        self.credit(&tracker.address, settlement.delta, PointSource::Token, batch)
    }

    /// Settle a position's pending accrual on its current synthetic balance.
    pub fn settle_position(
        &self,
        position: &mut LiquidityPosition,
        now: TimeMs,
        batch: &mut LedgerBatch,
    ) -> Result<(), ReconcileError> {
        let settlement = self.calculator.settle(
            now,
            &AccrualState {
                balance: position.synthetic_balance,
                last_settled_at: position.last_settled_at,
            },
        )?;
        position.last_settled_at = settlement.state.last_settled_at;
        self.credit(&position.owner, settlement.delta, PointSource::Pool, batch)
    }

    /// Recompute a position's synthetic balance at the given pool state.
    pub fn sync_position(
        &self,
        position: &mut LiquidityPosition,
        pool: &PoolState,
    ) -> Result<(), ReconcileError> {
        position.synthetic_balance = synthetic_balance(pool, position)?;
        Ok(())
    }

    fn credit(
        &self,
        address: &Address,
        linear: Decimal,
        source: PointSource,
        batch: &mut LedgerBatch,
    ) -> Result<(), ReconcileError> {
        if linear.is_zero() || self.config.is_excluded(address) {
            return Ok(());
        }
        let boosted = accrual::boosted(linear, self.config.boost(source))?;
        batch.credit(address.clone(), linear, boosted);
        Ok(())
    }

    /// Persist a batch and publish the resulting notifications.
    pub async fn commit(
        &self,
        batch: &LedgerBatch,
        now: TimeMs,
    ) -> Result<Vec<PointsUpdated>, ReconcileError> {
        let updates = self.repo.commit(batch, now).await?;
        for update in &updates {
            // No subscribers is fine.
            let _ = self.notifier.send(update.clone());
        }
        Ok(updates)
    }
}
