//! Per-event reconciliation: load, settle, apply, persist.

use crate::datasource::BlockTag;
use crate::db::{LedgerBatch, PointsUpdated};
use crate::domain::{
    LedgerEvent, LiquidityChange, PoolSwap, PositionTransfer, TimeMs, TokenAmount, TokenTransfer,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::ledger::{CreationPolicy, Ledger, PositionCreation, PositionLoad};
use super::{EventOutcome, IgnoreReason, ReconcileError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LiquidityDirection {
    Increase,
    Decrease,
}

/// Applies ledger events. Callers must not run two handlers concurrently; the
/// [`Dispatcher`](super::Dispatcher) guarantees this.
#[derive(Debug, Clone)]
pub struct Reconciler {
    ledger: Arc<Ledger>,
}

impl Reconciler {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    /// Handle one event. On error nothing has been persisted.
    pub async fn handle(&self, event: &LedgerEvent) -> Result<EventOutcome, ReconcileError> {
        match event {
            LedgerEvent::TokenTransfer(transfer) => self.on_token_transfer(transfer).await,
            LedgerEvent::PositionTransfer(transfer) => self.on_position_transfer(transfer).await,
            LedgerEvent::IncreaseLiquidity(change) => {
                self.on_liquidity_change(change, LiquidityDirection::Increase)
                    .await
            }
            LedgerEvent::DecreaseLiquidity(change) => {
                self.on_liquidity_change(change, LiquidityDirection::Decrease)
                    .await
            }
            LedgerEvent::PoolSwap(swap) => self.on_pool_swap(swap).await,
        }
    }

    async fn on_token_transfer(
        &self,
        transfer: &TokenTransfer,
    ) -> Result<EventOutcome, ReconcileError> {
        let config = self.ledger.config();
        if transfer.meta.block_height < config.token_start_block {
            return Ok(EventOutcome::ignored(IgnoreReason::BeforeStartHeight));
        }
        let from_excluded = config.is_excluded(&transfer.from);
        if from_excluded && config.is_excluded(&transfer.to) {
            debug!(from = %transfer.from, to = %transfer.to, "Transfer between excluded addresses");
            return Ok(EventOutcome::ignored(IgnoreReason::Excluded));
        }

        let now = transfer.meta.timestamp;
        let mut batch = LedgerBatch::new();

        if transfer.from == transfer.to {
            // Balance unchanged; only the pending accrual settles.
            match self
                .ledger
                .load_tracker(&transfer.from, CreationPolicy::Reject)
                .await?
            {
                Some(loaded) => {
                    let mut tracker = loaded.into_inner();
                    self.ledger.settle_tracker(&mut tracker, now, &mut batch)?;
                    batch.put_tracker(tracker);
                }
                None => {
                    warn!(address = %transfer.from, "Self-transfer from untracked address");
                    return Ok(EventOutcome::ignored(IgnoreReason::UntrackedSender));
                }
            }
            return self.finish(batch, now).await;
        }

        let (sender, recipient) = futures::try_join!(
            self.ledger
                .load_tracker(&transfer.from, CreationPolicy::Reject),
            self.ledger
                .load_tracker(&transfer.to, CreationPolicy::Synthesize),
        )?;

        match sender {
            Some(loaded) => {
                let mut tracker = loaded.into_inner();
                self.ledger.settle_tracker(&mut tracker, now, &mut batch)?;
                tracker.balance = tracker.balance.checked_sub(transfer.value).ok_or_else(|| {
                    ReconcileError::InvariantViolation(format!(
                        "balance of {} would go negative: {} - {}",
                        tracker.address, tracker.balance, transfer.value
                    ))
                })?;
                batch.put_tracker(tracker);
            }
            None if !from_excluded => {
                warn!(
                    from = %transfer.from,
                    value = %transfer.value,
                    "Transfer from untracked address, skipping sender side"
                );
            }
            None => {}
        }

        if let Some(loaded) = recipient {
            let mut tracker = loaded.into_inner();
            self.ledger.settle_tracker(&mut tracker, now, &mut batch)?;
            tracker.balance = tracker.balance.checked_add(transfer.value).ok_or_else(|| {
                ReconcileError::InvariantViolation(format!(
                    "balance of {} overflows: {} + {}",
                    tracker.address, tracker.balance, transfer.value
                ))
            })?;
            batch.put_tracker(tracker);
        }

        if batch.trackers.is_empty() {
            return Ok(EventOutcome::ignored(IgnoreReason::UntrackedSender));
        }
        self.finish(batch, now).await
    }

    async fn on_position_transfer(
        &self,
        transfer: &PositionTransfer,
    ) -> Result<EventOutcome, ReconcileError> {
        if transfer.meta.block_height < self.ledger.config().position_manager_start_block {
            return Ok(EventOutcome::ignored(IgnoreReason::BeforeStartHeight));
        }

        let creation = if transfer.from.is_null() {
            PositionCreation::Mint
        } else {
            PositionCreation::Discover
        };
        let at = BlockTag::from(transfer.meta.block_height);
        let loaded = match self
            .ledger
            .load_position(&transfer.token_id, creation, at)
            .await?
        {
            PositionLoad::Found(loaded) => loaded,
            PositionLoad::Ignored(reason) => {
                debug!(token_id = %transfer.token_id, ?reason, "Ignoring position transfer");
                return Ok(EventOutcome::ignored(reason));
            }
        };

        let now = transfer.meta.timestamp;
        let created = loaded.is_created();
        let mut position = loaded.into_inner();
        let mut batch = LedgerBatch::new();

        if !created && !transfer.from.is_null() && position.owner != transfer.from {
            warn!(
                token_id = %position.token_id,
                stored_owner = %position.owner,
                event_from = %transfer.from,
                "Position owner differs from transfer sender, taking the event's recipient"
            );
        }

        // Accrual up to now belongs to the previous owner.
        self.ledger.settle_position(&mut position, now, &mut batch)?;

        if transfer.to.is_null() {
            info!(token_id = %position.token_id, owner = %position.owner, "Position burned");
            batch.remove_position(position.token_id.clone());
        } else {
            position.owner = transfer.to.clone();
            if created && !position.liquidity.is_zero() {
                let pool = self.ledger.tracked_pool_state(at).await?;
                self.ledger.sync_position(&mut position, &pool)?;
            }
            batch.put_position(position);
        }

        self.finish(batch, now).await
    }

    async fn on_liquidity_change(
        &self,
        change: &LiquidityChange,
        direction: LiquidityDirection,
    ) -> Result<EventOutcome, ReconcileError> {
        let config = self.ledger.config();
        if change.meta.block_height < config.position_manager_start_block {
            return Ok(EventOutcome::ignored(IgnoreReason::BeforeStartHeight));
        }
        if change.pool != config.tracked_pool {
            debug!(token_id = %change.token_id, pool = %change.pool, "Liquidity change in another pool");
            return Ok(EventOutcome::ignored(IgnoreReason::ForeignPool));
        }

        let at = BlockTag::from(change.meta.block_height);
        let loaded = match self
            .ledger
            .load_position(&change.token_id, PositionCreation::Discover, at)
            .await?
        {
            PositionLoad::Found(loaded) => loaded,
            PositionLoad::Ignored(reason) => {
                debug!(token_id = %change.token_id, ?reason, "Ignoring liquidity change");
                return Ok(EventOutcome::ignored(reason));
            }
        };
        let pool = self.ledger.tracked_pool_state(at).await?;

        debug!(
            token_id = %change.token_id,
            ?direction,
            liquidity_delta = %change.liquidity_delta,
            amount_of_token = %change.amount_of_token,
            "Applying liquidity change"
        );

        let now = change.meta.timestamp;
        let created = loaded.is_created();
        let mut position = loaded.into_inner();
        let mut batch = LedgerBatch::new();

        self.ledger.settle_position(&mut position, now, &mut batch)?;
        // A freshly discovered position already carries the liquidity after this event's block.
        if !created {
            position.liquidity = apply_liquidity_delta(
                position.liquidity,
                change.liquidity_delta,
                direction,
            )
            .ok_or_else(|| {
                ReconcileError::InvariantViolation(format!(
                    "liquidity of position {} out of range: {} {:?} {}",
                    position.token_id, position.liquidity, direction, change.liquidity_delta
                ))
            })?;
        }
        self.ledger.sync_position(&mut position, &pool)?;
        batch.put_position(position);

        let mut updates = self.ledger.commit(&batch, now).await?;

        // The change moved pool liquidity; bring the other positions up to date too.
        let refresh_deferred = match self.refresh_all_positions(now, at).await {
            Ok(more) => {
                updates.extend(more);
                false
            }
            Err(e) => {
                warn!(error = %e, "Position refresh after liquidity change failed, next sweep resyncs");
                true
            }
        };

        Ok(EventOutcome::Applied {
            updates,
            refresh_deferred,
        })
    }

    async fn on_pool_swap(&self, swap: &PoolSwap) -> Result<EventOutcome, ReconcileError> {
        if swap.meta.block_height < self.ledger.config().pool_start_block {
            return Ok(EventOutcome::ignored(IgnoreReason::BeforeStartHeight));
        }
        let updates = self
            .refresh_all_positions(swap.meta.timestamp, BlockTag::from(swap.meta.block_height))
            .await?;
        Ok(EventOutcome::applied(updates))
    }

    /// Settle every position at its current synthetic balance, then resync it to
    /// the pool price at `at`. One transaction for all positions.
    pub async fn refresh_all_positions(
        &self,
        now: TimeMs,
        at: BlockTag,
    ) -> Result<Vec<PointsUpdated>, ReconcileError> {
        let positions = self.ledger.repo().list_positions(None).await?;
        if positions.is_empty() {
            return Ok(Vec::new());
        }
        let pool = self.ledger.tracked_pool_state(at).await?;

        let mut batch = LedgerBatch::new();
        for mut position in positions {
            self.ledger.settle_position(&mut position, now, &mut batch)?;
            self.ledger.sync_position(&mut position, &pool)?;
            batch.put_position(position);
        }
        self.ledger.commit(&batch, now).await
    }

    async fn finish(&self, batch: LedgerBatch, now: TimeMs) -> Result<EventOutcome, ReconcileError> {
        let updates = self.ledger.commit(&batch, now).await?;
        Ok(EventOutcome::applied(updates))
    }
}

fn apply_liquidity_delta(
    liquidity: TokenAmount,
    delta: TokenAmount,
    direction: LiquidityDirection,
) -> Option<TokenAmount> {
    match direction {
        LiquidityDirection::Increase => liquidity.checked_add(delta),
        LiquidityDirection::Decrease => liquidity.checked_sub(delta),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liquidity_delta_cannot_go_negative() {
        let five = TokenAmount::new(5);
        assert_eq!(
            apply_liquidity_delta(five, TokenAmount::new(3), LiquidityDirection::Decrease),
            Some(TokenAmount::new(2))
        );
        assert_eq!(
            apply_liquidity_delta(five, TokenAmount::new(6), LiquidityDirection::Decrease),
            None
        );
        assert_eq!(
            apply_liquidity_delta(five, TokenAmount::new(6), LiquidityDirection::Increase),
            Some(TokenAmount::new(11))
        );
    }
}
