//! Periodic settlement of every tracked balance and position.

use crate::datasource::BlockTag;
use crate::db::{LedgerBatch, TrackerFilter};
use crate::domain::{BalanceTracker, LiquidityPosition, PoolState, TimeMs};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::ledger::Ledger;
use super::ReconcileError;

/// Counts from one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub trackers_settled: usize,
    pub positions_settled: usize,
    /// Positions left untouched because the pool could not be queried.
    pub positions_skipped: usize,
    pub failures: usize,
    pub accounts_credited: usize,
}

enum Entity {
    Tracker(BalanceTracker),
    Position(LiquidityPosition),
}

#[derive(Debug, Clone)]
pub struct Sweeper {
    ledger: Arc<Ledger>,
}

impl Sweeper {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self { ledger }
    }

    /// Settle every funded tracker and every position at `now`.
    ///
    /// Works on a snapshot taken at the start; each entity commits on its own, so
    /// one failure does not hold back the rest. Positions are resynced to the
    /// pool price at the chain head before they settle.
    pub async fn sweep(&self, now: TimeMs) -> Result<SweepReport, ReconcileError> {
        let repo = self.ledger.repo();
        let trackers = repo.list_trackers(TrackerFilter::Funded).await?;
        let positions = repo.list_positions(None).await?;

        let mut report = SweepReport::default();

        let pool = if positions.is_empty() {
            None
        } else {
            match self.ledger.tracked_pool_state(BlockTag::Latest).await {
                Ok(pool) => Some(pool),
                Err(e) => {
                    warn!(error = %e, positions = positions.len(), "Pool query failed, skipping positions this sweep");
                    report.positions_skipped = positions.len();
                    None
                }
            }
        };

        let mut entities: Vec<Entity> = trackers.into_iter().map(Entity::Tracker).collect();
        if pool.is_some() {
            entities.extend(positions.into_iter().map(Entity::Position));
        }

        let concurrency = self.ledger.config().sweep_concurrency;
        let results: Vec<(bool, Result<usize, ReconcileError>)> = stream::iter(entities)
            .map(|entity| {
                let pool = pool.as_ref();
                async move {
                    match entity {
                        Entity::Tracker(tracker) => (true, self.settle_tracker(tracker, now).await),
                        Entity::Position(position) => {
                            (false, self.settle_position(position, pool, now).await)
                        }
                    }
                }
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        for (is_tracker, result) in results {
            match result {
                Ok(credited) => {
                    report.accounts_credited += credited;
                    if is_tracker {
                        report.trackers_settled += 1;
                    } else {
                        report.positions_settled += 1;
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Sweep settlement failed");
                    report.failures += 1;
                }
            }
        }

        info!(
            trackers = report.trackers_settled,
            positions = report.positions_settled,
            skipped = report.positions_skipped,
            failures = report.failures,
            credited = report.accounts_credited,
            "Sweep complete"
        );
        Ok(report)
    }

    async fn settle_tracker(
        &self,
        mut tracker: BalanceTracker,
        now: TimeMs,
    ) -> Result<usize, ReconcileError> {
        let mut batch = LedgerBatch::new();
        self.ledger.settle_tracker(&mut tracker, now, &mut batch)?;
        batch.put_tracker(tracker);
        Ok(self.ledger.commit(&batch, now).await?.len())
    }

    async fn settle_position(
        &self,
        mut position: LiquidityPosition,
        pool: Option<&PoolState>,
        now: TimeMs,
    ) -> Result<usize, ReconcileError> {
        let mut batch = LedgerBatch::new();
        if let Some(pool) = pool {
            self.ledger.sync_position(&mut position, pool)?;
        }
        self.ledger.settle_position(&mut position, now, &mut batch)?;
        batch.put_position(position);
        Ok(self.ledger.commit(&batch, now).await?.len())
    }
}
