//! Event handling and periodic settlement on top of the repository and chain source.

pub mod dispatcher;
pub mod ledger;
pub mod reconciler;
pub mod sweeper;

pub use dispatcher::{Dispatcher, SweepOutcome};
pub use ledger::{CreationPolicy, Ledger, Loaded, PositionCreation, PositionLoad};
pub use reconciler::Reconciler;
pub use sweeper::{SweepReport, Sweeper};

use crate::datasource::ChainError;
use crate::db::PointsUpdated;
use crate::engine::MathError;
use serde::Serialize;
use thiserror::Error;

/// Result of handling one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum EventOutcome {
    /// State was settled and persisted. `updates` lists the credited accounts.
    /// `refresh_deferred` is set when the event itself committed but the
    /// pool-wide position refresh it triggers failed; the next sweep catches up.
    #[serde(rename_all = "camelCase")]
    Applied {
        updates: Vec<PointsUpdated>,
        refresh_deferred: bool,
    },
    /// The event does not concern the ledger; nothing was written.
    Ignored { reason: IgnoreReason },
}

impl EventOutcome {
    pub fn applied(updates: Vec<PointsUpdated>) -> Self {
        EventOutcome::Applied {
            updates,
            refresh_deferred: false,
        }
    }

    pub fn ignored(reason: IgnoreReason) -> Self {
        EventOutcome::Ignored { reason }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum IgnoreReason {
    /// Emitted before the source's configured start height.
    BeforeStartHeight,
    /// Both sides of a transfer are excluded addresses.
    Excluded,
    /// Sender has no tracker and the recipient side is excluded.
    UntrackedSender,
    /// The position belongs to another pool.
    ForeignPool,
    /// The position manager does not know the position.
    UnknownPosition,
    /// The position was burned earlier.
    PositionRemoved,
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("chain query failed: {0}")]
    Chain(#[from] ChainError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("math error: {0}")]
    Math(#[from] MathError),
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl ReconcileError {
    /// Transient failures leave no state behind and are retried implicitly by the
    /// next event or sweep.
    pub fn is_transient(&self) -> bool {
        matches!(self, ReconcileError::Chain(_) | ReconcileError::Db(_))
    }
}
