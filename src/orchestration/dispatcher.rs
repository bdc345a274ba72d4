//! Single entry point for events and ticks.
//!
//! Events are handled one at a time, and a sweep holds the same lock, so every
//! entity has at most one writer. Sweeps are single-flight: a tick that arrives
//! while one is running is skipped rather than queued.

use crate::db::PointsUpdated;
use crate::domain::{LedgerEvent, TimeMs};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::ledger::Ledger;
use super::reconciler::Reconciler;
use super::sweeper::{SweepReport, Sweeper};
use super::{EventOutcome, ReconcileError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum SweepOutcome {
    Completed(SweepReport),
    /// Another sweep was already running.
    Skipped,
}

#[derive(Debug)]
pub struct Dispatcher {
    ledger: Arc<Ledger>,
    reconciler: Reconciler,
    sweeper: Sweeper,
    event_lock: Mutex<()>,
    sweep_guard: Mutex<()>,
}

impl Dispatcher {
    pub fn new(ledger: Arc<Ledger>) -> Self {
        Self {
            reconciler: Reconciler::new(ledger.clone()),
            sweeper: Sweeper::new(ledger.clone()),
            ledger,
            event_lock: Mutex::new(()),
            sweep_guard: Mutex::new(()),
        }
    }

    pub fn ledger(&self) -> &Arc<Ledger> {
        &self.ledger
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PointsUpdated> {
        self.ledger.subscribe()
    }

    /// Handle one event after any in-flight event or sweep finishes.
    pub async fn dispatch(&self, event: &LedgerEvent) -> Result<EventOutcome, ReconcileError> {
        let _guard = self.event_lock.lock().await;
        let meta = event.meta();

        match self.reconciler.handle(event).await {
            Ok(outcome) => {
                match &outcome {
                    EventOutcome::Applied {
                        updates,
                        refresh_deferred,
                    } => info!(
                        kind = event.kind(),
                        block = %meta.block_height,
                        credited = updates.len(),
                        refresh_deferred,
                        "Event applied"
                    ),
                    EventOutcome::Ignored { reason } => debug!(
                        kind = event.kind(),
                        block = %meta.block_height,
                        ?reason,
                        "Event ignored"
                    ),
                }
                Ok(outcome)
            }
            Err(e) if e.is_transient() => {
                warn!(kind = event.kind(), block = %meta.block_height, error = %e, "Event failed, nothing persisted");
                Err(e)
            }
            Err(e) => {
                error!(kind = event.kind(), block = %meta.block_height, error = %e, "Event rejected");
                Err(e)
            }
        }
    }

    /// Run a sweep at `now` unless one is already running.
    pub async fn tick(&self, now: TimeMs) -> Result<SweepOutcome, ReconcileError> {
        let _sweep = match self.sweep_guard.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                info!(now = %now, "Sweep already running, skipping tick");
                return Ok(SweepOutcome::Skipped);
            }
        };
        let _events = self.event_lock.lock().await;
        let report = self.sweeper.sweep(now).await?;
        Ok(SweepOutcome::Completed(report))
    }

    /// Tick on a fixed cadence with wall-clock time until the task is aborted.
    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = self.tick(TimeMs::now()).await {
                    warn!(error = %e, "Periodic sweep failed");
                }
            }
        })
    }
}
