//! Repository layer for database operations.
//!
//! This module provides the `Repository` struct for all database operations.
//! Methods are organized across submodules by entity:
//! - `accounts.rs` - Account lookups and the running point totals
//! - `trackers.rs` - Token balance trackers
//! - `positions.rs` - Liquidity positions and burn tombstones
//!
//! Every ledger mutation goes through [`Repository::commit`], which applies a
//! [`LedgerBatch`] in one transaction.

mod accounts;
mod positions;
mod trackers;

pub use trackers::TrackerFilter;

use crate::domain::{
    Account, Address, BalanceTracker, Decimal, LiquidityPosition, PositionId, TimeMs, TokenAmount,
};
use serde::Serialize;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Row, Sqlite, Transaction};
use std::str::FromStr;
use tokio::sync::Mutex;

/// Points to add to one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointCredit {
    pub address: Address,
    pub linear: Decimal,
    pub boosted: Decimal,
}

/// Emitted once per account credited by a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsUpdated {
    pub address: Address,
    pub new_linear_points: Decimal,
    pub new_boosted_points: Decimal,
}

/// All writes produced by handling one event or settling one swept entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerBatch {
    pub credits: Vec<PointCredit>,
    pub trackers: Vec<BalanceTracker>,
    pub positions: Vec<LiquidityPosition>,
    pub removals: Vec<PositionId>,
}

impl LedgerBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a credit. Zero credits are dropped.
    pub fn credit(&mut self, address: Address, linear: Decimal, boosted: Decimal) {
        if linear.is_zero() && boosted.is_zero() {
            return;
        }
        self.credits.push(PointCredit {
            address,
            linear,
            boosted,
        });
    }

    pub fn put_tracker(&mut self, tracker: BalanceTracker) {
        self.trackers.push(tracker);
    }

    pub fn put_position(&mut self, position: LiquidityPosition) {
        self.positions.push(position);
    }

    pub fn remove_position(&mut self, token_id: PositionId) {
        self.removals.push(token_id);
    }

    pub fn is_empty(&self) -> bool {
        self.credits.is_empty()
            && self.trackers.is_empty()
            && self.positions.is_empty()
            && self.removals.is_empty()
    }
}

/// Repository for database operations.
#[derive(Debug)]
pub struct Repository {
    pool: SqlitePool,
    /// Serializes ledger commits within the process; SQLite allows one writer anyway.
    write_lock: Mutex<()>,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository {
            pool,
            write_lock: Mutex::new(()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply a batch atomically: credit accounts and the running totals, upsert
    /// trackers and positions, delete and tombstone removed positions.
    ///
    /// Credits for the same address are applied in order, each producing its own
    /// notification with the resulting totals.
    ///
    /// # Errors
    /// Returns an error (and writes nothing) if any statement fails or a stored
    /// total cannot be parsed.
    pub async fn commit(
        &self,
        batch: &LedgerBatch,
        now: TimeMs,
    ) -> Result<Vec<PointsUpdated>, sqlx::Error> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let mut updates = Vec::with_capacity(batch.credits.len());
        let mut total_linear = Decimal::zero();
        let mut total_boosted = Decimal::zero();
        for credit in &batch.credits {
            let account = credit_account(&mut tx, credit, now).await?;
            total_linear = checked(total_linear.checked_add(credit.linear), "linear total")?;
            total_boosted = checked(total_boosted.checked_add(credit.boosted), "boosted total")?;
            updates.push(PointsUpdated {
                address: account.address,
                new_linear_points: account.linear_points,
                new_boosted_points: account.boosted_points,
            });
        }
        if !batch.credits.is_empty() {
            add_to_totals(&mut tx, total_linear, total_boosted).await?;
        }

        for tracker in &batch.trackers {
            sqlx::query(
                r#"
                INSERT INTO balance_trackers (address, balance, last_settled_at)
                VALUES (?, ?, ?)
                ON CONFLICT(address) DO UPDATE SET
                    balance = excluded.balance,
                    last_settled_at = excluded.last_settled_at
                "#,
            )
            .bind(tracker.address.as_str())
            .bind(tracker.balance.to_string())
            .bind(tracker.last_settled_at.map(|t| t.as_ms()))
            .execute(&mut *tx)
            .await?;
        }

        for position in &batch.positions {
            sqlx::query(
                r#"
                INSERT INTO liquidity_positions
                    (token_id, owner, liquidity, tick_lower, tick_upper, synthetic_balance, last_settled_at)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(token_id) DO UPDATE SET
                    owner = excluded.owner,
                    liquidity = excluded.liquidity,
                    tick_lower = excluded.tick_lower,
                    tick_upper = excluded.tick_upper,
                    synthetic_balance = excluded.synthetic_balance,
                    last_settled_at = excluded.last_settled_at
                "#,
            )
            .bind(position.token_id.as_str())
            .bind(position.owner.as_str())
            .bind(position.liquidity.to_string())
            .bind(position.tick_lower)
            .bind(position.tick_upper)
            .bind(position.synthetic_balance.to_string())
            .bind(position.last_settled_at.map(|t| t.as_ms()))
            .execute(&mut *tx)
            .await?;
        }

        for token_id in &batch.removals {
            sqlx::query("DELETE FROM liquidity_positions WHERE token_id = ?")
                .bind(token_id.as_str())
                .execute(&mut *tx)
                .await?;
            sqlx::query(
                "INSERT INTO removed_positions (token_id, removed_at) VALUES (?, ?) ON CONFLICT(token_id) DO NOTHING",
            )
            .bind(token_id.as_str())
            .bind(now.as_ms())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(updates)
    }
}

async fn credit_account(
    tx: &mut Transaction<'_, Sqlite>,
    credit: &PointCredit,
    now: TimeMs,
) -> Result<Account, sqlx::Error> {
    let row = sqlx::query("SELECT address, linear_points, boosted_points FROM accounts WHERE address = ?")
        .bind(credit.address.as_str())
        .fetch_optional(&mut **tx)
        .await?;
    let current = match row {
        Some(row) => account_from_row(&row)?,
        None => Account::new(credit.address.clone()),
    };
    let updated = current
        .credit(credit.linear, credit.boosted)
        .ok_or_else(|| corrupt(format!("point total overflow for {}", credit.address)))?;

    sqlx::query(
        r#"
        INSERT INTO accounts (address, linear_points, boosted_points, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(address) DO UPDATE SET
            linear_points = excluded.linear_points,
            boosted_points = excluded.boosted_points,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(updated.address.as_str())
    .bind(updated.linear_points.to_canonical_string())
    .bind(updated.boosted_points.to_canonical_string())
    .bind(now.as_ms())
    .execute(&mut **tx)
    .await?;

    Ok(updated)
}

async fn add_to_totals(
    tx: &mut Transaction<'_, Sqlite>,
    linear: Decimal,
    boosted: Decimal,
) -> Result<(), sqlx::Error> {
    let row = sqlx::query("SELECT linear_points, boosted_points FROM point_totals WHERE id = 1")
        .fetch_one(&mut **tx)
        .await?;
    let current_linear = decimal_column(&row, "linear_points")?;
    let current_boosted = decimal_column(&row, "boosted_points")?;

    let new_linear = checked(current_linear.checked_add(linear), "linear total")?;
    let new_boosted = checked(current_boosted.checked_add(boosted), "boosted total")?;

    sqlx::query("UPDATE point_totals SET linear_points = ?, boosted_points = ? WHERE id = 1")
        .bind(new_linear.to_canonical_string())
        .bind(new_boosted.to_canonical_string())
        .execute(&mut **tx)
        .await?;
    Ok(())
}

fn checked(value: Option<Decimal>, what: &str) -> Result<Decimal, sqlx::Error> {
    value.ok_or_else(|| corrupt(format!("{} overflow", what)))
}

/// Unparseable stored values are decode errors, never defaults.
pub(crate) fn corrupt(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}

pub(crate) fn decimal_column(row: &SqliteRow, column: &str) -> Result<Decimal, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    Decimal::from_str(&raw).map_err(|e| corrupt(format!("{} = {:?}: {}", column, raw, e)))
}

pub(crate) fn amount_column(row: &SqliteRow, column: &str) -> Result<TokenAmount, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    TokenAmount::from_str(&raw).map_err(|e| corrupt(format!("{} = {:?}: {}", column, raw, e)))
}

pub(crate) fn address_column(row: &SqliteRow, column: &str) -> Result<Address, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    Address::from_str(&raw).map_err(|e| corrupt(format!("{} = {:?}: {}", column, raw, e)))
}

pub(crate) fn account_from_row(row: &SqliteRow) -> Result<Account, sqlx::Error> {
    Ok(Account {
        address: address_column(row, "address")?,
        linear_points: decimal_column(row, "linear_points")?,
        boosted_points: decimal_column(row, "boosted_points")?,
    })
}
