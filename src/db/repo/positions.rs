//! Liquidity position operations and burn tombstones.

use crate::domain::{Address, LiquidityPosition, PositionId, TimeMs};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::str::FromStr;

use super::{address_column, amount_column, corrupt, Repository};

const POSITION_COLUMNS: &str =
    "token_id, owner, liquidity, tick_lower, tick_upper, synthetic_balance, last_settled_at";

impl Repository {
    /// Get a live position by token id.
    pub async fn get_position(
        &self,
        token_id: &PositionId,
    ) -> Result<Option<LiquidityPosition>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM liquidity_positions WHERE token_id = ?",
            POSITION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(token_id.as_str())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(position_from_row).transpose()
    }

    /// Scan live positions, optionally only those of one owner.
    ///
    /// Ordered by token id as an integer.
    pub async fn list_positions(
        &self,
        owner: Option<&Address>,
    ) -> Result<Vec<LiquidityPosition>, sqlx::Error> {
        let rows = match owner {
            Some(owner) => {
                let sql = format!(
                    "SELECT {} FROM liquidity_positions WHERE owner = ? ORDER BY length(token_id), token_id",
                    POSITION_COLUMNS
                );
                sqlx::query(&sql)
                    .bind(owner.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {} FROM liquidity_positions ORDER BY length(token_id), token_id",
                    POSITION_COLUMNS
                );
                sqlx::query(&sql).fetch_all(&self.pool).await?
            }
        };

        rows.iter().map(position_from_row).collect()
    }

    /// Whether the position was burned. Burned ids are never tracked again.
    pub async fn is_position_removed(&self, token_id: &PositionId) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM removed_positions WHERE token_id = ?")
            .bind(token_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

fn position_from_row(row: &SqliteRow) -> Result<LiquidityPosition, sqlx::Error> {
    let raw_id: String = row.try_get("token_id")?;
    let token_id = PositionId::from_str(&raw_id)
        .map_err(|e| corrupt(format!("token_id = {:?}: {}", raw_id, e)))?;

    Ok(LiquidityPosition {
        token_id,
        owner: address_column(row, "owner")?,
        liquidity: amount_column(row, "liquidity")?,
        tick_lower: row.try_get("tick_lower")?,
        tick_upper: row.try_get("tick_upper")?,
        synthetic_balance: amount_column(row, "synthetic_balance")?,
        last_settled_at: row
            .try_get::<Option<i64>, _>("last_settled_at")?
            .map(TimeMs::new),
    })
}
