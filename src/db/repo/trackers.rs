//! Token balance tracker operations.

use crate::domain::{Address, BalanceTracker, TimeMs};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::{address_column, amount_column, Repository};

/// Which trackers a scan returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerFilter {
    All,
    /// Only trackers holding a non-zero balance; the others cannot accrue.
    Funded,
}

impl Repository {
    /// Get a balance tracker by address.
    pub async fn get_tracker(
        &self,
        address: &Address,
    ) -> Result<Option<BalanceTracker>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT address, balance, last_settled_at FROM balance_trackers WHERE address = ?",
        )
        .bind(address.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(tracker_from_row).transpose()
    }

    /// Scan balance trackers, ordered by address.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored balance is malformed.
    pub async fn list_trackers(
        &self,
        filter: TrackerFilter,
    ) -> Result<Vec<BalanceTracker>, sqlx::Error> {
        let sql = match filter {
            TrackerFilter::All => {
                "SELECT address, balance, last_settled_at FROM balance_trackers ORDER BY address ASC"
            }
            TrackerFilter::Funded => {
                "SELECT address, balance, last_settled_at FROM balance_trackers WHERE balance != '0' ORDER BY address ASC"
            }
        };

        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;
        rows.iter().map(tracker_from_row).collect()
    }
}

fn tracker_from_row(row: &SqliteRow) -> Result<BalanceTracker, sqlx::Error> {
    Ok(BalanceTracker {
        address: address_column(row, "address")?,
        balance: amount_column(row, "balance")?,
        last_settled_at: row
            .try_get::<Option<i64>, _>("last_settled_at")?
            .map(TimeMs::new),
    })
}
