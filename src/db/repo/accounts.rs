//! Account lookups and the running point totals.

use crate::domain::{Account, Address, Decimal, PointTotals};

use super::{account_from_row, corrupt, decimal_column, Repository};

impl Repository {
    /// Get an account by address.
    ///
    /// # Errors
    /// Returns an error if the query fails or the stored totals are malformed.
    pub async fn get_account(&self, address: &Address) -> Result<Option<Account>, sqlx::Error> {
        let row = sqlx::query(
            "SELECT address, linear_points, boosted_points FROM accounts WHERE address = ?",
        )
        .bind(address.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(account_from_row).transpose()
    }

    /// Running totals across all accounts.
    pub async fn totals(&self) -> Result<PointTotals, sqlx::Error> {
        let row = sqlx::query("SELECT linear_points, boosted_points FROM point_totals WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(PointTotals {
            linear_points: decimal_column(&row, "linear_points")?,
            boosted_points: decimal_column(&row, "boosted_points")?,
        })
    }

    /// Rebuild the running totals from the account table and store them.
    ///
    /// # Errors
    /// Returns an error if the query fails or the sum overflows.
    pub async fn recompute_totals(&self) -> Result<PointTotals, sqlx::Error> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let rows = sqlx::query("SELECT address, linear_points, boosted_points FROM accounts")
            .fetch_all(&mut *tx)
            .await?;

        let mut totals = PointTotals::default();
        for row in &rows {
            let account = account_from_row(row)?;
            totals.linear_points = sum(totals.linear_points, account.linear_points)?;
            totals.boosted_points = sum(totals.boosted_points, account.boosted_points)?;
        }

        sqlx::query("UPDATE point_totals SET linear_points = ?, boosted_points = ? WHERE id = 1")
            .bind(totals.linear_points.to_canonical_string())
            .bind(totals.boosted_points.to_canonical_string())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(totals)
    }
}

fn sum(a: Decimal, b: Decimal) -> Result<Decimal, sqlx::Error> {
    a.checked_add(b)
        .ok_or_else(|| corrupt("point total overflow".to_string()))
}

#[cfg(test)]
mod tests {
    use crate::db::{init_db, LedgerBatch, Repository};
    use crate::domain::{Address, Decimal, TimeMs};
    use std::str::FromStr;
    use tempfile::TempDir;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[tokio::test]
    async fn test_recompute_matches_running_totals() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db").to_string_lossy().to_string();
        let repo = Repository::new(init_db(&db_path).await.unwrap());

        for (n, linear) in [(1u8, "1.5"), (2, "2.25"), (1, "0.25")] {
            let mut batch = LedgerBatch::new();
            batch.credit(Address::from_bytes(&[n; 20]), d(linear), d(linear) * d("4"));
            repo.commit(&batch, TimeMs::new(1)).await.unwrap();
        }

        let running = repo.totals().await.unwrap();
        // Corrupt the running row, then rebuild it.
        sqlx::query("UPDATE point_totals SET linear_points = '0', boosted_points = '0'")
            .execute(repo.pool())
            .await
            .unwrap();
        let rebuilt = repo.recompute_totals().await.unwrap();

        assert_eq!(rebuilt, running);
        assert_eq!(rebuilt.linear_points, d("4"));
        assert_eq!(rebuilt.boosted_points, d("16"));
        let first = repo
            .get_account(&Address::from_bytes(&[1u8; 20]))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.linear_points, d("1.75"));
    }
}
