//! Sending account repository

use crate::db::DatabasePool;
use crate::models::SendingAccount;
use async_trait::async_trait;
use chrono::NaiveDate;
use mailfleet_common::types::AccountId;
use mailfleet_common::{Error, Result};

/// Sending account repository trait
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Get an account by ID
    async fn get(&self, id: AccountId) -> Result<Option<SendingAccount>>;

    /// Reset `sent_today` when the stored reset date is older than `today`.
    /// Returns whether a reset happened. Conditional at the store level so
    /// concurrent callers reset at most once.
    async fn reset_if_day_rolled(&self, id: AccountId, today: NaiveDate) -> Result<bool>;

    /// Atomically count one successful send against the daily quota
    async fn increment_sent_today(&self, id: AccountId) -> Result<()>;
}

/// Database sending account repository
#[derive(Clone)]
pub struct DbAccountRepository {
    pool: DatabasePool,
}

impl DbAccountRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AccountRepository for DbAccountRepository {
    async fn get(&self, id: AccountId) -> Result<Option<SendingAccount>> {
        sqlx::query_as::<_, SendingAccount>("SELECT * FROM sending_accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn reset_if_day_rolled(&self, id: AccountId, today: NaiveDate) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sending_accounts SET
                sent_today = 0,
                last_reset_date = $2,
                updated_at = NOW()
            WHERE id = $1 AND last_reset_date < $2
            "#,
        )
        .bind(id)
        .bind(today)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn increment_sent_today(&self, id: AccountId) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE sending_accounts SET
                sent_today = sent_today + 1,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }
}
