//! Recipient repository

use crate::db::DatabasePool;
use crate::models::{Recipient, RecipientSelector};
use async_trait::async_trait;
use mailfleet_common::{Error, Result};
use uuid::Uuid;

/// Recipient repository trait
#[async_trait]
pub trait RecipientRepository: Send + Sync {
    /// Expand a selector into active recipients, store default order.
    /// An empty result is a valid answer, not an error.
    async fn resolve(&self, selector: &RecipientSelector) -> Result<Vec<Recipient>>;
}

/// Database recipient repository
#[derive(Clone)]
pub struct DbRecipientRepository {
    pool: DatabasePool,
}

impl DbRecipientRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecipientRepository for DbRecipientRepository {
    async fn resolve(&self, selector: &RecipientSelector) -> Result<Vec<Recipient>> {
        let recipients = match selector {
            RecipientSelector::All => {
                sqlx::query_as::<_, Recipient>(
                    r#"
                    SELECT * FROM recipients
                    WHERE is_active = TRUE
                    ORDER BY created_at ASC, id ASC
                    "#,
                )
                .fetch_all(self.pool.pool())
                .await
            }
            RecipientSelector::Categories(categories) => {
                sqlx::query_as::<_, Recipient>(
                    r#"
                    SELECT * FROM recipients
                    WHERE is_active = TRUE AND category = ANY($1)
                    ORDER BY created_at ASC, id ASC
                    "#,
                )
                .bind(categories)
                .fetch_all(self.pool.pool())
                .await
            }
            RecipientSelector::Ids(ids) => {
                let ids: Vec<Uuid> = ids.clone();
                sqlx::query_as::<_, Recipient>(
                    r#"
                    SELECT * FROM recipients
                    WHERE is_active = TRUE AND id = ANY($1)
                    ORDER BY created_at ASC, id ASC
                    "#,
                )
                .bind(&ids)
                .fetch_all(self.pool.pool())
                .await
            }
        };

        recipients.map_err(|e| Error::Database(e.to_string()))
    }
}
