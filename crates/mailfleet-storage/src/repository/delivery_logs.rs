//! Delivery log repository
//!
//! Append-only: the dispatch pipeline never updates or deletes entries.
//! This table is the durable audit trail for every send attempt.

use crate::db::DatabasePool;
use crate::models::{CreateDeliveryLog, DeliveryLogEntry};
use async_trait::async_trait;
use mailfleet_common::types::CampaignId;
use mailfleet_common::{Error, Result};
use uuid::Uuid;

/// Delivery log repository trait
#[async_trait]
pub trait DeliveryLogRepository: Send + Sync {
    /// Append one delivery log entry
    async fn append(&self, input: CreateDeliveryLog) -> Result<DeliveryLogEntry>;

    /// All entries for a campaign, in attempt order. Read only during
    /// crash recovery, where the log doubles as the dispatch checkpoint.
    async fn for_campaign(&self, campaign_id: CampaignId) -> Result<Vec<DeliveryLogEntry>>;
}

/// Database delivery log repository
#[derive(Clone)]
pub struct DbDeliveryLogRepository {
    pool: DatabasePool,
}

impl DbDeliveryLogRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeliveryLogRepository for DbDeliveryLogRepository {
    async fn append(&self, input: CreateDeliveryLog) -> Result<DeliveryLogEntry> {
        let id = Uuid::new_v4();

        sqlx::query_as::<_, DeliveryLogEntry>(
            r#"
            INSERT INTO delivery_logs (
                id, campaign_id, recipient_email, recipient_name,
                recipient_category, account_id, account_name, subject,
                status, error, smtp_message_id, sent_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, NOW())
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(input.campaign_id)
        .bind(&input.recipient_email)
        .bind(&input.recipient_name)
        .bind(&input.recipient_category)
        .bind(input.account_id)
        .bind(&input.account_name)
        .bind(&input.subject)
        .bind(input.status.to_string())
        .bind(&input.error)
        .bind(&input.smtp_message_id)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn for_campaign(&self, campaign_id: CampaignId) -> Result<Vec<DeliveryLogEntry>> {
        sqlx::query_as::<_, DeliveryLogEntry>(
            "SELECT * FROM delivery_logs WHERE campaign_id = $1 ORDER BY sent_at ASC",
        )
        .bind(campaign_id)
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }
}
