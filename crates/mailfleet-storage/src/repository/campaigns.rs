//! Campaign repository

use crate::db::DatabasePool;
use crate::models::{Campaign, CampaignStatus, CreateCampaign};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mailfleet_common::types::CampaignId;
use mailfleet_common::{Error, Result};
use uuid::Uuid;

/// Campaign repository trait
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    /// Get a campaign by ID
    async fn get(&self, id: CampaignId) -> Result<Option<Campaign>>;

    /// Create a new draft campaign
    async fn create(&self, input: CreateCampaign) -> Result<Campaign>;

    /// Compare-and-swap status transition. Returns `false` when the row
    /// is no longer in `from`; rejects pairs outside the transition table.
    async fn transition(
        &self,
        id: CampaignId,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<bool>;

    /// Set the scheduled send time
    async fn set_scheduled_at(&self, id: CampaignId, at: DateTime<Utc>) -> Result<()>;

    /// Write the final sent/failed counters for a dispatch run
    async fn update_counts(&self, id: CampaignId, sent: i32, failed: i32) -> Result<()>;

    /// Get scheduled campaigns whose send time has passed
    async fn get_scheduled_ready(&self) -> Result<Vec<Campaign>>;

    /// Get campaigns stranded in `sending`, left behind by a crashed
    /// process. Used once at startup for crash recovery.
    async fn get_stuck_sending(&self) -> Result<Vec<Campaign>>;
}

/// Database campaign repository
#[derive(Clone)]
pub struct DbCampaignRepository {
    pool: DatabasePool,
}

impl DbCampaignRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignRepository for DbCampaignRepository {
    async fn get(&self, id: CampaignId) -> Result<Option<Campaign>> {
        sqlx::query_as::<_, Campaign>("SELECT * FROM campaigns WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    async fn create(&self, input: CreateCampaign) -> Result<Campaign> {
        let id = Uuid::new_v4();
        let recipient_ids = serde_json::to_value(&input.recipient_ids)
            .map_err(|e| Error::Internal(e.to_string()))?;

        sqlx::query_as::<_, Campaign>(
            r#"
            INSERT INTO campaigns (
                id, name, subject, html_body, text_body, recipient_ids,
                account_id, status, scheduled_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, 'draft', $8)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(&input.subject)
        .bind(&input.html_body)
        .bind(&input.text_body)
        .bind(&recipient_ids)
        .bind(input.account_id)
        .bind(input.scheduled_at)
        .fetch_one(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn transition(
        &self,
        id: CampaignId,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<bool> {
        if !from.can_transition(to) {
            return Err(Error::InvalidTransition(format!("{} -> {}", from, to)));
        }

        let started_at = if to == CampaignStatus::Sending {
            Some(Utc::now())
        } else {
            None
        };
        let completed_at = if to.is_terminal() { Some(Utc::now()) } else { None };

        let result = sqlx::query(
            r#"
            UPDATE campaigns SET
                status = $3,
                started_at = COALESCE($4, started_at),
                completed_at = COALESCE($5, completed_at),
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            "#,
        )
        .bind(id)
        .bind(from.to_string())
        .bind(to.to_string())
        .bind(started_at)
        .bind(completed_at)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_scheduled_at(&self, id: CampaignId, at: DateTime<Utc>) -> Result<()> {
        sqlx::query("UPDATE campaigns SET scheduled_at = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(self.pool.pool())
            .await
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn update_counts(&self, id: CampaignId, sent: i32, failed: i32) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE campaigns SET
                sent_count = $2,
                failed_count = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(sent)
        .bind(failed)
        .execute(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    async fn get_scheduled_ready(&self) -> Result<Vec<Campaign>> {
        sqlx::query_as::<_, Campaign>(
            r#"
            SELECT * FROM campaigns
            WHERE status = 'scheduled'
              AND scheduled_at IS NOT NULL
              AND scheduled_at <= NOW()
            ORDER BY scheduled_at ASC
            "#,
        )
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }

    async fn get_stuck_sending(&self) -> Result<Vec<Campaign>> {
        sqlx::query_as::<_, Campaign>(
            "SELECT * FROM campaigns WHERE status = 'sending' ORDER BY started_at ASC",
        )
        .fetch_all(self.pool.pool())
        .await
        .map_err(|e| Error::Database(e.to_string()))
    }
}
