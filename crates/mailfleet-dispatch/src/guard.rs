//! Sending account guard
//!
//! Serializes one account's daily quota across however many dispatch
//! runs reference it. The check is read-only; the counter is only
//! incremented after a confirmed successful send, as a single atomic
//! store-level update. The check-then-increment window across concurrent
//! runs is an accepted, documented property of the design.

use chrono::Utc;
use mailfleet_common::types::AccountId;
use mailfleet_common::{Error, Result};
use mailfleet_storage::models::SendingAccount;
use mailfleet_storage::repository::AccountRepositoryTrait;
use std::sync::Arc;
use tracing::{debug, info};

/// Guard over one sending account's daily quota
#[derive(Clone)]
pub struct AccountGuard {
    accounts: Arc<dyn AccountRepositoryTrait>,
}

impl AccountGuard {
    pub fn new(accounts: Arc<dyn AccountRepositoryTrait>) -> Self {
        Self { accounts }
    }

    /// Load an account and verify it is usable for sending.
    ///
    /// Missing, soft-deleted, or deactivated accounts are fatal: the
    /// dispatch loop must not start (or continue) against them.
    pub async fn load_available(&self, id: AccountId) -> Result<SendingAccount> {
        let account = self
            .accounts
            .get(id)
            .await?
            .ok_or_else(|| Error::AccountUnavailable("account not found".to_string()))?;

        if !account.is_available() {
            return Err(Error::AccountUnavailable(format!(
                "account {} is inactive or deleted",
                account.email
            )));
        }

        Ok(account)
    }

    /// Re-check the quota before one send.
    ///
    /// Resets the counter on UTC day rollover, then returns whether
    /// another send is allowed. Never mutates the counter on deny.
    pub async fn check_and_count(&self, id: AccountId) -> Result<bool> {
        let account = self.load_available(id).await?;

        let today = Utc::now().date_naive();
        if account.last_reset_date < today {
            if self.accounts.reset_if_day_rolled(id, today).await? {
                info!(account = %account.email, "daily quota counter reset");
            }
            return Ok(account.daily_limit > 0);
        }

        let allowed = account.sent_today < account.daily_limit;
        if !allowed {
            debug!(
                account = %account.email,
                sent_today = account.sent_today,
                daily_limit = account.daily_limit,
                "daily quota exhausted"
            );
        }
        Ok(allowed)
    }

    /// Count one confirmed successful send. The only place the daily
    /// counter moves forward.
    pub async fn record_sent(&self, id: AccountId) -> Result<()> {
        self.accounts.increment_sent_today(id).await
    }
}
