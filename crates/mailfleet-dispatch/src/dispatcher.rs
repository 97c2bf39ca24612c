//! Campaign dispatcher
//!
//! The core sequencing loop: for each resolved recipient, re-check the
//! account quota, send, append one delivery log entry, pace, and decide
//! whether to keep going. A reconciler writes the campaign's final
//! status and counters on every exit path.

use crate::guard::AccountGuard;
use crate::resolver::RecipientResolver;
use crate::transport::{OutgoingEmail, SessionFactory, TransportError};
use mailfleet_common::config::DispatchConfig;
use mailfleet_common::types::{AccountId, CampaignId, EmailAddress};
use mailfleet_common::Error;
use mailfleet_storage::models::{
    Campaign, CampaignStatus, CreateDeliveryLog, DeliveryLogEntry, DeliveryStatus, Recipient,
    RecipientSelector, SendingAccount,
};
use mailfleet_storage::repository::{
    AccountRepositoryTrait, CampaignRepositoryTrait, DeliveryLogRepositoryTrait,
    RecipientRepositoryTrait,
};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Dispatch errors surfaced synchronously to the triggering caller
#[derive(thiserror::Error, Debug)]
pub enum DispatchError {
    #[error("Campaign not found")]
    NotFound,

    #[error("Campaign is not in a startable status")]
    NotStartable,

    #[error("Campaign has no active recipients")]
    NoRecipients,

    #[error("Account unavailable: {0}")]
    AccountUnavailable(String),

    #[error("Daily send quota already exhausted")]
    QuotaExhausted,

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Storage error: {0}")]
    Storage(Error),
}

impl From<Error> for DispatchError {
    fn from(e: Error) -> Self {
        match e {
            Error::AccountUnavailable(msg) => DispatchError::AccountUnavailable(msg),
            other => DispatchError::Storage(other),
        }
    }
}

/// Campaign dispatcher
///
/// One instance serves all campaigns; each `start_campaign` call spawns
/// one independent background run.
pub struct Dispatcher {
    campaigns: Arc<dyn CampaignRepositoryTrait>,
    guard: AccountGuard,
    resolver: RecipientResolver,
    logs: Arc<dyn DeliveryLogRepositoryTrait>,
    sessions: Arc<dyn SessionFactory>,
    pace: Duration,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(
        campaigns: Arc<dyn CampaignRepositoryTrait>,
        accounts: Arc<dyn AccountRepositoryTrait>,
        recipients: Arc<dyn RecipientRepositoryTrait>,
        logs: Arc<dyn DeliveryLogRepositoryTrait>,
        sessions: Arc<dyn SessionFactory>,
        config: &DispatchConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            campaigns,
            guard: AccountGuard::new(accounts),
            resolver: RecipientResolver::new(recipients),
            logs,
            sessions,
            pace: Duration::from_secs(config.pace_secs),
            cancel,
        }
    }

    /// Move a draft campaign to `scheduled` with a stored send time.
    /// Scheduling is deferred execution of the same dispatch algorithm;
    /// the scheduler promotes the campaign once the time has passed.
    pub async fn schedule_campaign(
        &self,
        id: CampaignId,
        at: DateTime<Utc>,
    ) -> Result<Campaign, DispatchError> {
        let campaign = self
            .campaigns
            .get(id)
            .await?
            .ok_or(DispatchError::NotFound)?;

        if campaign.status_enum() != Some(CampaignStatus::Draft) {
            return Err(DispatchError::NotStartable);
        }

        let selector = RecipientSelector::Ids(campaign.recipient_ids_vec());
        if self.resolver.resolve(&selector).await?.is_empty() {
            return Err(DispatchError::NoRecipients);
        }

        self.campaigns.set_scheduled_at(id, at).await?;
        if !self
            .campaigns
            .transition(id, CampaignStatus::Draft, CampaignStatus::Scheduled)
            .await?
        {
            return Err(DispatchError::NotStartable);
        }

        info!(campaign = %id, scheduled_at = %at, "campaign scheduled");

        self.campaigns
            .get(id)
            .await?
            .ok_or(DispatchError::NotFound)
    }

    /// Start dispatching a campaign now.
    ///
    /// Runs all precondition checks synchronously, flips the campaign to
    /// `sending`, and spawns the detached background run. The returned
    /// handle may be dropped; the run is fire-and-forget and its outcome
    /// is observable only through the campaign and delivery log stores.
    pub async fn start_campaign(
        self: &Arc<Self>,
        id: CampaignId,
    ) -> Result<JoinHandle<()>, DispatchError> {
        let campaign = self
            .campaigns
            .get(id)
            .await?
            .ok_or(DispatchError::NotFound)?;

        let from = match campaign.status_enum() {
            Some(s @ (CampaignStatus::Draft | CampaignStatus::Scheduled)) => s,
            _ => return Err(DispatchError::NotStartable),
        };

        let account = self.guard.load_available(campaign.account_id).await?;

        if account.remaining_today(Utc::now().date_naive()) == 0 {
            return Err(DispatchError::QuotaExhausted);
        }

        let selector = RecipientSelector::Ids(campaign.recipient_ids_vec());
        let recipients = self.resolver.resolve(&selector).await?;
        if recipients.is_empty() {
            return Err(DispatchError::NoRecipients);
        }

        if !self
            .campaigns
            .transition(id, from, CampaignStatus::Sending)
            .await?
        {
            return Err(DispatchError::NotStartable);
        }

        info!(
            campaign = %id,
            account = %account.email,
            recipients = recipients.len(),
            "dispatch started"
        );

        let dispatcher = Arc::clone(self);
        Ok(tokio::spawn(async move {
            dispatcher.run(campaign, account, recipients, 0, 0).await;
        }))
    }

    /// Recover campaigns left in `sending` by a crashed process.
    ///
    /// The delivery log is the checkpoint: recipients already logged are
    /// skipped and the run continues with the remainder, so a restart
    /// resumes the campaign instead of restarting it from scratch.
    pub async fn resume_interrupted(
        self: &Arc<Self>,
    ) -> Result<Vec<JoinHandle<()>>, DispatchError> {
        let stuck = self.campaigns.get_stuck_sending().await?;
        let mut handles = Vec::with_capacity(stuck.len());

        for campaign in stuck {
            let entries = self.logs.for_campaign(campaign.id).await?;
            let mut sent = 0i32;
            let mut failed = 0i32;
            let mut attempted: HashSet<String> = HashSet::with_capacity(entries.len());
            for entry in &entries {
                match entry.status_enum() {
                    Some(DeliveryStatus::Sent) => sent += 1,
                    _ => failed += 1,
                }
                attempted.insert(entry.recipient_email.clone());
            }

            let account = match self.guard.load_available(campaign.account_id).await {
                Ok(account) => account,
                Err(e) => {
                    warn!(campaign = %campaign.id, error = %e, "cannot resume, account unavailable");
                    self.reconcile(campaign.id, sent, failed, true).await;
                    continue;
                }
            };

            let selector = RecipientSelector::Ids(campaign.recipient_ids_vec());
            let remaining: Vec<Recipient> = self
                .resolver
                .resolve(&selector)
                .await?
                .into_iter()
                .filter(|r| !attempted.contains(&r.email))
                .collect();

            info!(
                campaign = %campaign.id,
                attempted = entries.len(),
                remaining = remaining.len(),
                "resuming interrupted dispatch"
            );

            let dispatcher = Arc::clone(self);
            handles.push(tokio::spawn(async move {
                dispatcher
                    .run(campaign, account, remaining, sent, failed)
                    .await;
            }));
        }

        Ok(handles)
    }

    /// Scheduled campaigns whose send time has passed, for the scheduler
    pub async fn scheduled_ready(&self) -> Result<Vec<Campaign>, DispatchError> {
        Ok(self.campaigns.get_scheduled_ready().await?)
    }

    /// Send one ad-hoc test message through an account, outside any
    /// campaign. Appends a campaign-less delivery log entry either way.
    pub async fn send_test(
        &self,
        account_id: AccountId,
        to: &str,
        subject: &str,
        html_body: &str,
        text_body: Option<&str>,
    ) -> Result<DeliveryLogEntry, DispatchError> {
        let to: EmailAddress = to.parse().map_err(DispatchError::Storage)?;
        let account = self.guard.load_available(account_id).await?;

        if !self.guard.check_and_count(account_id).await? {
            return Err(DispatchError::QuotaExhausted);
        }

        let session = self.sessions.open(&account).await?;
        let email = OutgoingEmail {
            from_name: Some(account.name.clone()),
            from_address: account.email.clone(),
            to_name: None,
            to_address: to.to_string(),
            subject: subject.to_string(),
            html_body: html_body.to_string(),
            text_body: text_body.map(|t| t.to_string()),
        };

        let (status, error, message_id) = match session.send(&email).await {
            Ok(mid) => (DeliveryStatus::Sent, None, Some(mid)),
            Err(e) => (DeliveryStatus::Failed, Some(e.to_string()), None),
        };

        let entry = self
            .logs
            .append(CreateDeliveryLog {
                campaign_id: None,
                recipient_email: to.to_string(),
                recipient_name: None,
                recipient_category: None,
                account_id: account.id,
                account_name: account.name.clone(),
                subject: subject.to_string(),
                status,
                error,
                smtp_message_id: message_id,
            })
            .await?;

        if status == DeliveryStatus::Sent {
            self.guard.record_sent(account_id).await?;
        }

        Ok(entry)
    }

    /// One dispatch run, with counters seeded from any prior attempt of
    /// the same campaign. Every exit path goes through the reconciler.
    async fn run(
        &self,
        campaign: Campaign,
        account: SendingAccount,
        recipients: Vec<Recipient>,
        mut sent: i32,
        mut failed: i32,
    ) {
        // Session open failure is terminal for the run: no further
        // recipients attempted, no new log entries written.
        let session = match self.sessions.open(&account).await {
            Ok(s) => s,
            Err(e) => {
                error!(campaign = %campaign.id, error = %e, "failed to open mail session");
                self.reconcile(campaign.id, sent, failed, true).await;
                return;
            }
        };

        let mut fatal = false;

        for recipient in &recipients {
            // Quota exhaustion is the expected stop condition, not an
            // error; an unavailable account mid-run aborts the run.
            match self.guard.check_and_count(account.id).await {
                Ok(true) => {}
                Ok(false) => {
                    info!(
                        campaign = %campaign.id,
                        sent,
                        "daily quota exhausted, stopping early"
                    );
                    break;
                }
                Err(e) => {
                    error!(campaign = %campaign.id, error = %e, "account check failed mid-run");
                    fatal = true;
                    break;
                }
            }

            let email = OutgoingEmail {
                from_name: Some(account.name.clone()),
                from_address: account.email.clone(),
                to_name: recipient.display_name(),
                to_address: recipient.email.clone(),
                subject: campaign.subject.clone(),
                html_body: campaign.html_body.clone(),
                text_body: campaign.text_body.clone(),
            };

            // Single attempt per recipient; failures are logged and the
            // loop moves on.
            let (status, error, message_id) = match session.send(&email).await {
                Ok(mid) => (DeliveryStatus::Sent, None, Some(mid)),
                Err(e) => {
                    warn!(
                        campaign = %campaign.id,
                        to = %recipient.email,
                        error = %e,
                        "send failed"
                    );
                    (DeliveryStatus::Failed, Some(e.to_string()), None)
                }
            };

            // Exactly one log entry per attempt, success or failure.
            let entry = CreateDeliveryLog {
                campaign_id: Some(campaign.id),
                recipient_email: recipient.email.clone(),
                recipient_name: recipient.display_name(),
                recipient_category: Some(recipient.category.clone()),
                account_id: account.id,
                account_name: account.name.clone(),
                subject: campaign.subject.clone(),
                status,
                error,
                smtp_message_id: message_id,
            };
            if let Err(e) = self.logs.append(entry).await {
                error!(campaign = %campaign.id, error = %e, "failed to append delivery log");
                fatal = true;
                break;
            }

            if status == DeliveryStatus::Sent {
                sent += 1;
                if let Err(e) = self.guard.record_sent(account.id).await {
                    error!(campaign = %campaign.id, error = %e, "failed to count send");
                    fatal = true;
                    break;
                }
            } else {
                failed += 1;
            }

            // Fixed pacing between recipients keeps the account under
            // provider rate thresholds. Cancellation lands here, after
            // the in-flight attempt is fully recorded.
            tokio::select! {
                _ = tokio::time::sleep(self.pace) => {}
                _ = self.cancel.cancelled() => {
                    info!(
                        campaign = %campaign.id,
                        attempted = sent + failed,
                        "dispatch cancelled, stopping early"
                    );
                    break;
                }
            }
        }

        drop(session);
        self.reconcile(campaign.id, sent, failed, fatal).await;
    }

    /// Write final campaign state: `completed` for a finished or partial
    /// run, `failed` for a fatal abort. Counts accumulated so far are
    /// preserved in both cases.
    async fn reconcile(&self, id: CampaignId, sent: i32, failed: i32, fatal: bool) {
        let final_status = if fatal {
            CampaignStatus::Failed
        } else {
            CampaignStatus::Completed
        };

        if let Err(e) = self.campaigns.update_counts(id, sent, failed).await {
            error!(campaign = %id, error = %e, "failed to write final counters");
        }

        match self
            .campaigns
            .transition(id, CampaignStatus::Sending, final_status)
            .await
        {
            Ok(true) => {
                info!(campaign = %id, status = %final_status, sent, failed, "dispatch finished")
            }
            Ok(false) => {
                warn!(campaign = %id, "campaign left sending status mid-run, final status not written")
            }
            Err(e) => error!(campaign = %id, error = %e, "failed to write final status"),
        }
    }
}
