//! Scheduled campaign promoter
//!
//! Polls the campaign store for `scheduled` campaigns whose send time
//! has passed and hands each one to the dispatcher. The dispatcher's own
//! compare-and-swap transition makes double promotion harmless.

use crate::dispatcher::{DispatchError, Dispatcher};
use mailfleet_common::config::SchedulerConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Background promoter for scheduled campaigns
pub struct CampaignScheduler {
    dispatcher: Arc<Dispatcher>,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl CampaignScheduler {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        config: &SchedulerConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            dispatcher,
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            cancel,
        }
    }

    /// Poll until cancelled. Intended to be spawned once at startup.
    pub async fn run(self) {
        info!(interval = ?self.poll_interval, "campaign scheduler started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = self.cancel.cancelled() => {
                    info!("campaign scheduler stopped");
                    return;
                }
            }
            self.poll_once().await;
        }
    }

    /// One polling pass: promote every due campaign.
    ///
    /// Errors are logged and never stop the pass; a campaign another
    /// worker already promoted surfaces as `NotStartable` and is skipped.
    pub async fn poll_once(&self) {
        let due = match self.dispatcher.scheduled_ready().await {
            Ok(due) => due,
            Err(e) => {
                error!(error = %e, "failed to query scheduled campaigns");
                return;
            }
        };

        for campaign in due {
            match self.dispatcher.start_campaign(campaign.id).await {
                Ok(_) => info!(campaign = %campaign.id, "scheduled campaign promoted"),
                Err(DispatchError::NotStartable) => {}
                Err(e) => {
                    warn!(campaign = %campaign.id, error = %e, "failed to promote scheduled campaign")
                }
            }
        }
    }
}
