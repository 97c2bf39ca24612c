//! Shared in-memory fakes and fixtures for dispatch tests

use crate::dispatcher::Dispatcher;
use crate::transport::{MailSession, OutgoingEmail, SessionFactory, TransportError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use mailfleet_common::config::DispatchConfig;
use mailfleet_common::types::{AccountId, CampaignId, RecipientId};
use mailfleet_common::{Error, Result};
use mailfleet_storage::models::{
    Campaign, CampaignStatus, CreateCampaign, CreateDeliveryLog, DeliveryLogEntry, Recipient,
    RecipientSelector, SendingAccount,
};
use mailfleet_storage::repository::{
    AccountRepositoryTrait, CampaignRepositoryTrait, DeliveryLogRepositoryTrait,
    RecipientRepositoryTrait,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub(crate) struct MemCampaigns {
    rows: Mutex<HashMap<CampaignId, Campaign>>,
}

impl MemCampaigns {
    pub(crate) fn with(campaign: Campaign) -> Arc<Self> {
        Self::with_many(vec![campaign])
    }

    pub(crate) fn with_many(campaigns: Vec<Campaign>) -> Arc<Self> {
        let map = campaigns.into_iter().map(|c| (c.id, c)).collect();
        Arc::new(Self {
            rows: Mutex::new(map),
        })
    }

    pub(crate) fn get_sync(&self, id: CampaignId) -> Campaign {
        self.rows.lock().unwrap().get(&id).unwrap().clone()
    }

    pub(crate) fn set_status(&self, id: CampaignId, status: &str) {
        self.rows.lock().unwrap().get_mut(&id).unwrap().status = status.to_string();
    }
}

#[async_trait]
impl CampaignRepositoryTrait for MemCampaigns {
    async fn get(&self, id: CampaignId) -> Result<Option<Campaign>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn create(&self, _input: CreateCampaign) -> Result<Campaign> {
        unimplemented!("not used by dispatch tests")
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
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&id) {
            Some(c) if c.status == from.to_string() => {
                c.status = to.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_scheduled_at(&self, id: CampaignId, at: DateTime<Utc>) -> Result<()> {
        self.rows.lock().unwrap().get_mut(&id).unwrap().scheduled_at = Some(at);
        Ok(())
    }

    async fn update_counts(&self, id: CampaignId, sent: i32, failed: i32) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let c = rows.get_mut(&id).unwrap();
        c.sent_count = sent;
        c.failed_count = failed;
        Ok(())
    }

    async fn get_scheduled_ready(&self) -> Result<Vec<Campaign>> {
        let now = Utc::now();
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|c| {
                c.status == "scheduled" && c.scheduled_at.map(|at| at <= now).unwrap_or(false)
            })
            .cloned()
            .collect())
    }

    async fn get_stuck_sending(&self) -> Result<Vec<Campaign>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.status == "sending")
            .cloned()
            .collect())
    }
}

pub(crate) struct MemAccounts {
    rows: Mutex<HashMap<AccountId, SendingAccount>>,
}

impl MemAccounts {
    pub(crate) fn with(account: SendingAccount) -> Arc<Self> {
        let mut map = HashMap::new();
        map.insert(account.id, account);
        Arc::new(Self {
            rows: Mutex::new(map),
        })
    }

    pub(crate) fn get_sync(&self, id: AccountId) -> SendingAccount {
        self.rows.lock().unwrap().get(&id).unwrap().clone()
    }

    pub(crate) fn deactivate(&self, id: AccountId) {
        self.rows.lock().unwrap().get_mut(&id).unwrap().is_active = false;
    }
}

#[async_trait]
impl AccountRepositoryTrait for MemAccounts {
    async fn get(&self, id: AccountId) -> Result<Option<SendingAccount>> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn reset_if_day_rolled(&self, id: AccountId, today: NaiveDate) -> Result<bool> {
        let mut rows = self.rows.lock().unwrap();
        let a = rows.get_mut(&id).unwrap();
        if a.last_reset_date < today {
            a.sent_today = 0;
            a.last_reset_date = today;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn increment_sent_today(&self, id: AccountId) -> Result<()> {
        self.rows.lock().unwrap().get_mut(&id).unwrap().sent_today += 1;
        Ok(())
    }
}

pub(crate) struct MemRecipients {
    pub(crate) rows: Vec<Recipient>,
}

#[async_trait]
impl RecipientRepositoryTrait for MemRecipients {
    async fn resolve(&self, selector: &RecipientSelector) -> Result<Vec<Recipient>> {
        Ok(self
            .rows
            .iter()
            .filter(|r| r.is_active)
            .filter(|r| match selector {
                RecipientSelector::All => true,
                RecipientSelector::Categories(cats) => cats.contains(&r.category),
                RecipientSelector::Ids(ids) => ids.contains(&r.id),
            })
            .cloned()
            .collect())
    }
}

pub(crate) struct MemLogs {
    rows: Mutex<Vec<DeliveryLogEntry>>,
}

impl MemLogs {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            rows: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn entries(&self) -> Vec<DeliveryLogEntry> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryLogRepositoryTrait for MemLogs {
    async fn append(&self, input: CreateDeliveryLog) -> Result<DeliveryLogEntry> {
        let entry = DeliveryLogEntry {
            id: Uuid::new_v4(),
            campaign_id: input.campaign_id,
            recipient_email: input.recipient_email,
            recipient_name: input.recipient_name,
            recipient_category: input.recipient_category,
            account_id: input.account_id,
            account_name: input.account_name,
            subject: input.subject,
            status: input.status.to_string(),
            error: input.error,
            smtp_message_id: input.smtp_message_id,
            sent_at: Utc::now(),
        };
        self.rows.lock().unwrap().push(entry.clone());
        Ok(entry)
    }

    async fn for_campaign(&self, campaign_id: CampaignId) -> Result<Vec<DeliveryLogEntry>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.campaign_id == Some(campaign_id))
            .cloned()
            .collect())
    }
}

pub(crate) struct FakeSessions {
    fail_open: Option<TransportError>,
    reject: HashSet<String>,
}

impl FakeSessions {
    pub(crate) fn working() -> Arc<Self> {
        Arc::new(Self {
            fail_open: None,
            reject: HashSet::new(),
        })
    }

    pub(crate) fn rejecting(addresses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            fail_open: None,
            reject: addresses.iter().map(|a| a.to_string()).collect(),
        })
    }

    pub(crate) fn broken(error: TransportError) -> Arc<Self> {
        Arc::new(Self {
            fail_open: Some(error),
            reject: HashSet::new(),
        })
    }
}

#[async_trait]
impl SessionFactory for FakeSessions {
    async fn open(
        &self,
        _account: &SendingAccount,
    ) -> std::result::Result<Box<dyn MailSession>, TransportError> {
        if let Some(e) = &self.fail_open {
            return Err(match e {
                TransportError::Authentication(m) => TransportError::Authentication(m.clone()),
                _ => TransportError::Connectivity("unreachable".to_string()),
            });
        }
        Ok(Box::new(FakeSession {
            reject: self.reject.clone(),
        }))
    }
}

struct FakeSession {
    reject: HashSet<String>,
}

#[async_trait]
impl MailSession for FakeSession {
    async fn send(&self, email: &OutgoingEmail) -> std::result::Result<String, TransportError> {
        if self.reject.contains(&email.to_address) {
            return Err(TransportError::Send(
                "550 5.1.1 mailbox unavailable".to_string(),
            ));
        }
        Ok(format!("<{}@test>", Uuid::new_v4()))
    }
}

pub(crate) fn account(sent_today: i32, daily_limit: i32) -> SendingAccount {
    SendingAccount {
        id: Uuid::new_v4(),
        name: "primary".to_string(),
        email: "sender@gmail.com".to_string(),
        credential: "secret".to_string(),
        is_active: true,
        status: "active".to_string(),
        daily_limit,
        sent_today,
        last_reset_date: Utc::now().date_naive(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub(crate) fn recipients(n: usize) -> Vec<Recipient> {
    (0..n)
        .map(|i| Recipient {
            id: Uuid::new_v4(),
            email: format!("user{}@example.com", i),
            first_name: Some(format!("User{}", i)),
            last_name: None,
            category: "news".to_string(),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .collect()
}

pub(crate) fn campaign(account_id: AccountId, recipient_ids: &[RecipientId]) -> Campaign {
    Campaign {
        id: Uuid::new_v4(),
        name: "August launch".to_string(),
        subject: "Big news".to_string(),
        html_body: "<p>Hello</p>".to_string(),
        text_body: Some("Hello".to_string()),
        recipient_ids: serde_json::to_value(recipient_ids).unwrap_or_default(),
        account_id,
        status: "draft".to_string(),
        scheduled_at: None,
        sent_count: 0,
        failed_count: 0,
        created_at: Utc::now(),
        updated_at: Utc::now(),
        started_at: None,
        completed_at: None,
    }
}

pub(crate) struct World {
    pub(crate) dispatcher: Arc<Dispatcher>,
    pub(crate) campaigns: Arc<MemCampaigns>,
    pub(crate) accounts: Arc<MemAccounts>,
    pub(crate) logs: Arc<MemLogs>,
    pub(crate) campaign_id: CampaignId,
    pub(crate) account_id: AccountId,
    pub(crate) cancel: CancellationToken,
}

pub(crate) fn world(
    acc: SendingAccount,
    rcpts: Vec<Recipient>,
    sessions: Arc<FakeSessions>,
) -> World {
    let ids: Vec<RecipientId> = rcpts.iter().map(|r| r.id).collect();
    let camp = campaign(acc.id, &ids);
    let campaign_id = camp.id;
    let account_id = acc.id;

    let campaigns = MemCampaigns::with(camp);
    let accounts = MemAccounts::with(acc);
    let logs = MemLogs::new();
    let cancel = CancellationToken::new();

    let dispatcher = Arc::new(Dispatcher::new(
        campaigns.clone(),
        accounts.clone(),
        Arc::new(MemRecipients { rows: rcpts }),
        logs.clone(),
        sessions,
        &DispatchConfig { pace_secs: 2 },
        cancel.clone(),
    ));

    World {
        dispatcher,
        campaigns,
        accounts,
        logs,
        campaign_id,
        account_id,
        cancel,
    }
}

/// A world with one due and one future scheduled campaign, for the
/// scheduler's promotion tests.
pub(crate) fn promoter_world() -> (
    Arc<Dispatcher>,
    Arc<MemCampaigns>,
    CampaignId,
    CampaignId,
    CancellationToken,
) {
    let acc = account(0, 500);
    let rcpts = recipients(2);
    let ids: Vec<RecipientId> = rcpts.iter().map(|r| r.id).collect();

    let mut due = campaign(acc.id, &ids);
    due.status = "scheduled".to_string();
    due.scheduled_at = Some(Utc::now() - chrono::Duration::minutes(5));
    let due_id = due.id;

    let mut future = campaign(acc.id, &ids);
    future.status = "scheduled".to_string();
    future.scheduled_at = Some(Utc::now() + chrono::Duration::hours(6));
    let future_id = future.id;

    let campaigns = MemCampaigns::with_many(vec![due, future]);
    let cancel = CancellationToken::new();

    let dispatcher = Arc::new(Dispatcher::new(
        campaigns.clone(),
        MemAccounts::with(acc),
        Arc::new(MemRecipients { rows: rcpts }),
        MemLogs::new(),
        FakeSessions::working(),
        &DispatchConfig { pace_secs: 2 },
        cancel.clone(),
    ));

    (dispatcher, campaigns, due_id, future_id, cancel)
}
