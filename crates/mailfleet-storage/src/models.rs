//! Database models

use chrono::{DateTime, NaiveDate, Utc};
use mailfleet_common::types::{AccountId, CampaignId, DeliveryLogId, RecipientId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Campaign lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Draft,
    Scheduled,
    Sending,
    Completed,
    Failed,
}

impl CampaignStatus {
    /// Central transition table. Anything not listed here is rejected.
    pub fn can_transition(self, to: CampaignStatus) -> bool {
        use CampaignStatus::*;
        matches!(
            (self, to),
            (Draft, Scheduled)
                | (Draft, Sending)
                | (Scheduled, Sending)
                | (Sending, Completed)
                | (Sending, Failed)
        )
    }

    /// Terminal states never leave
    pub fn is_terminal(self) -> bool {
        matches!(self, CampaignStatus::Completed | CampaignStatus::Failed)
    }
}

impl std::fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CampaignStatus::Draft => write!(f, "draft"),
            CampaignStatus::Scheduled => write!(f, "scheduled"),
            CampaignStatus::Sending => write!(f, "sending"),
            CampaignStatus::Completed => write!(f, "completed"),
            CampaignStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for CampaignStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(CampaignStatus::Draft),
            "scheduled" => Ok(CampaignStatus::Scheduled),
            "sending" => Ok(CampaignStatus::Sending),
            "completed" => Ok(CampaignStatus::Completed),
            "failed" => Ok(CampaignStatus::Failed),
            _ => Err(format!("Invalid campaign status: {}", s)),
        }
    }
}

/// Campaign model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub name: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: Option<String>,
    /// JSONB array of recipient ids, resolved at creation time
    pub recipient_ids: serde_json::Value,
    pub account_id: AccountId,
    pub status: String,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub sent_count: i32,
    pub failed_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Campaign {
    /// Get status enum
    pub fn status_enum(&self) -> Option<CampaignStatus> {
        self.status.parse().ok()
    }

    /// Get recipient ids as a vector
    pub fn recipient_ids_vec(&self) -> Vec<RecipientId> {
        serde_json::from_value(self.recipient_ids.clone()).unwrap_or_default()
    }
}

/// Create campaign input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCampaign {
    pub name: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: Option<String>,
    pub recipient_ids: Vec<RecipientId>,
    pub account_id: AccountId,
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Sending account status (soft delete only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    Active,
    Deleted,
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountStatus::Active => write!(f, "active"),
            AccountStatus::Deleted => write!(f, "deleted"),
        }
    }
}

impl std::str::FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(AccountStatus::Active),
            "deleted" => Ok(AccountStatus::Deleted),
            _ => Err(format!("Invalid account status: {}", s)),
        }
    }
}

/// Sending account model - one SMTP identity with a daily quota
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SendingAccount {
    pub id: AccountId,
    pub name: String,
    pub email: String,
    /// Opaque stored secret; resolved to a usable credential outside storage
    pub credential: String,
    pub is_active: bool,
    pub status: String,
    pub daily_limit: i32,
    pub sent_today: i32,
    /// UTC calendar date of the last quota reset
    pub last_reset_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SendingAccount {
    /// Get status enum
    pub fn status_enum(&self) -> Option<AccountStatus> {
        self.status.parse().ok()
    }

    /// Usable for sending: active flag set and not soft-deleted
    pub fn is_available(&self) -> bool {
        self.is_active && self.status_enum() == Some(AccountStatus::Active)
    }

    /// Quota remaining for the given UTC date, accounting for a pending reset
    pub fn remaining_today(&self, today: NaiveDate) -> i32 {
        if self.last_reset_date < today {
            self.daily_limit
        } else {
            (self.daily_limit - self.sent_today).max(0)
        }
    }
}

/// Recipient model - one addressable target with exactly one category
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Recipient {
    pub id: RecipientId,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub category: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Recipient {
    /// Display name, if any name parts are present
    pub fn display_name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (Some(f), Some(l)) => Some(format!("{} {}", f, l)),
            (Some(f), None) => Some(f.clone()),
            (None, Some(l)) => Some(l.clone()),
            (None, None) => None,
        }
    }
}

/// Recipient targeting expression
///
/// Modes are mutually exclusive: a token list containing `all` is
/// all-recipients, else any `category:<name>` tokens select categories,
/// else the tokens are explicit recipient ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecipientSelector {
    All,
    Categories(Vec<String>),
    Ids(Vec<RecipientId>),
}

impl RecipientSelector {
    const CATEGORY_PREFIX: &'static str = "category:";

    /// Classify raw selector tokens into one mode
    pub fn classify(tokens: &[String]) -> Self {
        if tokens.iter().any(|t| t == "all") {
            return RecipientSelector::All;
        }

        let categories: Vec<String> = tokens
            .iter()
            .filter_map(|t| t.strip_prefix(Self::CATEGORY_PREFIX))
            .map(|c| c.to_string())
            .collect();
        if !categories.is_empty() {
            return RecipientSelector::Categories(categories);
        }

        let ids: Vec<RecipientId> = tokens.iter().filter_map(|t| t.parse().ok()).collect();
        RecipientSelector::Ids(ids)
    }
}

/// Delivery outcome status
///
/// Only `sent` and `failed` are written by the dispatch pipeline; the
/// remaining values are reserved for tracking infrastructure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Sent,
    Failed,
    Bounced,
    Delivered,
    Opened,
    Clicked,
}

impl std::fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryStatus::Sent => write!(f, "sent"),
            DeliveryStatus::Failed => write!(f, "failed"),
            DeliveryStatus::Bounced => write!(f, "bounced"),
            DeliveryStatus::Delivered => write!(f, "delivered"),
            DeliveryStatus::Opened => write!(f, "opened"),
            DeliveryStatus::Clicked => write!(f, "clicked"),
        }
    }
}

impl std::str::FromStr for DeliveryStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(DeliveryStatus::Sent),
            "failed" => Ok(DeliveryStatus::Failed),
            "bounced" => Ok(DeliveryStatus::Bounced),
            "delivered" => Ok(DeliveryStatus::Delivered),
            "opened" => Ok(DeliveryStatus::Opened),
            "clicked" => Ok(DeliveryStatus::Clicked),
            _ => Err(format!("Invalid delivery status: {}", s)),
        }
    }
}

/// Delivery log entry - immutable record of one send attempt
///
/// Recipient and account fields are denormalized at send time so later
/// edits cannot corrupt history.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct DeliveryLogEntry {
    pub id: DeliveryLogId,
    /// Absent for ad-hoc test sends
    pub campaign_id: Option<CampaignId>,
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    pub recipient_category: Option<String>,
    pub account_id: AccountId,
    pub account_name: String,
    pub subject: String,
    pub status: String,
    pub error: Option<String>,
    pub smtp_message_id: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl DeliveryLogEntry {
    /// Get status enum
    pub fn status_enum(&self) -> Option<DeliveryStatus> {
        self.status.parse().ok()
    }
}

/// Create delivery log input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDeliveryLog {
    pub campaign_id: Option<CampaignId>,
    pub recipient_email: String,
    pub recipient_name: Option<String>,
    pub recipient_category: Option<String>,
    pub account_id: AccountId,
    pub account_name: String,
    pub subject: String,
    pub status: DeliveryStatus,
    pub error: Option<String>,
    pub smtp_message_id: Option<String>,
}
