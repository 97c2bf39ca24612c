//! Repository layer for data access

pub mod accounts;
pub mod campaigns;
pub mod delivery_logs;
pub mod recipients;

// Re-export concrete repository implementations with simple names
pub use accounts::DbAccountRepository as AccountRepository;
pub use campaigns::DbCampaignRepository as CampaignRepository;
pub use delivery_logs::DbDeliveryLogRepository as DeliveryLogRepository;
pub use recipients::DbRecipientRepository as RecipientRepository;

// Re-export repository traits
pub use accounts::AccountRepository as AccountRepositoryTrait;
pub use campaigns::CampaignRepository as CampaignRepositoryTrait;
pub use delivery_logs::DeliveryLogRepository as DeliveryLogRepositoryTrait;
pub use recipients::RecipientRepository as RecipientRepositoryTrait;
