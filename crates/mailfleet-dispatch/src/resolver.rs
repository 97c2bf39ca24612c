//! Recipient resolver
//!
//! Expands a recipient selector into concrete, active recipient records,
//! deduplicated by identity. The store filters inactive recipients; the
//! resolver guarantees dedup and preserves the store's order.

use mailfleet_common::Result;
use mailfleet_storage::models::{Recipient, RecipientSelector};
use mailfleet_storage::repository::RecipientRepositoryTrait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Resolves recipient selectors against the recipient store
#[derive(Clone)]
pub struct RecipientResolver {
    recipients: Arc<dyn RecipientRepositoryTrait>,
}

impl RecipientResolver {
    pub fn new(recipients: Arc<dyn RecipientRepositoryTrait>) -> Self {
        Self { recipients }
    }

    /// Resolve a selector to a deduplicated list of active recipients.
    ///
    /// An empty result is a valid "zero recipients" answer; callers
    /// decide whether that is an error for their operation.
    pub async fn resolve(&self, selector: &RecipientSelector) -> Result<Vec<Recipient>> {
        let rows = self.recipients.resolve(selector).await?;

        let mut seen = HashSet::with_capacity(rows.len());
        let resolved: Vec<Recipient> = rows.into_iter().filter(|r| seen.insert(r.id)).collect();

        debug!(count = resolved.len(), "recipient selector resolved");
        Ok(resolved)
    }
}
