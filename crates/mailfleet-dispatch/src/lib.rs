//! Mailfleet Dispatch - The campaign dispatch pipeline
//!
//! Turns a stored campaign into a stream of individual SMTP sends with
//! durable per-attempt accounting: recipient resolution, daily quota
//! enforcement, fixed-interval pacing, and final state reconciliation.

pub mod dispatcher;
pub mod guard;
pub mod resolver;
pub mod scheduler;
pub mod transport;

#[cfg(test)]
pub(crate) mod testutil;

pub use dispatcher::{DispatchError, Dispatcher};
pub use guard::AccountGuard;
pub use resolver::RecipientResolver;
pub use scheduler::CampaignScheduler;
pub use transport::{
    CredentialResolver, MailSession, OutgoingEmail, PlaintextCredentials, SessionFactory,
    SmtpSessionFactory, TransportError,
};
