//! Mail transport session
//!
//! One authenticated SMTP connection pool per dispatch run. Opening the
//! session verifies connectivity up front; per-message failures are
//! returned to the loop and never tear the session down. The pool is
//! released when the boxed session is dropped, which scoped ownership in
//! the dispatch loop guarantees on every exit path.

use async_trait::async_trait;
use lettre::message::{Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use mailfleet_common::config::SmtpConfig;
use mailfleet_common::Result;
use mailfleet_storage::models::SendingAccount;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

/// Transport errors
///
/// `Authentication` and `Connectivity` are terminal for a whole dispatch
/// run; the remaining variants are per-recipient.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("SMTP authentication failed: {0}")]
    Authentication(String),

    #[error("SMTP connection failed: {0}")]
    Connectivity(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Failed to build message: {0}")]
    Build(String),

    #[error("Send failed: {0}")]
    Send(String),
}

impl TransportError {
    /// Whether this error ends the dispatch run rather than one send
    pub fn is_session_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::Authentication(_) | TransportError::Connectivity(_)
        )
    }
}

/// One outbound message
#[derive(Debug, Clone)]
pub struct OutgoingEmail {
    pub from_name: Option<String>,
    pub from_address: String,
    pub to_name: Option<String>,
    pub to_address: String,
    pub subject: String,
    pub html_body: String,
    pub text_body: Option<String>,
}

/// Resolves a sending account's stored secret into a usable credential.
/// Decryption at rest lives outside this crate.
pub trait CredentialResolver: Send + Sync {
    fn resolve(&self, stored: &str) -> Result<String>;
}

/// Pass-through resolver for secrets stored in plaintext
pub struct PlaintextCredentials;

impl CredentialResolver for PlaintextCredentials {
    fn resolve(&self, stored: &str) -> Result<String> {
        Ok(stored.to_string())
    }
}

/// An open, authenticated session capable of sending N messages
#[async_trait]
pub trait MailSession: Send + Sync {
    /// Submit exactly one message. Returns the message id on success.
    /// No retries; a failure here is per-recipient, not fatal.
    async fn send(&self, email: &OutgoingEmail) -> std::result::Result<String, TransportError>;
}

/// Opens sessions for sending accounts
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(
        &self,
        account: &SendingAccount,
    ) -> std::result::Result<Box<dyn MailSession>, TransportError>;
}

/// Session factory backed by lettre's async SMTP transport
pub struct SmtpSessionFactory {
    config: SmtpConfig,
    credentials: Arc<dyn CredentialResolver>,
}

impl SmtpSessionFactory {
    pub fn new(config: SmtpConfig, credentials: Arc<dyn CredentialResolver>) -> Self {
        Self {
            config,
            credentials,
        }
    }
}

#[async_trait]
impl SessionFactory for SmtpSessionFactory {
    async fn open(
        &self,
        account: &SendingAccount,
    ) -> std::result::Result<Box<dyn MailSession>, TransportError> {
        let secret = self
            .credentials
            .resolve(&account.credential)
            .map_err(|e| TransportError::Authentication(e.to_string()))?;

        let builder = if self.config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&self.config.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)
        }
        .map_err(|e| TransportError::Connectivity(e.to_string()))?;

        let transport = builder
            .port(self.config.port)
            .credentials(Credentials::new(account.email.clone(), secret))
            .timeout(Some(Duration::from_secs(self.config.timeout_secs)))
            .build();

        // Verify before handing the session to the loop; a bad credential
        // or unreachable relay fails the whole run here, not per recipient.
        match transport.test_connection().await {
            Ok(true) => {}
            Ok(false) => {
                return Err(TransportError::Connectivity(
                    "SMTP server rejected connection test".to_string(),
                ));
            }
            Err(e) => return Err(classify_open_error(&e.to_string())),
        }

        debug!(account = %account.email, "SMTP session opened");

        Ok(Box::new(SmtpSession { transport }))
    }
}

/// Classify a connection-test failure as authentication vs connectivity
fn classify_open_error(error: &str) -> TransportError {
    let lower = error.to_lowercase();
    if lower.contains("535")
        || lower.contains("534")
        || lower.contains("authentication")
        || lower.contains("credentials")
        || lower.contains("username and password not accepted")
    {
        TransportError::Authentication(error.to_string())
    } else {
        TransportError::Connectivity(error.to_string())
    }
}

/// SMTP session over a pooled lettre transport
pub struct SmtpSession {
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpSession {
    fn build_message(
        email: &OutgoingEmail,
        message_id: &str,
    ) -> std::result::Result<Message, TransportError> {
        let from_addr: Address = email
            .from_address
            .parse()
            .map_err(|_| TransportError::InvalidAddress(email.from_address.clone()))?;
        let to_addr: Address = email
            .to_address
            .parse()
            .map_err(|_| TransportError::InvalidAddress(email.to_address.clone()))?;

        let builder = Message::builder()
            .from(Mailbox::new(email.from_name.clone(), from_addr))
            .to(Mailbox::new(email.to_name.clone(), to_addr))
            .subject(&email.subject)
            .message_id(Some(message_id.to_string()));

        let message = match &email.text_body {
            Some(text) => builder.multipart(MultiPart::alternative_plain_html(
                text.clone(),
                email.html_body.clone(),
            )),
            None => builder.singlepart(SinglePart::html(email.html_body.clone())),
        };

        message.map_err(|e| TransportError::Build(e.to_string()))
    }
}

#[async_trait]
impl MailSession for SmtpSession {
    async fn send(&self, email: &OutgoingEmail) -> std::result::Result<String, TransportError> {
        let message_id = format!("<{}@mailfleet>", Uuid::new_v4());
        let message = Self::build_message(email, &message_id)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;

        debug!(to = %email.to_address, %message_id, "message accepted");
        Ok(message_id)
    }
}
