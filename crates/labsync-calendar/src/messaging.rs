//! Outbound mail for escalated messages.
//!
//! Unlike calendar sync this path is user-facing: every failure is returned.

use std::sync::Arc;

use labsync_auth::CredentialStore;
use labsync_core::{ActorId, AppError, AuthError, Provider};
use labsync_services::Message;
use thiserror::Error;

use crate::adapter::{AuthCheck, CalendarAdapter, OutboundMessage};
use crate::error::{FailureKind, ProviderError};

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Actor {0} has not connected a {1} account")]
    NotConnected(ActorId, Provider),

    #[error("Credentials expired: {0}")]
    AuthExpired(String),

    #[error("{0} cannot send mail")]
    Unsupported(Provider),

    #[error("Receiver {0} has no email address")]
    NoRecipientAddress(ActorId),

    #[error("Credential store error: {0}")]
    Credentials(#[from] AuthError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl MessagingError {
    pub fn user_message(&self) -> String {
        match self {
            Self::NotConnected(_, provider) => {
                format!("Connect your {} account to send mail.", provider)
            }
            Self::AuthExpired(_) => "Your mail session has expired. Please reconnect.".to_string(),
            Self::Unsupported(_) => "Mail sending is not available for this account.".to_string(),
            Self::NoRecipientAddress(_) => "The recipient has no email address.".to_string(),
            Self::Credentials(e) => e.user_message().to_string(),
            Self::Provider(e) => e.user_message(),
        }
    }
}

impl From<MessagingError> for AppError {
    fn from(e: MessagingError) -> Self {
        match e {
            MessagingError::Credentials(auth) => AppError::Auth(auth),
            other => AppError::Service(other.to_string()),
        }
    }
}

pub struct Messenger {
    adapter: Arc<dyn CalendarAdapter>,
    credentials: Arc<dyn CredentialStore>,
}

impl Messenger {
    pub fn new(adapter: Arc<dyn CalendarAdapter>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self { adapter, credentials }
    }

    /// Email `message` to its receiver from `acting`'s mailbox, with the
    /// subject prefixed `"Leadership Query: "`.
    ///
    /// # Errors
    /// See [`MessagingError`]; nothing is swallowed.
    #[tracing::instrument(skip(self, message), fields(message_id = message.id), level = "info")]
    pub async fn send_to_outlook(
        &self,
        acting: ActorId,
        message: &Message,
    ) -> Result<(), MessagingError> {
        let provider = self.adapter.provider();
        let sender = self
            .adapter
            .message_sender()
            .ok_or(MessagingError::Unsupported(provider))?;

        let recipient = message
            .receiver
            .contact_address()
            .ok_or(MessagingError::NoRecipientAddress(message.receiver.id))?;

        let bundle = self
            .credentials
            .load(acting, provider)?
            .ok_or(MessagingError::NotConnected(acting, provider))?;

        let bundle = match self.adapter.check_auth(&bundle).await {
            AuthCheck::Valid => bundle,
            AuthCheck::Renewed(renewed) => {
                self.credentials.save(acting, provider, &renewed)?;
                renewed
            }
            AuthCheck::Invalid(reason) => return Err(MessagingError::AuthExpired(reason)),
        };

        let outbound = OutboundMessage::leadership_query(message, recipient);
        let mut result = sender.send_message(&bundle, &outbound).await;
        if matches!(&result, Err(e) if e.kind() == FailureKind::AuthExpired) {
            match self.adapter.renew(&bundle).await {
                AuthCheck::Renewed(renewed) => {
                    self.credentials.save(acting, provider, &renewed)?;
                    result = sender.send_message(&renewed, &outbound).await;
                }
                AuthCheck::Invalid(reason) => return Err(MessagingError::AuthExpired(reason)),
                AuthCheck::Valid => {}
            }
        }

        match result {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == FailureKind::AuthExpired => {
                Err(MessagingError::AuthExpired(e.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
