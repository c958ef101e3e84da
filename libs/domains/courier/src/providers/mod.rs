//! Outbound mail transports.
//!
//! This module contains the `EmailSender` trait and its implementations.

mod memory;
mod smtp;

pub use memory::RecordingSender;
pub use smtp::{SmtpConfig, SmtpSender};

use crate::error::CourierResult;
use async_trait::async_trait;

/// Represents a sent email with provider-specific message ID.
#[derive(Debug, Clone)]
pub struct SentEmail {
    /// Provider-specific message ID for tracking.
    pub message_id: Option<String>,
}

/// A single HTML message addressed to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingEmail {
    /// Sender address, taken from the subscription.
    pub from: String,
    /// Recipient address.
    pub to: String,
    /// Rendered subject.
    pub subject: String,
    /// Rendered HTML body.
    pub html_body: String,
}

/// Trait for mail transports.
///
/// `send` fails with `CourierError::Transport` when delivery fails.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver one message.
    async fn send(&self, email: &OutgoingEmail) -> CourierResult<SentEmail>;

    /// Get the provider name for logging.
    fn name(&self) -> &'static str;

    /// Check if the transport is reachable.
    async fn health_check(&self) -> CourierResult<bool>;
}
