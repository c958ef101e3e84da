//! In-memory sender that captures outgoing mail.

use super::{EmailSender, OutgoingEmail, SentEmail};
use crate::error::{CourierError, CourierResult};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Sender that records every message instead of delivering it.
///
/// Addresses registered with [`RecordingSender::fail_for`] are rejected with a
/// transport error, which lets callers exercise partial delivery failures.
#[derive(Clone, Default)]
pub struct RecordingSender {
    sent: Arc<Mutex<Vec<OutgoingEmail>>>,
    failing: Arc<Mutex<HashSet<String>>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject future sends to `address`.
    pub async fn fail_for(&self, address: impl Into<String>) {
        self.failing.lock().await.insert(address.into());
    }

    /// All captured messages, in send order.
    pub async fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.lock().await.len()
    }

    /// Messages captured for one recipient.
    pub async fn sent_to(&self, address: &str) -> Vec<OutgoingEmail> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|email| email.to == address)
            .cloned()
            .collect()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }
}

#[async_trait]
impl EmailSender for RecordingSender {
    async fn send(&self, email: &OutgoingEmail) -> CourierResult<SentEmail> {
        if self.failing.lock().await.contains(&email.to) {
            return Err(CourierError::Transport(format!(
                "recipient {} rejected",
                email.to
            )));
        }

        let mut sent = self.sent.lock().await;
        sent.push(email.clone());
        Ok(SentEmail {
            message_id: Some(format!("recorded-{}", sent.len())),
        })
    }

    fn name(&self) -> &'static str {
        "recording"
    }

    async fn health_check(&self) -> CourierResult<bool> {
        Ok(true)
    }
}
