use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::error::{CourierError, CourierResult};
use crate::models::{NewRecipient, Recipient};
use crate::repository::{RecipientStore, SubscriptionStore};

/// Service layer for recipient management
///
/// Subscriptions are addressed by their unique title, the way the public
/// "add recipient" endpoint receives them.
#[derive(Clone)]
pub struct RecipientService {
    subscriptions: Arc<dyn SubscriptionStore>,
    recipients: Arc<dyn RecipientStore>,
}

impl RecipientService {
    pub fn new(subscriptions: Arc<dyn SubscriptionStore>, recipients: Arc<dyn RecipientStore>) -> Self {
        Self {
            subscriptions,
            recipients,
        }
    }

    /// Add `email` to the subscription titled `subscription_title`
    pub async fn add_recipient(&self, email: &str, subscription_title: &str) -> CourierResult<Recipient> {
        let input = NewRecipient {
            email: email.trim().to_string(),
        };
        input.validate()?;

        let subscription = self
            .subscriptions
            .get_by_title(subscription_title)
            .await?
            .ok_or_else(|| CourierError::SubscriptionNotFound(subscription_title.to_string()))?;

        if self.recipients.exists(&input.email, subscription.id).await? {
            return Err(CourierError::DuplicateRecipient {
                email: input.email,
                subscription: subscription.title,
            });
        }

        // The store re-checks under its own lock and reports the subscription by id
        let recipient = self
            .recipients
            .add(Recipient::new(subscription.id, input.email))
            .await
            .map_err(|e| match e {
                CourierError::DuplicateRecipient { email, .. } => CourierError::DuplicateRecipient {
                    email,
                    subscription: subscription.title.clone(),
                },
                other => other,
            })?;

        info!(
            subscription_id = %subscription.id,
            recipient = %recipient.email,
            "Recipient added"
        );
        Ok(recipient)
    }

    /// Remove `email` from the subscription. Returns `false` if it was not a recipient.
    pub async fn remove_recipient(&self, email: &str, subscription_title: &str) -> CourierResult<bool> {
        let email = email.trim();
        let Some(recipient) = self
            .list_recipients(subscription_title)
            .await?
            .into_iter()
            .find(|r| r.email == email)
        else {
            return Ok(false);
        };

        let removed = self.recipients.remove(recipient.id).await?;
        if removed {
            info!(
                subscription_id = %recipient.subscription_id,
                recipient = %recipient.email,
                "Recipient removed"
            );
        }
        Ok(removed)
    }

    /// Recipients of the subscription, oldest first
    pub async fn list_recipients(&self, subscription_title: &str) -> CourierResult<Vec<Recipient>> {
        let subscription = self
            .subscriptions
            .get_by_title(subscription_title)
            .await?
            .ok_or_else(|| CourierError::SubscriptionNotFound(subscription_title.to_string()))?;
        self.recipients.list_by_subscription(subscription.id).await
    }
}
