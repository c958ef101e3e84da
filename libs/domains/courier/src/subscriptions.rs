//! Subscription administration.
//!
//! Every mutation goes through the lifecycle hooks in a fixed order: read the
//! stored record, run the before hook on it, write, run the after hook on the
//! written record. Mutations are serialized so the registry always ends up
//! matching the last write.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use validator::Validate;

use crate::error::{CourierError, CourierResult};
use crate::lifecycle::SubscriptionLifecycleManager;
use crate::models::{CreateSubscription, Subscription, SubscriptionId, UpdateSubscription};
use crate::repository::{RecipientStore, SubscriptionStore, TemplateStore};

/// Context roots the notification pipeline fills itself.
const RESERVED_OBJECT_NAMES: &[&str] = &["site", "recipient"];

/// Service layer for subscription records
#[derive(Clone)]
pub struct SubscriptionService {
    subscriptions: Arc<dyn SubscriptionStore>,
    templates: Arc<dyn TemplateStore>,
    recipients: Arc<dyn RecipientStore>,
    lifecycle: Arc<SubscriptionLifecycleManager>,
    default_from_email: String,
    /// Held from the read of the old record to the after hook.
    mutations: Arc<Mutex<()>>,
}

impl SubscriptionService {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionStore>,
        templates: Arc<dyn TemplateStore>,
        recipients: Arc<dyn RecipientStore>,
        lifecycle: Arc<SubscriptionLifecycleManager>,
        default_from_email: impl Into<String>,
    ) -> Self {
        Self {
            subscriptions,
            templates,
            recipients,
            lifecycle,
            default_from_email: default_from_email.into(),
            mutations: Arc::new(Mutex::new(())),
        }
    }

    /// Create a subscription and bind it if it is active and has a template
    pub async fn create_subscription(&self, input: CreateSubscription) -> CourierResult<Subscription> {
        input.validate()?;
        if let Some(object_name) = input.object_name.as_deref() {
            check_object_name(object_name)?;
        }
        if let Some(slug) = input.template.as_deref() {
            self.ensure_template(slug).await?;
        }

        let _guard = self.mutations.lock().await;
        let subscription = self
            .subscriptions
            .insert(Subscription::new(input, &self.default_from_email))
            .await?;
        self.lifecycle.after_create(&subscription).await?;

        info!(
            subscription_id = %subscription.id,
            title = %subscription.title,
            event = %subscription.event,
            entity_type = %subscription.entity_type,
            "Subscription created"
        );
        Ok(subscription)
    }

    /// Get a subscription by ID
    pub async fn get_subscription(&self, id: SubscriptionId) -> CourierResult<Subscription> {
        self.subscriptions
            .get(id)
            .await?
            .ok_or_else(|| CourierError::SubscriptionNotFound(id.to_string()))
    }

    /// Get a subscription by its title
    pub async fn get_by_title(&self, title: &str) -> CourierResult<Subscription> {
        self.subscriptions
            .get_by_title(title)
            .await?
            .ok_or_else(|| CourierError::SubscriptionNotFound(title.to_string()))
    }

    /// Update a subscription, moving its binding if needed
    pub async fn update_subscription(
        &self,
        id: SubscriptionId,
        input: UpdateSubscription,
    ) -> CourierResult<Subscription> {
        input.validate()?;
        if let Some(object_name) = input.object_name.as_deref() {
            check_object_name(object_name)?;
        }
        if let Some(Some(slug)) = input.template.as_ref() {
            self.ensure_template(slug).await?;
        }

        let _guard = self.mutations.lock().await;
        let current = self.get_subscription(id).await?;
        let mut updated = current.clone();
        updated.apply_update(input);

        self.lifecycle.before_update(&current).await;
        let saved = match self.subscriptions.update(updated).await {
            Ok(saved) => saved,
            Err(e) => {
                // The record was not written
                self.restore_binding(&current).await;
                return Err(e);
            }
        };
        self.lifecycle.after_update(&saved).await?;

        info!(
            subscription_id = %saved.id,
            is_active = saved.is_active,
            bound = saved.is_bound(),
            "Subscription updated"
        );
        Ok(saved)
    }

    /// Activate or deactivate a subscription
    pub async fn set_active(&self, id: SubscriptionId, is_active: bool) -> CourierResult<Subscription> {
        self.update_subscription(
            id,
            UpdateSubscription {
                is_active: Some(is_active),
                ..Default::default()
            },
        )
        .await
    }

    /// Delete a subscription together with its recipients
    pub async fn delete_subscription(&self, id: SubscriptionId) -> CourierResult<()> {
        let _guard = self.mutations.lock().await;
        let current = self.get_subscription(id).await?;

        self.lifecycle.before_delete(&current).await;
        match self.subscriptions.delete(id).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(CourierError::SubscriptionNotFound(id.to_string()));
            }
            Err(e) => {
                self.restore_binding(&current).await;
                return Err(e);
            }
        }
        self.lifecycle.after_delete(&current).await;

        // The record is gone; recipients left behind here are unreachable
        let removed = self.recipients.delete_by_subscription(id).await.inspect_err(|e| {
            warn!(subscription_id = %id, error = %e, "Could not remove recipients of deleted subscription");
        })?;

        info!(subscription_id = %id, recipients_removed = removed, "Subscription deleted");
        Ok(())
    }

    async fn restore_binding(&self, current: &Subscription) {
        if let Err(e) = self.lifecycle.after_update(current).await {
            warn!(subscription_id = %current.id, error = %e, "Could not restore binding");
        }
    }

    async fn ensure_template(&self, slug: &str) -> CourierResult<()> {
        match self.templates.get(slug).await? {
            Some(_) => Ok(()),
            None => Err(CourierError::TemplateNotFound(slug.to_string())),
        }
    }
}

fn check_object_name(object_name: &str) -> CourierResult<()> {
    if RESERVED_OBJECT_NAMES.contains(&object_name) {
        return Err(CourierError::Validation(format!(
            "object name '{}' is reserved",
            object_name
        )));
    }
    if object_name.contains(['.', ' ', '{', '}']) {
        return Err(CourierError::Validation(format!(
            "object name '{}' cannot be used as a template variable",
            object_name
        )));
    }
    Ok(())
}
