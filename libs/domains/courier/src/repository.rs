//! Persistence interfaces for templates, subscriptions, recipients and sites.
//!
//! The dispatch core only reads through these traits, except for the template
//! variable manifest which the lifecycle manager writes.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{CourierError, CourierResult};
use crate::models::{Recipient, RecipientId, Site, Subscription, SubscriptionId, Template};

/// Storage for email templates.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Get a template by slug
    async fn get(&self, slug: &str) -> CourierResult<Option<Template>>;

    /// Insert a new template; fails on a duplicate slug
    async fn insert(&self, template: Template) -> CourierResult<Template>;

    /// Replace an existing template
    async fn update(&self, template: Template) -> CourierResult<Template>;

    /// Persist a recomputed variable manifest
    async fn set_variables(&self, slug: &str, variables: String) -> CourierResult<()>;

    /// Delete a template by slug
    async fn delete(&self, slug: &str) -> CourierResult<bool>;
}

/// Storage for subscription records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Get a subscription by ID
    async fn get(&self, id: SubscriptionId) -> CourierResult<Option<Subscription>>;

    /// Get a subscription by its unique title
    async fn get_by_title(&self, title: &str) -> CourierResult<Option<Subscription>>;

    /// Active subscriptions that reference a template
    async fn list_bound(&self) -> CourierResult<Vec<Subscription>>;

    /// Subscriptions referencing a template slug
    async fn list_by_template(&self, slug: &str) -> CourierResult<Vec<Subscription>>;

    /// Insert a new subscription; fails on a duplicate title
    async fn insert(&self, subscription: Subscription) -> CourierResult<Subscription>;

    /// Replace an existing subscription; fails on a duplicate title
    async fn update(&self, subscription: Subscription) -> CourierResult<Subscription>;

    /// Delete a subscription by ID
    async fn delete(&self, id: SubscriptionId) -> CourierResult<bool>;
}

/// Storage for recipients.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RecipientStore: Send + Sync {
    /// Recipients of a subscription, oldest first
    async fn list_by_subscription(
        &self,
        subscription_id: SubscriptionId,
    ) -> CourierResult<Vec<Recipient>>;

    /// Whether the `(email, subscription)` pair is already stored
    async fn exists(&self, email: &str, subscription_id: SubscriptionId) -> CourierResult<bool>;

    /// Store a recipient; fails on a duplicate pair
    async fn add(&self, recipient: Recipient) -> CourierResult<Recipient>;

    /// Remove a recipient by ID
    async fn remove(&self, id: RecipientId) -> CourierResult<bool>;

    /// Remove every recipient of a subscription, returning how many were removed
    async fn delete_by_subscription(&self, subscription_id: SubscriptionId)
    -> CourierResult<usize>;
}

/// Source of the site metadata exposed to templates.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SiteStore: Send + Sync {
    async fn get(&self, id: u32) -> CourierResult<Option<Site>>;
}

// ============================================================================
// In-memory implementations (for development/testing)
// ============================================================================

#[derive(Debug, Default, Clone)]
pub struct InMemoryTemplateStore {
    templates: Arc<RwLock<HashMap<String, Template>>>,
}

impl InMemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TemplateStore for InMemoryTemplateStore {
    async fn get(&self, slug: &str) -> CourierResult<Option<Template>> {
        Ok(self.templates.read().await.get(slug).cloned())
    }

    async fn insert(&self, template: Template) -> CourierResult<Template> {
        let mut templates = self.templates.write().await;
        if templates.contains_key(&template.slug) {
            return Err(CourierError::DuplicateSlug(template.slug));
        }
        templates.insert(template.slug.clone(), template.clone());
        Ok(template)
    }

    async fn update(&self, template: Template) -> CourierResult<Template> {
        let mut templates = self.templates.write().await;
        let slot = templates
            .get_mut(&template.slug)
            .ok_or_else(|| CourierError::TemplateNotFound(template.slug.clone()))?;
        *slot = template.clone();
        Ok(template)
    }

    async fn set_variables(&self, slug: &str, variables: String) -> CourierResult<()> {
        let mut templates = self.templates.write().await;
        let template = templates
            .get_mut(slug)
            .ok_or_else(|| CourierError::TemplateNotFound(slug.to_string()))?;
        template.variables = Some(variables);
        template.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, slug: &str) -> CourierResult<bool> {
        Ok(self.templates.write().await.remove(slug).is_some())
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemorySubscriptionStore {
    subscriptions: Arc<RwLock<HashMap<SubscriptionId, Subscription>>>,
}

impl InMemorySubscriptionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Sort by creation time so listings are stable.
fn sorted(mut subscriptions: Vec<Subscription>) -> Vec<Subscription> {
    subscriptions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
    subscriptions
}

#[async_trait]
impl SubscriptionStore for InMemorySubscriptionStore {
    async fn get(&self, id: SubscriptionId) -> CourierResult<Option<Subscription>> {
        Ok(self.subscriptions.read().await.get(&id).cloned())
    }

    async fn get_by_title(&self, title: &str) -> CourierResult<Option<Subscription>> {
        let subscriptions = self.subscriptions.read().await;
        Ok(subscriptions.values().find(|s| s.title == title).cloned())
    }

    async fn list_bound(&self) -> CourierResult<Vec<Subscription>> {
        let subscriptions = self.subscriptions.read().await;
        Ok(sorted(
            subscriptions.values().filter(|s| s.is_bound()).cloned().collect(),
        ))
    }

    async fn list_by_template(&self, slug: &str) -> CourierResult<Vec<Subscription>> {
        let subscriptions = self.subscriptions.read().await;
        Ok(sorted(
            subscriptions
                .values()
                .filter(|s| s.template.as_deref() == Some(slug))
                .cloned()
                .collect(),
        ))
    }

    async fn insert(&self, subscription: Subscription) -> CourierResult<Subscription> {
        let mut subscriptions = self.subscriptions.write().await;
        if subscriptions.values().any(|s| s.title == subscription.title) {
            return Err(CourierError::DuplicateTitle(subscription.title));
        }
        subscriptions.insert(subscription.id, subscription.clone());
        Ok(subscription)
    }

    async fn update(&self, subscription: Subscription) -> CourierResult<Subscription> {
        let mut subscriptions = self.subscriptions.write().await;
        if subscriptions
            .values()
            .any(|s| s.id != subscription.id && s.title == subscription.title)
        {
            return Err(CourierError::DuplicateTitle(subscription.title));
        }
        let slot = subscriptions
            .get_mut(&subscription.id)
            .ok_or_else(|| CourierError::SubscriptionNotFound(subscription.id.to_string()))?;
        *slot = subscription.clone();
        Ok(subscription)
    }

    async fn delete(&self, id: SubscriptionId) -> CourierResult<bool> {
        Ok(self.subscriptions.write().await.remove(&id).is_some())
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryRecipientStore {
    recipients: Arc<RwLock<Vec<Recipient>>>,
}

impl InMemoryRecipientStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecipientStore for InMemoryRecipientStore {
    async fn list_by_subscription(
        &self,
        subscription_id: SubscriptionId,
    ) -> CourierResult<Vec<Recipient>> {
        let recipients = self.recipients.read().await;
        Ok(recipients
            .iter()
            .filter(|r| r.subscription_id == subscription_id)
            .cloned()
            .collect())
    }

    async fn exists(&self, email: &str, subscription_id: SubscriptionId) -> CourierResult<bool> {
        let recipients = self.recipients.read().await;
        Ok(recipients
            .iter()
            .any(|r| r.subscription_id == subscription_id && r.email == email))
    }

    async fn add(&self, recipient: Recipient) -> CourierResult<Recipient> {
        let mut recipients = self.recipients.write().await;
        // Re-checked under the write guard so concurrent adds cannot both win
        if recipients
            .iter()
            .any(|r| r.subscription_id == recipient.subscription_id && r.email == recipient.email)
        {
            return Err(CourierError::DuplicateRecipient {
                email: recipient.email,
                subscription: recipient.subscription_id.to_string(),
            });
        }
        recipients.push(recipient.clone());
        Ok(recipient)
    }

    async fn remove(&self, id: RecipientId) -> CourierResult<bool> {
        let mut recipients = self.recipients.write().await;
        let before = recipients.len();
        recipients.retain(|r| r.id != id);
        Ok(recipients.len() != before)
    }

    async fn delete_by_subscription(
        &self,
        subscription_id: SubscriptionId,
    ) -> CourierResult<usize> {
        let mut recipients = self.recipients.write().await;
        let before = recipients.len();
        recipients.retain(|r| r.subscription_id != subscription_id);
        Ok(before - recipients.len())
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemorySiteStore {
    sites: Arc<RwLock<HashMap<u32, Site>>>,
}

impl InMemorySiteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with a single site.
    pub fn with_site(site: Site) -> Self {
        let mut sites = HashMap::new();
        sites.insert(site.id, site);
        Self {
            sites: Arc::new(RwLock::new(sites)),
        }
    }

    pub async fn put(&self, site: Site) {
        self.sites.write().await.insert(site.id, site);
    }
}

#[async_trait]
impl SiteStore for InMemorySiteStore {
    async fn get(&self, id: u32) -> CourierResult<Option<Site>> {
        Ok(self.sites.read().await.get(&id).cloned())
    }
}
