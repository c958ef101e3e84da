//! Data models for the courier domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumIter, EnumString};
use uuid::Uuid;
use validator::Validate;

/// Identifier of a subscription record.
pub type SubscriptionId = Uuid;

/// Identifier of a recipient record.
pub type RecipientId = Uuid;

/// Context root name used when a subscription does not configure one.
pub const DEFAULT_OBJECT_NAME: &str = "object";

// ============================================================================
// Event kinds and entity types
// ============================================================================

/// Lifecycle events a subscription can listen for.
///
/// Parsing also accepts the legacy signal names (`post_create`, `post_save`,
/// `post_delete`) that older subscription records were stored with.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A new record was saved.
    #[serde(alias = "post_create")]
    #[strum(to_string = "created", serialize = "post_create")]
    Created,
    /// An existing record was saved.
    #[serde(alias = "post_save")]
    #[strum(to_string = "modified", serialize = "post_save")]
    Modified,
    /// A record was deleted.
    #[serde(alias = "post_delete")]
    #[strum(to_string = "deleted", serialize = "post_delete")]
    Deleted,
}

impl EventKind {
    /// Human label handed to the notification pipeline.
    pub fn label(&self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Modified => "modified",
            EventKind::Deleted => "deleted",
        }
    }
}

/// Name of a domain model whose instances emit lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(String);

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for EntityType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

// ============================================================================
// Templates
// ============================================================================

/// Email template stored for editing by template authors.
///
/// `subject` and `body` are rendered with the triggering entity in scope under
/// the subscription's object name, e.g. `Hello {{object.firstname}}!`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    /// Unique slug.
    pub slug: String,
    /// Subject pattern.
    pub subject: String,
    /// Body pattern (HTML).
    pub body: Option<String>,
    /// Serialized variable manifest, recomputed when a bound subscription is saved.
    pub variables: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Template {
    pub fn new(input: CreateTemplate) -> Self {
        let now = Utc::now();
        Self {
            slug: input.slug,
            subject: input.subject,
            body: input.body,
            variables: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply_update(&mut self, input: UpdateTemplate) {
        if let Some(subject) = input.subject {
            self.subject = subject;
        }
        if let Some(body) = input.body {
            self.body = body;
        }
        self.updated_at = Utc::now();
    }
}

/// Input for creating a template.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTemplate {
    #[validate(length(min = 1, max = 50))]
    pub slug: String,
    #[validate(length(min = 1, max = 250))]
    pub subject: String,
    pub body: Option<String>,
}

/// Input for editing a template. `body: Some(None)` clears the body.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateTemplate {
    #[validate(length(min = 1, max = 250))]
    pub subject: Option<String>,
    pub body: Option<Option<String>>,
}

// ============================================================================
// Subscriptions
// ============================================================================

/// A configured rule: which event, on which entity type, rendered with which
/// template, sent from which address. Also known as an email notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    /// Unique title, for reference only.
    pub title: String,
    pub entity_type: EntityType,
    pub event: EventKind,
    /// Template slug; inactive subscriptions may have none.
    pub template: Option<String>,
    pub from_email: String,
    /// Context root name the triggering entity is exposed under.
    pub object_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// Build a record from validated input, filling defaults.
    pub fn new(input: CreateSubscription, default_from_email: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            title: input.title,
            entity_type: input.entity_type,
            event: input.event,
            template: input.template,
            from_email: input
                .from_email
                .unwrap_or_else(|| default_from_email.to_string()),
            object_name: input
                .object_name
                .unwrap_or_else(|| DEFAULT_OBJECT_NAME.to_string()),
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this subscription should have a live registry binding.
    pub fn is_bound(&self) -> bool {
        self.is_active && self.template.is_some()
    }

    pub fn apply_update(&mut self, input: UpdateSubscription) {
        if let Some(title) = input.title {
            self.title = title;
        }
        if let Some(entity_type) = input.entity_type {
            self.entity_type = entity_type;
        }
        if let Some(event) = input.event {
            self.event = event;
        }
        if let Some(template) = input.template {
            self.template = template;
        }
        if let Some(from_email) = input.from_email {
            self.from_email = from_email;
        }
        if let Some(object_name) = input.object_name {
            self.object_name = object_name;
        }
        if let Some(is_active) = input.is_active {
            self.is_active = is_active;
        }
        self.updated_at = Utc::now();
    }
}

/// Input for creating a subscription.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateSubscription {
    #[validate(length(min = 1, max = 250))]
    pub title: String,
    pub entity_type: EntityType,
    pub event: EventKind,
    pub template: Option<String>,
    #[validate(email)]
    pub from_email: Option<String>,
    #[validate(length(min = 1, max = 150))]
    pub object_name: Option<String>,
    pub is_active: bool,
}

impl CreateSubscription {
    /// Active subscription with default sender and object name.
    pub fn new(
        title: impl Into<String>,
        entity_type: impl Into<EntityType>,
        event: EventKind,
        template: Option<&str>,
    ) -> Self {
        Self {
            title: title.into(),
            entity_type: entity_type.into(),
            event,
            template: template.map(str::to_string),
            from_email: None,
            object_name: None,
            is_active: true,
        }
    }
}

/// Partial update of a subscription. `template: Some(None)` clears the template.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateSubscription {
    #[validate(length(min = 1, max = 250))]
    pub title: Option<String>,
    pub entity_type: Option<EntityType>,
    pub event: Option<EventKind>,
    pub template: Option<Option<String>>,
    #[validate(email)]
    pub from_email: Option<String>,
    #[validate(length(min = 1, max = 150))]
    pub object_name: Option<String>,
    pub is_active: Option<bool>,
}

// ============================================================================
// Recipients and sites
// ============================================================================

/// An email address bound to exactly one subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipient {
    pub id: RecipientId,
    pub subscription_id: SubscriptionId,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl Recipient {
    pub fn new(subscription_id: SubscriptionId, email: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            subscription_id,
            email: email.into(),
            created_at: Utc::now(),
        }
    }
}

/// Address validation for recipient additions.
#[derive(Debug, Clone, Validate)]
pub struct NewRecipient {
    #[validate(email)]
    pub email: String,
}

/// Site record exposed to templates as `site.name` / `site.domain`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: u32,
    pub name: String,
    pub domain: String,
}

impl Site {
    pub fn new(id: u32, name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            domain: domain.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_event_kind_display_and_legacy_names() {
        assert_eq!(EventKind::Created.to_string(), "created");
        assert_eq!(EventKind::from_str("modified").unwrap(), EventKind::Modified);
        assert_eq!(EventKind::from_str("post_create").unwrap(), EventKind::Created);
        assert_eq!(EventKind::from_str("post_save").unwrap(), EventKind::Modified);
        assert_eq!(EventKind::from_str("post_delete").unwrap(), EventKind::Deleted);
        assert!(EventKind::from_str("pre_save").is_err());
    }

    #[test]
    fn test_event_kind_serde_accepts_legacy_alias() {
        let kind: EventKind = serde_json::from_str("\"post_delete\"").unwrap();
        assert_eq!(kind, EventKind::Deleted);
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"deleted\"");
    }

    #[test]
    fn test_subscription_defaults() {
        let sub = Subscription::new(
            CreateSubscription::new("New orders", "order", EventKind::Created, Some("order-created")),
            "noreply@example.com",
        );
        assert_eq!(sub.object_name, DEFAULT_OBJECT_NAME);
        assert_eq!(sub.from_email, "noreply@example.com");
        assert!(sub.is_bound());
    }

    #[test]
    fn test_binding_requires_active_and_template() {
        let mut sub = Subscription::new(
            CreateSubscription::new("Draft", "order", EventKind::Created, None),
            "noreply@example.com",
        );
        assert!(!sub.is_bound());

        sub.apply_update(UpdateSubscription {
            template: Some(Some("order-created".to_string())),
            ..Default::default()
        });
        assert!(sub.is_bound());

        sub.apply_update(UpdateSubscription {
            is_active: Some(false),
            ..Default::default()
        });
        assert!(!sub.is_bound());
    }

    #[test]
    fn test_new_recipient_validation() {
        assert!(NewRecipient { email: "ops@example.com".to_string() }.validate().is_ok());
        assert!(NewRecipient { email: "not-an-email".to_string() }.validate().is_err());
        assert!(NewRecipient { email: String::new() }.validate().is_err());
    }
}
