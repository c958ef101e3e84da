//! Rendering and delivery of one subscription against one event.

use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::error::{CourierError, CourierResult};
use crate::models::{Recipient, Subscription, SubscriptionId};
use crate::providers::{EmailSender, OutgoingEmail};
use crate::repository::{RecipientStore, SiteStore, TemplateStore};
use crate::templates::TemplateRenderer;

/// A recipient the transport refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryFailure {
    pub recipient: String,
    pub reason: String,
}

/// Result of sending one subscription's notification.
#[derive(Debug, Clone)]
pub struct DeliveryReport {
    pub subscription_id: SubscriptionId,
    /// Subject rendered once and reused for every recipient.
    pub subject: String,
    /// Addresses the transport accepted.
    pub delivered: Vec<String>,
    /// Addresses that failed, with the transport's reason.
    pub failures: Vec<DeliveryFailure>,
    pub elapsed: Duration,
}

impl DeliveryReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Service that renders a subscription's template and mails it to each
/// recipient.
pub struct NotificationService {
    templates: Arc<dyn TemplateStore>,
    recipients: Arc<dyn RecipientStore>,
    sites: Arc<dyn SiteStore>,
    sender: Arc<dyn EmailSender>,
    renderer: TemplateRenderer,
    site_id: u32,
}

impl NotificationService {
    pub fn new(
        templates: Arc<dyn TemplateStore>,
        recipients: Arc<dyn RecipientStore>,
        sites: Arc<dyn SiteStore>,
        sender: Arc<dyn EmailSender>,
        site_id: u32,
    ) -> Self {
        Self {
            templates,
            recipients,
            sites,
            sender,
            renderer: TemplateRenderer::new(),
            site_id,
        }
    }

    /// Send `subscription`'s notification for `instance`.
    ///
    /// Template and lookup problems abort the whole subscription and are
    /// returned as errors. Transport failures only affect their recipient and
    /// are collected in the report. Nothing is retried.
    pub async fn send(
        &self,
        subscription: &Subscription,
        instance: &Value,
        event_label: &str,
    ) -> CourierResult<DeliveryReport> {
        let started = Instant::now();

        let slug = subscription.template.as_deref().ok_or_else(|| {
            CourierError::TemplateNotFound(format!("subscription '{}' has no template", subscription.title))
        })?;
        let template = self
            .templates
            .get(slug)
            .await?
            .ok_or_else(|| CourierError::TemplateNotFound(slug.to_string()))?;
        let site = self
            .sites
            .get(self.site_id)
            .await?
            .ok_or_else(|| CourierError::Lookup(format!("site {} not found", self.site_id)))?;

        let mut context = Map::new();
        context.insert(subscription.object_name.clone(), instance.clone());
        context.insert("site".to_string(), serde_json::to_value(&site)?);
        let mut context = Value::Object(context);

        let subject = self
            .renderer
            .render_subject(&template, &context)
            .inspect_err(|e| {
                error!(subscription_id = %subscription.id, template = %slug, error = %e, "Subject rendering failed");
            })?;

        debug!(
            subscription_id = %subscription.id,
            event = %event_label,
            subject = %subject,
            from = %subscription.from_email,
            "Trying to send notification"
        );

        let recipients = self.recipients.list_by_subscription(subscription.id).await?;
        let mut report = DeliveryReport {
            subscription_id: subscription.id,
            subject,
            delivered: Vec::new(),
            failures: Vec::new(),
            elapsed: Duration::ZERO,
        };

        for recipient in &recipients {
            context["recipient"] = recipient_context(recipient, subscription);

            let html_body = self
                .renderer
                .render_body(&template, &context)
                .inspect_err(|e| {
                    error!(subscription_id = %subscription.id, template = %slug, error = %e, "Body rendering failed");
                })?;

            let email = OutgoingEmail {
                from: subscription.from_email.clone(),
                to: recipient.email.clone(),
                subject: report.subject.clone(),
                html_body,
            };

            match self.sender.send(&email).await {
                Ok(_) => report.delivered.push(recipient.email.clone()),
                Err(e) => {
                    warn!(
                        subscription_id = %subscription.id,
                        recipient = %recipient.email,
                        sender = self.sender.name(),
                        error = %e,
                        "Delivery failed"
                    );
                    report.failures.push(DeliveryFailure {
                        recipient: recipient.email.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        report.elapsed = started.elapsed();
        info!(
            subscription_id = %subscription.id,
            event = %event_label,
            subject = %report.subject,
            from = %subscription.from_email,
            delivered = report.delivered.len(),
            failed = report.failures.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Notification sent"
        );

        Ok(report)
    }
}

fn recipient_context(recipient: &Recipient, subscription: &Subscription) -> Value {
    json!({
        "email": recipient.email,
        "subscription": subscription.title,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateSubscription, CreateTemplate, EventKind, Site, Template};
    use crate::providers::RecordingSender;
    use crate::repository::{
        InMemoryRecipientStore, InMemorySiteStore, InMemoryTemplateStore, MockRecipientStore,
    };

    struct Fixture {
        templates: InMemoryTemplateStore,
        recipients: InMemoryRecipientStore,
        sender: RecordingSender,
        service: NotificationService,
    }

    fn fixture() -> Fixture {
        let templates = InMemoryTemplateStore::new();
        let recipients = InMemoryRecipientStore::new();
        let sender = RecordingSender::new();
        let sites = InMemorySiteStore::with_site(Site::new(1, "Shop", "shop.example.com"));
        let service = NotificationService::new(
            Arc::new(templates.clone()),
            Arc::new(recipients.clone()),
            Arc::new(sites),
            Arc::new(sender.clone()),
            1,
        );
        Fixture {
            templates,
            recipients,
            sender,
            service,
        }
    }

    async fn add_template(fixture: &Fixture, subject: &str, body: &str) {
        fixture
            .templates
            .insert(Template::new(CreateTemplate {
                slug: "order-created".to_string(),
                subject: subject.to_string(),
                body: Some(body.to_string()),
            }))
            .await
            .unwrap();
    }

    fn subscription() -> Subscription {
        Subscription::new(
            CreateSubscription::new("New orders", "order", EventKind::Created, Some("order-created")),
            "noreply@example.com",
        )
    }

    #[tokio::test]
    async fn test_renders_subject_once_and_body_per_recipient() {
        let fixture = fixture();
        add_template(
            &fixture,
            "Hi {{object.name}} on {{site.name}}",
            "<p>Dear {{recipient.email}}, see {{site.domain}}</p>",
        )
        .await;
        let sub = subscription();
        for email in ["a@example.com", "b@example.com"] {
            fixture.recipients.add(Recipient::new(sub.id, email)).await.unwrap();
        }

        let report = fixture
            .service
            .send(&sub, &json!({ "name": "Widget" }), "created")
            .await
            .unwrap();

        assert_eq!(report.subject, "Hi Widget on Shop");
        assert_eq!(report.delivered, vec!["a@example.com", "b@example.com"]);

        let sent = fixture.sender.sent().await;
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|e| e.subject == "Hi Widget on Shop"));
        assert!(sent.iter().all(|e| e.from == "noreply@example.com"));
        assert_eq!(sent[0].html_body, "<p>Dear a@example.com, see shop.example.com</p>");
        assert_eq!(sent[1].html_body, "<p>Dear b@example.com, see shop.example.com</p>");
    }

    #[tokio::test]
    async fn test_uses_configured_object_name() {
        let fixture = fixture();
        add_template(&fixture, "Order {{order.name}}", "<p>{{order.name}}</p>").await;
        let mut sub = subscription();
        sub.object_name = "order".to_string();
        fixture.recipients.add(Recipient::new(sub.id, "a@example.com")).await.unwrap();

        let report = fixture
            .service
            .send(&sub, &json!({ "name": "Widget" }), "created")
            .await
            .unwrap();
        assert_eq!(report.subject, "Order Widget");
    }

    #[tokio::test]
    async fn test_transport_failure_does_not_block_other_recipients() {
        let fixture = fixture();
        add_template(&fixture, "Hi", "<p>Hi</p>").await;
        let sub = subscription();
        for email in ["a@example.com", "bounce@example.com", "c@example.com"] {
            fixture.recipients.add(Recipient::new(sub.id, email)).await.unwrap();
        }
        fixture.sender.fail_for("bounce@example.com").await;

        let report = fixture.service.send(&sub, &json!({}), "created").await.unwrap();

        assert_eq!(report.delivered, vec!["a@example.com", "c@example.com"]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].recipient, "bounce@example.com");
        assert!(!report.is_complete());
    }

    #[tokio::test]
    async fn test_template_error_aborts_subscription() {
        let fixture = fixture();
        add_template(&fixture, "Hi {{missing.name}}", "<p>Hi</p>").await;
        let sub = subscription();
        fixture.recipients.add(Recipient::new(sub.id, "a@example.com")).await.unwrap();

        let result = fixture.service.send(&sub, &json!({ "name": "Widget" }), "created").await;

        assert!(matches!(result, Err(CourierError::TemplateRender(_))));
        assert_eq!(fixture.sender.sent_count().await, 0);
    }

    #[tokio::test]
    async fn test_missing_template_is_reported() {
        let fixture = fixture();
        let result = fixture.service.send(&subscription(), &json!({}), "created").await;
        assert!(matches!(result, Err(CourierError::TemplateNotFound(_))));
    }

    #[tokio::test]
    async fn test_missing_site_is_a_lookup_error() {
        let templates = InMemoryTemplateStore::new();
        templates
            .insert(Template::new(CreateTemplate {
                slug: "order-created".to_string(),
                subject: "Hi".to_string(),
                body: None,
            }))
            .await
            .unwrap();
        let service = NotificationService::new(
            Arc::new(templates),
            Arc::new(InMemoryRecipientStore::new()),
            Arc::new(InMemorySiteStore::new()),
            Arc::new(RecordingSender::new()),
            7,
        );

        let result = service.send(&subscription(), &json!({}), "created").await;
        assert!(matches!(result, Err(CourierError::Lookup(_))));
    }

    #[tokio::test]
    async fn test_subject_rendered_before_recipients_are_fetched() {
        let templates = InMemoryTemplateStore::new();
        templates
            .insert(Template::new(CreateTemplate {
                slug: "order-created".to_string(),
                subject: "Hi {{nope}}".to_string(),
                body: None,
            }))
            .await
            .unwrap();

        let mut recipients = MockRecipientStore::new();
        recipients.expect_list_by_subscription().never();

        let service = NotificationService::new(
            Arc::new(templates),
            Arc::new(recipients),
            Arc::new(InMemorySiteStore::with_site(Site::new(1, "Shop", "shop.example.com"))),
            Arc::new(RecordingSender::new()),
            1,
        );

        let result = service.send(&subscription(), &json!({}), "created").await;
        assert!(matches!(result, Err(CourierError::TemplateRender(_))));
    }
}
