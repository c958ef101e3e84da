use std::sync::Arc;
use tracing::info;
use validator::Validate;

use super::TemplateRenderer;
use crate::config::TemplateOnDelete;
use crate::error::{CourierError, CourierResult};
use crate::models::{CreateTemplate, SubscriptionId, Template, UpdateTemplate, UpdateSubscription};
use crate::repository::{SubscriptionStore, TemplateStore};
use crate::subscriptions::SubscriptionService;

/// Service layer for template authors
#[derive(Clone)]
pub struct TemplateService {
    templates: Arc<dyn TemplateStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    subscription_service: SubscriptionService,
    on_delete: TemplateOnDelete,
}

impl TemplateService {
    pub fn new(
        templates: Arc<dyn TemplateStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        subscription_service: SubscriptionService,
        on_delete: TemplateOnDelete,
    ) -> Self {
        Self {
            templates,
            subscriptions,
            subscription_service,
            on_delete,
        }
    }

    /// Create a template; patterns must parse
    pub async fn create_template(&self, input: CreateTemplate) -> CourierResult<Template> {
        input.validate()?;
        let template = Template::new(input);
        TemplateRenderer::check_syntax(&template)?;

        let template = self.templates.insert(template).await?;
        info!(template = %template.slug, "Template created");
        Ok(template)
    }

    /// Get a template by slug
    pub async fn get_template(&self, slug: &str) -> CourierResult<Template> {
        self.templates
            .get(slug)
            .await?
            .ok_or_else(|| CourierError::TemplateNotFound(slug.to_string()))
    }

    /// Edit a template's subject or body
    pub async fn update_template(&self, slug: &str, input: UpdateTemplate) -> CourierResult<Template> {
        input.validate()?;
        let mut template = self.get_template(slug).await?;
        template.apply_update(input);
        TemplateRenderer::check_syntax(&template)?;

        self.templates.update(template).await
    }

    /// Delete a template according to the configured on-delete behavior.
    ///
    /// Returns the subscriptions whose template reference was cleared.
    pub async fn delete_template(&self, slug: &str) -> CourierResult<Vec<SubscriptionId>> {
        self.get_template(slug).await?;

        let referencing: Vec<SubscriptionId> = self
            .subscriptions
            .list_by_template(slug)
            .await?
            .into_iter()
            .map(|s| s.id)
            .collect();

        if self.on_delete == TemplateOnDelete::Restrict && !referencing.is_empty() {
            return Err(CourierError::TemplateInUse {
                slug: slug.to_string(),
                subscriptions: referencing,
            });
        }

        for id in &referencing {
            self.subscription_service
                .update_subscription(
                    *id,
                    UpdateSubscription {
                        template: Some(None),
                        ..Default::default()
                    },
                )
                .await?;
        }

        if !self.templates.delete(slug).await? {
            return Err(CourierError::TemplateNotFound(slug.to_string()));
        }

        info!(template = %slug, cleared = referencing.len(), "Template deleted");
        Ok(referencing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryEntityCatalog, StaticModel};
    use crate::lifecycle::SubscriptionLifecycleManager;
    use crate::models::{CreateSubscription, EventKind};
    use crate::registry::SubscriptionRegistry;
    use crate::repository::{
        InMemoryRecipientStore, InMemorySubscriptionStore, InMemoryTemplateStore,
    };
    use std::collections::BTreeSet;

    struct Fixture {
        registry: Arc<SubscriptionRegistry>,
        subscription_service: SubscriptionService,
        service: TemplateService,
    }

    fn fixture(on_delete: TemplateOnDelete) -> Fixture {
        let registry = Arc::new(SubscriptionRegistry::new());
        let catalog = InMemoryEntityCatalog::new();
        catalog.register("order", StaticModel::new(["name"], Vec::<String>::new()));
        let templates = InMemoryTemplateStore::new();
        let subscriptions = InMemorySubscriptionStore::new();

        let lifecycle = Arc::new(SubscriptionLifecycleManager::new(
            Arc::clone(&registry),
            Arc::new(catalog),
            Arc::new(templates.clone()),
            Arc::new(subscriptions.clone()),
            BTreeSet::new(),
        ));
        let subscription_service = SubscriptionService::new(
            Arc::new(subscriptions.clone()),
            Arc::new(templates.clone()),
            Arc::new(InMemoryRecipientStore::new()),
            lifecycle,
            "webmaster@localhost",
        );
        let service = TemplateService::new(
            Arc::new(templates),
            Arc::new(subscriptions),
            subscription_service.clone(),
            on_delete,
        );

        Fixture {
            registry,
            subscription_service,
            service,
        }
    }

    fn create(slug: &str, subject: &str) -> CreateTemplate {
        CreateTemplate {
            slug: slug.to_string(),
            subject: subject.to_string(),
            body: Some("<p>{{object.name}}</p>".to_string()),
        }
    }

    async fn bound_subscription(fixture: &Fixture) -> SubscriptionId {
        fixture
            .service
            .create_template(create("order-created", "Hi {{object.name}}"))
            .await
            .unwrap();
        fixture
            .subscription_service
            .create_subscription(CreateSubscription::new(
                "New orders",
                "order",
                EventKind::Created,
                Some("order-created"),
            ))
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_create_and_update_template() {
        let fixture = fixture(TemplateOnDelete::SetNull);
        fixture
            .service
            .create_template(create("order-created", "Hi"))
            .await
            .unwrap();

        let updated = fixture
            .service
            .update_template(
                "order-created",
                UpdateTemplate {
                    subject: Some("Hello {{object.name}}".to_string()),
                    body: Some(None),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.subject, "Hello {{object.name}}");
        assert!(updated.body.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let fixture = fixture(TemplateOnDelete::SetNull);

        let empty_subject = fixture.service.create_template(create("a", "")).await;
        assert!(matches!(empty_subject, Err(CourierError::Validation(_))));

        let malformed = fixture.service.create_template(create("b", "Hi {{#if x}}")).await;
        assert!(matches!(malformed, Err(CourierError::TemplateRender(_))));

        fixture.service.create_template(create("c", "Hi")).await.unwrap();
        let duplicate = fixture.service.create_template(create("c", "Hi")).await;
        assert!(matches!(duplicate, Err(CourierError::DuplicateSlug(_))));
    }

    #[tokio::test]
    async fn test_restrict_refuses_delete_while_referenced() {
        let fixture = fixture(TemplateOnDelete::Restrict);
        let id = bound_subscription(&fixture).await;

        let result = fixture.service.delete_template("order-created").await;

        match result {
            Err(CourierError::TemplateInUse { slug, subscriptions }) => {
                assert_eq!(slug, "order-created");
                assert_eq!(subscriptions, vec![id]);
            }
            other => panic!("expected TemplateInUse, got {:?}", other),
        }
        assert!(fixture.service.get_template("order-created").await.is_ok());
        assert_eq!(fixture.registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_set_null_clears_references_and_unbinds() {
        let fixture = fixture(TemplateOnDelete::SetNull);
        let id = bound_subscription(&fixture).await;

        let cleared = fixture.service.delete_template("order-created").await.unwrap();

        assert_eq!(cleared, vec![id]);
        assert!(fixture.registry.is_empty().await);
        let sub = fixture.subscription_service.get_subscription(id).await.unwrap();
        assert!(sub.template.is_none());
        assert!(matches!(
            fixture.service.get_template("order-created").await,
            Err(CourierError::TemplateNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_missing_template() {
        let fixture = fixture(TemplateOnDelete::SetNull);
        let result = fixture.service.delete_template("nope").await;
        assert!(matches!(result, Err(CourierError::TemplateNotFound(_))));
    }
}
