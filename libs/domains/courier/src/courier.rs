//! Wiring of the whole engine.

use std::sync::Arc;
use tracing::info;

use crate::catalog::EntityTypeCatalog;
use crate::config::CourierConfig;
use crate::dispatcher::EventDispatcher;
use crate::error::CourierResult;
use crate::events::EntityEvents;
use crate::lifecycle::SubscriptionLifecycleManager;
use crate::providers::EmailSender;
use crate::recipients::RecipientService;
use crate::registry::SubscriptionRegistry;
use crate::repository::{
    InMemoryRecipientStore, InMemorySiteStore, InMemorySubscriptionStore, InMemoryTemplateStore,
    RecipientStore, SiteStore, SubscriptionStore, TemplateStore,
};
use crate::service::NotificationService;
use crate::subscriptions::SubscriptionService;
use crate::templates::TemplateService;

/// Persistence collaborators the engine reads and writes through.
#[derive(Clone)]
pub struct CourierStores {
    pub templates: Arc<dyn TemplateStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub recipients: Arc<dyn RecipientStore>,
    pub sites: Arc<dyn SiteStore>,
}

impl CourierStores {
    /// Empty in-memory stores plus the given site store.
    pub fn in_memory(sites: InMemorySiteStore) -> Self {
        Self {
            templates: Arc::new(InMemoryTemplateStore::new()),
            subscriptions: Arc::new(InMemorySubscriptionStore::new()),
            recipients: Arc::new(InMemoryRecipientStore::new()),
            sites: Arc::new(sites),
        }
    }
}

/// The assembled engine.
///
/// Entity stores get an [`EntityEvents`] handle from [`Courier::entity_events`];
/// administration goes through the three services. Call [`Courier::start`]
/// once before publishing events so bindings persisted earlier are live.
pub struct Courier {
    config: CourierConfig,
    registry: Arc<SubscriptionRegistry>,
    lifecycle: Arc<SubscriptionLifecycleManager>,
    dispatcher: Arc<EventDispatcher>,
    subscriptions: SubscriptionService,
    recipients: RecipientService,
    templates: TemplateService,
}

impl Courier {
    pub fn new(
        config: CourierConfig,
        stores: CourierStores,
        catalog: Arc<dyn EntityTypeCatalog>,
        sender: Arc<dyn EmailSender>,
    ) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());

        let lifecycle = Arc::new(SubscriptionLifecycleManager::new(
            Arc::clone(&registry),
            catalog,
            Arc::clone(&stores.templates),
            Arc::clone(&stores.subscriptions),
            config.ignored_context_methods.clone(),
        ));

        let notifications = Arc::new(NotificationService::new(
            Arc::clone(&stores.templates),
            Arc::clone(&stores.recipients),
            Arc::clone(&stores.sites),
            sender,
            config.site_id,
        ));
        let dispatcher = Arc::new(EventDispatcher::new(
            Arc::clone(&registry),
            Arc::clone(&stores.subscriptions),
            notifications,
        ));

        let subscriptions = SubscriptionService::new(
            Arc::clone(&stores.subscriptions),
            Arc::clone(&stores.templates),
            Arc::clone(&stores.recipients),
            Arc::clone(&lifecycle),
            config.default_from_email.clone(),
        );
        let recipients = RecipientService::new(
            Arc::clone(&stores.subscriptions),
            Arc::clone(&stores.recipients),
        );
        let templates = TemplateService::new(
            stores.templates,
            stores.subscriptions,
            subscriptions.clone(),
            config.template_on_delete,
        );

        Self {
            config,
            registry,
            lifecycle,
            dispatcher,
            subscriptions,
            recipients,
            templates,
        }
    }

    /// Rebuild the registry from persisted subscriptions.
    pub async fn start(&self) -> CourierResult<usize> {
        let bindings = self.lifecycle.rebuild().await?;
        info!(
            bindings,
            site_id = self.config.site_id,
            on_delete = ?self.config.template_on_delete,
            "Courier started"
        );
        Ok(bindings)
    }

    /// Handle for entity stores to report their mutations.
    pub fn entity_events(&self) -> EntityEvents {
        EntityEvents::new(self.dispatcher.clone())
    }

    pub fn config(&self) -> &CourierConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    pub fn subscriptions(&self) -> &SubscriptionService {
        &self.subscriptions
    }

    pub fn recipients(&self) -> &RecipientService {
        &self.recipients
    }

    pub fn templates(&self) -> &TemplateService {
        &self.templates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{InMemoryEntityCatalog, StaticModel};
    use crate::models::{CreateSubscription, EventKind, Site, Subscription};
    use crate::providers::RecordingSender;

    #[tokio::test]
    async fn test_start_restores_persisted_bindings() {
        let catalog = InMemoryEntityCatalog::new();
        catalog.register("order", StaticModel::new(["name"], Vec::<String>::new()));
        let stores = CourierStores::in_memory(InMemorySiteStore::with_site(Site::new(
            1,
            "Shop",
            "shop.example.com",
        )));
        // Written before this process started
        let persisted = stores
            .subscriptions
            .insert(Subscription::new(
                CreateSubscription::new("New orders", "order", EventKind::Created, Some("t")),
                "noreply@example.com",
            ))
            .await
            .unwrap();

        let courier = Courier::new(
            CourierConfig::default(),
            stores,
            Arc::new(catalog),
            Arc::new(RecordingSender::new()),
        );
        assert!(courier.registry().is_empty().await);

        assert_eq!(courier.start().await.unwrap(), 1);
        assert_eq!(
            courier
                .registry()
                .matching_subscriptions(EventKind::Created, &"order".into())
                .await,
            vec![persisted.id]
        );
    }
}
