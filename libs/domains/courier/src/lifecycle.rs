//! Keeps the registry consistent with subscription records.
//!
//! Hooks run around every subscription mutation:
//!
//! ```text
//! before update / before delete   detach the binding built from the OLD record
//! after create / after update     attach the NEW binding (active + template only)
//!                                 and rewrite the template's variable manifest
//! after delete                    nothing, the detach already happened
//! ```
//!
//! At start-up [`SubscriptionLifecycleManager::rebuild`] replays the attach
//! step for every active, template-bound subscription.

use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::catalog::{EntityTypeCatalog, VariableManifest};
use crate::error::CourierResult;
use crate::models::Subscription;
use crate::registry::SubscriptionRegistry;
use crate::repository::{SubscriptionStore, TemplateStore};

pub struct SubscriptionLifecycleManager {
    registry: Arc<SubscriptionRegistry>,
    catalog: Arc<dyn EntityTypeCatalog>,
    templates: Arc<dyn TemplateStore>,
    subscriptions: Arc<dyn SubscriptionStore>,
    ignored_methods: BTreeSet<String>,
}

impl SubscriptionLifecycleManager {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        catalog: Arc<dyn EntityTypeCatalog>,
        templates: Arc<dyn TemplateStore>,
        subscriptions: Arc<dyn SubscriptionStore>,
        ignored_methods: BTreeSet<String>,
    ) -> Self {
        Self {
            registry,
            catalog,
            templates,
            subscriptions,
            ignored_methods,
        }
    }

    /// Call with the record as it is before the update is written.
    pub async fn before_update(&self, current: &Subscription) {
        self.detach(current).await;
    }

    /// Call with the record as it is before it is deleted.
    pub async fn before_delete(&self, current: &Subscription) {
        self.detach(current).await;
    }

    pub async fn after_create(&self, saved: &Subscription) -> CourierResult<()> {
        self.attach(saved).await
    }

    pub async fn after_update(&self, saved: &Subscription) -> CourierResult<()> {
        self.attach(saved).await
    }

    pub async fn after_delete(&self, deleted: &Subscription) {
        debug!(subscription_id = %deleted.id, "Subscription deleted");
    }

    /// Rebuild the registry from persisted subscriptions.
    ///
    /// Returns the number of bindings attached.
    pub async fn rebuild(&self) -> CourierResult<usize> {
        self.registry.clear().await;

        let mut attached = 0;
        for subscription in self.subscriptions.list_bound().await? {
            if self.catalog.resolve_model(&subscription.entity_type).is_none() {
                debug!(
                    subscription_id = %subscription.id,
                    entity_type = %subscription.entity_type,
                    "Entity type not resolvable, binding not restored"
                );
                continue;
            }
            if self
                .registry
                .attach(subscription.event, &subscription.entity_type, subscription.id)
                .await
            {
                attached += 1;
            }
        }

        info!(bindings = attached, "Subscription registry rebuilt");
        Ok(attached)
    }

    async fn detach(&self, subscription: &Subscription) {
        if self.catalog.resolve_model(&subscription.entity_type).is_none() {
            return;
        }
        self.registry
            .detach(subscription.event, &subscription.entity_type, subscription.id)
            .await;
    }

    async fn attach(&self, subscription: &Subscription) -> CourierResult<()> {
        if !subscription.is_bound() {
            return Ok(());
        }
        let Some(slug) = subscription.template.as_deref() else {
            return Ok(());
        };
        let Some(model) = self.catalog.resolve_model(&subscription.entity_type) else {
            debug!(
                subscription_id = %subscription.id,
                entity_type = %subscription.entity_type,
                "Entity type not resolvable, binding skipped"
            );
            return Ok(());
        };

        self.registry
            .attach(subscription.event, &subscription.entity_type, subscription.id)
            .await;

        // A template shared by several subscriptions ends up describing the
        // most recently saved one only.
        let manifest =
            VariableManifest::compute(model.as_ref(), &subscription.object_name, &self.ignored_methods);
        debug!(
            template = %slug,
            subscription_id = %subscription.id,
            object_name = %subscription.object_name,
            "Writing variable manifest"
        );
        self.templates.set_variables(slug, manifest.to_json()?).await
    }
}
