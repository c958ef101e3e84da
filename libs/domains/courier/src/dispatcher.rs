//! Routing of lifecycle events to matching subscriptions.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, instrument, warn};

use crate::events::{LifecycleEvent, LifecycleSink};
use crate::models::{EntityType, EventKind, SubscriptionId};
use crate::registry::SubscriptionRegistry;
use crate::repository::SubscriptionStore;
use crate::service::{DeliveryReport, NotificationService};

/// What happened to one event.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub kind: EventKind,
    pub entity_type: EntityType,
    /// Subscriptions the registry returned.
    pub matched: Vec<SubscriptionId>,
    /// Reports for subscriptions that were sent.
    pub delivered: Vec<DeliveryReport>,
    /// Subscriptions deleted, deactivated or unbound since the lookup.
    pub skipped: Vec<SubscriptionId>,
    /// Subscriptions whose send aborted.
    pub failed: Vec<SubscriptionId>,
}

impl DispatchOutcome {
    fn new(event: &LifecycleEvent, matched: Vec<SubscriptionId>) -> Self {
        Self {
            kind: event.kind,
            entity_type: event.entity_type.clone(),
            matched,
            delivered: Vec::new(),
            skipped: Vec::new(),
            failed: Vec::new(),
        }
    }
}

/// Entry point entity stores report their mutations to.
///
/// Delivery runs inline: the caller waits until every matching notification
/// has been attempted. Errors are logged and recorded in the outcome, never
/// returned.
pub struct EventDispatcher {
    registry: Arc<SubscriptionRegistry>,
    subscriptions: Arc<dyn SubscriptionStore>,
    notifications: Arc<NotificationService>,
}

impl EventDispatcher {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        subscriptions: Arc<dyn SubscriptionStore>,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            registry,
            subscriptions,
            notifications,
        }
    }

    /// A store saved `instance`.
    pub async fn on_lifecycle_event(
        &self,
        entity_type: EntityType,
        instance: Value,
        is_new_record: bool,
    ) -> DispatchOutcome {
        self.dispatch(LifecycleEvent::saved(entity_type, instance, is_new_record))
            .await
    }

    /// A store deleted `instance`.
    pub async fn on_delete(&self, entity_type: EntityType, instance: Value) -> DispatchOutcome {
        self.dispatch(LifecycleEvent::deleted(entity_type, instance))
            .await
    }

    /// Send the event to every subscription currently bound to it.
    #[instrument(skip_all, fields(event = %event.kind, entity_type = %event.entity_type))]
    pub async fn dispatch(&self, event: LifecycleEvent) -> DispatchOutcome {
        let matched = self
            .registry
            .matching_subscriptions(event.kind, &event.entity_type)
            .await;
        let mut outcome = DispatchOutcome::new(&event, matched.clone());

        for id in matched {
            // The record may have changed since the registry lookup
            let subscription = match self.subscriptions.get(id).await {
                Ok(Some(subscription)) => subscription,
                Ok(None) => {
                    debug!(subscription_id = %id, "Subscription gone, skipping");
                    outcome.skipped.push(id);
                    continue;
                }
                Err(e) => {
                    warn!(subscription_id = %id, error = %e, "Subscription lookup failed, skipping");
                    outcome.skipped.push(id);
                    continue;
                }
            };

            if !subscription.is_bound()
                || subscription.event != event.kind
                || subscription.entity_type != event.entity_type
            {
                debug!(subscription_id = %id, "Subscription no longer matches, skipping");
                outcome.skipped.push(id);
                continue;
            }

            match self
                .notifications
                .send(&subscription, &event.instance, event.kind.label())
                .await
            {
                Ok(report) => outcome.delivered.push(report),
                Err(e) => {
                    error!(subscription_id = %id, error = %e, "Notification aborted");
                    outcome.failed.push(id);
                }
            }
        }

        outcome
    }
}

#[async_trait]
impl LifecycleSink for EventDispatcher {
    async fn publish(&self, event: LifecycleEvent) {
        self.dispatch(event).await;
    }
}
