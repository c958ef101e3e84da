//! Live bindings from `(event kind, entity type)` to subscriptions.
//!
//! The registry is a projection of the subscription table: it is rebuilt from
//! persisted subscriptions at start-up and kept current by the lifecycle
//! manager. It stores ids only; callers resolve full records from the
//! subscription store.

use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::{EntityType, EventKind, SubscriptionId};

/// Composite registry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingKey {
    pub event: EventKind,
    pub entity_type: EntityType,
}

impl BindingKey {
    pub fn new(event: EventKind, entity_type: EntityType) -> Self {
        Self { event, entity_type }
    }
}

/// Thread-safe binding table.
///
/// Lookups take a shared read guard; attach and detach take the write guard,
/// so a reader sees either the whole mutation or none of it.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    bindings: RwLock<HashMap<BindingKey, Vec<SubscriptionId>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a subscription. Returns `false` if the binding already existed.
    pub async fn attach(
        &self,
        event: EventKind,
        entity_type: &EntityType,
        subscription_id: SubscriptionId,
    ) -> bool {
        let mut bindings = self.bindings.write().await;
        let ids = bindings
            .entry(BindingKey::new(event, entity_type.clone()))
            .or_default();

        if ids.contains(&subscription_id) {
            return false;
        }
        ids.push(subscription_id);

        debug!(
            event = %event,
            entity_type = %entity_type,
            subscription_id = %subscription_id,
            "Attached binding"
        );
        true
    }

    /// Remove a binding. Returns `false` if there was nothing to remove.
    pub async fn detach(
        &self,
        event: EventKind,
        entity_type: &EntityType,
        subscription_id: SubscriptionId,
    ) -> bool {
        let mut bindings = self.bindings.write().await;
        let key = BindingKey::new(event, entity_type.clone());

        let Some(ids) = bindings.get_mut(&key) else {
            return false;
        };
        let before = ids.len();
        ids.retain(|id| *id != subscription_id);
        let removed = ids.len() != before;

        if ids.is_empty() {
            bindings.remove(&key);
        }

        if removed {
            debug!(
                event = %event,
                entity_type = %entity_type,
                subscription_id = %subscription_id,
                "Detached binding"
            );
        }
        removed
    }

    /// Subscriptions bound to the key, in attach order.
    pub async fn matching_subscriptions(
        &self,
        event: EventKind,
        entity_type: &EntityType,
    ) -> Vec<SubscriptionId> {
        let bindings = self.bindings.read().await;
        bindings
            .get(&BindingKey::new(event, entity_type.clone()))
            .cloned()
            .unwrap_or_default()
    }

    /// Snapshot of every binding, sorted by key.
    pub async fn bindings(&self) -> Vec<(BindingKey, SubscriptionId)> {
        let bindings = self.bindings.read().await;
        let mut all: Vec<(BindingKey, SubscriptionId)> = bindings
            .iter()
            .flat_map(|(key, ids)| ids.iter().map(move |id| (key.clone(), *id)))
            .collect();
        all.sort();
        all
    }

    /// Drop every binding.
    pub async fn clear(&self) {
        self.bindings.write().await.clear();
    }

    /// Number of live bindings.
    pub async fn len(&self) -> usize {
        self.bindings.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
