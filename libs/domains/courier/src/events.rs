//! Lifecycle events published by entity stores.
//!
//! Stores report raw saves and deletes; the `created`/`modified` split is made
//! here, when the event is built, from the store's new-record flag. Consumers
//! only ever see one of the three [`EventKind`]s.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::warn;

use crate::models::{EntityType, EventKind};

/// A synthesized lifecycle event for one entity instance.
#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleEvent {
    pub entity_type: EntityType,
    pub kind: EventKind,
    /// Serialized instance, exposed to templates under the object name.
    pub instance: Value,
}

impl LifecycleEvent {
    /// Event for a save: `created` for a new record, `modified` otherwise.
    pub fn saved(entity_type: EntityType, instance: Value, is_new_record: bool) -> Self {
        let kind = if is_new_record {
            EventKind::Created
        } else {
            EventKind::Modified
        };
        Self {
            entity_type,
            kind,
            instance,
        }
    }

    /// Event for a delete.
    pub fn deleted(entity_type: EntityType, instance: Value) -> Self {
        Self {
            entity_type,
            kind: EventKind::Deleted,
            instance,
        }
    }
}

/// Receiver of lifecycle events.
///
/// Publishing never fails: notification outcomes must not affect the
/// mutation that produced the event.
#[async_trait]
pub trait LifecycleSink: Send + Sync {
    async fn publish(&self, event: LifecycleEvent);
}

/// Handle an entity store holds to report its mutations.
#[derive(Clone)]
pub struct EntityEvents {
    sink: Arc<dyn LifecycleSink>,
}

impl EntityEvents {
    pub fn new(sink: Arc<dyn LifecycleSink>) -> Self {
        Self { sink }
    }

    /// Report a saved instance.
    pub async fn saved<T: Serialize + ?Sized>(
        &self,
        entity_type: &EntityType,
        instance: &T,
        is_new_record: bool,
    ) {
        if let Some(value) = Self::serialize(entity_type, instance) {
            self.sink
                .publish(LifecycleEvent::saved(entity_type.clone(), value, is_new_record))
                .await;
        }
    }

    /// Report a deleted instance.
    pub async fn deleted<T: Serialize + ?Sized>(&self, entity_type: &EntityType, instance: &T) {
        if let Some(value) = Self::serialize(entity_type, instance) {
            self.sink
                .publish(LifecycleEvent::deleted(entity_type.clone(), value))
                .await;
        }
    }

    fn serialize<T: Serialize + ?Sized>(entity_type: &EntityType, instance: &T) -> Option<Value> {
        match serde_json::to_value(instance) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(entity_type = %entity_type, error = %e, "Could not serialize instance, event dropped");
                None
            }
        }
    }
}
