//! Entity type catalog and the variable manifest shown to template authors.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use crate::error::CourierResult;
use crate::models::EntityType;

/// Reflection capability an entity type exposes for manifest computation.
pub trait EntityModel: Send + Sync {
    /// Stored field names.
    fn field_names(&self) -> Vec<String>;

    /// Callable names (computed properties, helpers).
    fn method_names(&self) -> Vec<String>;
}

/// Resolves entity type names to live models.
#[cfg_attr(test, mockall::automock)]
pub trait EntityTypeCatalog: Send + Sync {
    /// `None` when the type is no longer part of the system.
    fn resolve_model(&self, entity_type: &EntityType) -> Option<Arc<dyn EntityModel>>;
}

/// Model described by explicit name lists.
#[derive(Debug, Clone, Default)]
pub struct StaticModel {
    fields: Vec<String>,
    methods: Vec<String>,
}

impl StaticModel {
    pub fn new<F, M>(fields: F, methods: M) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            methods: methods.into_iter().map(Into::into).collect(),
        }
    }
}

impl EntityModel for StaticModel {
    fn field_names(&self) -> Vec<String> {
        self.fields.clone()
    }

    fn method_names(&self) -> Vec<String> {
        self.methods.clone()
    }
}

/// In-memory catalog (for development/testing and for hosts that register
/// their entity types at start-up).
#[derive(Default, Clone)]
pub struct InMemoryEntityCatalog {
    models: Arc<RwLock<HashMap<EntityType, Arc<dyn EntityModel>>>>,
}

impl InMemoryEntityCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a model.
    pub fn register(&self, entity_type: impl Into<EntityType>, model: impl EntityModel + 'static) {
        if let Ok(mut models) = self.models.write() {
            models.insert(entity_type.into(), Arc::new(model));
        }
    }

    /// Remove a model, simulating a type dropped from the system.
    pub fn unregister(&self, entity_type: &EntityType) -> bool {
        self.models
            .write()
            .map(|mut models| models.remove(entity_type).is_some())
            .unwrap_or(false)
    }
}

impl EntityTypeCatalog for InMemoryEntityCatalog {
    fn resolve_model(&self, entity_type: &EntityType) -> Option<Arc<dyn EntityModel>> {
        self.models.read().ok()?.get(entity_type).cloned()
    }
}

/// Context names available to a template: `site` plus the object root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct VariableManifest(BTreeMap<String, Vec<String>>);

impl VariableManifest {
    /// Enumerate the names a template may reference under `object_name`.
    ///
    /// Fields come first, in model order, followed by methods that are not
    /// also fields. Names starting with `_` and ignored method names are left
    /// out.
    pub fn compute(
        model: &dyn EntityModel,
        object_name: &str,
        ignored_methods: &BTreeSet<String>,
    ) -> Self {
        let fields = model.field_names();

        let mut names: Vec<String> = fields
            .iter()
            .filter(|name| !name.starts_with('_'))
            .cloned()
            .collect();

        for method in model.method_names() {
            if method.starts_with('_')
                || fields.contains(&method)
                || ignored_methods.contains(&method)
                || names.contains(&method)
            {
                continue;
            }
            names.push(method);
        }

        let mut roots = BTreeMap::new();
        roots.insert(
            "site".to_string(),
            vec!["name".to_string(), "domain".to_string()],
        );
        roots.insert(object_name.to_string(), names);
        Self(roots)
    }

    /// Names listed under a root.
    pub fn names(&self, root: &str) -> Option<&[String]> {
        self.0.get(root).map(Vec::as_slice)
    }

    /// JSON form persisted on the template.
    pub fn to_json(&self) -> CourierResult<String> {
        Ok(serde_json::to_string(&self.0)?)
    }
}
