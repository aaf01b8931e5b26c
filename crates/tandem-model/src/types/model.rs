use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::context::Context;
use crate::error::{ModelError, ModelResult};
use crate::field::{FieldStore, ObservableFieldStore};
use crate::instance::ModelRef;
use crate::property::Property;
use crate::types::{Type, TypeKind};
use crate::value::{json_kind, FieldValue};

/// Reserved snapshot key naming the model that produced the snapshot.
pub const TYPENAME_KEY: &str = "__typename";

/// Property compared to decide whether a snapshot describes the same instance.
pub const DEFAULT_IDENTIFIER: &str = "id";

type FieldStoreFactory = Arc<dyn Fn() -> Box<dyn FieldStore> + Send + Sync>;

#[derive(Clone)]
struct Schema {
    name: String,
    identifier: String,
    properties: Vec<(String, Property)>,
    field_store: FieldStoreFactory,
}

/// Compound type: an ordered record of named, typed properties.
///
/// Cloning a `ModelType` is cheap and yields the same schema.
#[derive(Clone)]
pub struct ModelType {
    schema: Arc<Schema>,
}

impl ModelType {
    pub fn new<K, I>(name: impl Into<String>, properties: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Property)>,
    {
        Self {
            schema: Arc::new(Schema {
                name: name.into(),
                identifier: DEFAULT_IDENTIFIER.to_string(),
                properties: properties
                    .into_iter()
                    .map(|(k, p)| (k.into(), p))
                    .collect(),
                field_store: Arc::new(|| Box::new(ObservableFieldStore::new()) as Box<dyn FieldStore>),
            }),
        }
    }

    /// Use a different property as the identity key.
    pub fn with_identifier(mut self, key: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.schema).identifier = key.into();
        self
    }

    /// Back new instances with a custom field store.
    pub fn with_field_store<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Box<dyn FieldStore> + Send + Sync + 'static,
    {
        Arc::make_mut(&mut self.schema).field_store = Arc::new(factory);
        self
    }

    pub fn identifier(&self) -> &str {
        &self.schema.identifier
    }

    /// Properties in declaration order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.schema.properties.iter().map(|(k, p)| (k.as_str(), p))
    }

    pub fn property(&self, key: &str) -> Option<&Property> {
        self.schema
            .properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, p)| p)
    }

    /// A fresh, unattached instance with no fields set.
    pub fn instantiate(&self, context: Context) -> ModelRef {
        ModelRef::new(self.clone(), context, (self.schema.field_store)())
    }

    /// Snapshot of an instance: every present property in declaration order,
    /// then [`TYPENAME_KEY`].
    pub fn serialize_instance(&self, instance: &ModelRef) -> ModelResult<Value> {
        let mut snapshot = Map::new();
        for (key, property) in self.properties() {
            if !property.ty().is_persistent() {
                continue;
            }
            if let Some(value) = instance.get(key)? {
                if let Some(serialized) = property.ty().serialize(&value)? {
                    snapshot.insert(key.to_string(), serialized);
                }
            }
        }
        snapshot.insert(TYPENAME_KEY.to_string(), Value::String(self.name().to_string()));
        Ok(Value::Object(snapshot))
    }

    /// Reconcile `snapshot` onto `existing`, or build a fresh instance.
    ///
    /// An existing instance is reused when its identity key equals the
    /// snapshot's and it belongs to this schema; otherwise it is detached and
    /// replaced. Properties missing from the snapshot are left untouched.
    /// Present ones are deserialized with the current field value as the
    /// existing value, so nested models reconcile recursively.
    pub fn deserialize_instance(
        &self,
        snapshot: &Value,
        existing: Option<&ModelRef>,
        context: &Context,
    ) -> ModelResult<ModelRef> {
        let fields = snapshot.as_object().ok_or_else(|| ModelError::TypeMismatch {
            type_name: self.name().to_string(),
            expected: "object".to_string(),
            found: json_kind(snapshot).to_string(),
        })?;

        let instance = match existing {
            None => self.instantiate(context.clone()),
            Some(current) if self.is_same_identity(current, fields)? => {
                debug!(model = %self.name(), "reconciling in place");
                current.clone()
            }
            Some(current) => {
                debug!(model = %self.name(), "identity changed; replacing instance");
                current.model().detach(current);
                self.instantiate(context.clone())
            }
        };

        for (key, property) in self.properties() {
            let Some(incoming) = fields.get(key) else {
                continue;
            };
            let current = instance.get(key)?;
            let next = property.ty().deserialize(incoming, current.as_ref(), context)?;
            instance.set(key, next)?;
        }
        Ok(instance)
    }

    /// Deserialize a root instance and attach its subgraph.
    pub fn create(&self, snapshot: &Value, context: &Context) -> ModelResult<ModelRef> {
        let instance = self.deserialize_instance(snapshot, None, context)?;
        self.attach(&instance, None)?;
        Ok(instance)
    }

    /// Set `instance`'s parent link and attach every compound child that is
    /// not attached yet.
    ///
    /// Children that already have a parent are skipped, so repeated calls are
    /// no-ops and shared or cyclic subgraphs are walked once.
    pub fn attach(&self, instance: &ModelRef, parent: Option<&ModelRef>) -> ModelResult<()> {
        instance.set_parent(parent);
        for (key, property) in self.properties() {
            let Some(child_type) = property.ty().as_model() else {
                continue;
            };
            let Some(child) = instance.get_model(key)? else {
                continue;
            };
            if child.is_attached() {
                continue;
            }
            debug!(model = %self.name(), property = key, "attaching child");
            child_type.attach(&child, Some(instance))?;
        }
        Ok(())
    }

    /// Clear `instance`'s parent link. Children keep theirs.
    pub fn detach(&self, instance: &ModelRef) {
        instance.set_parent(None);
    }

    fn is_same_identity(&self, current: &ModelRef, incoming: &Map<String, Value>) -> ModelResult<bool> {
        if current.model().name() != self.name() {
            return Ok(false);
        }
        let key = self.identifier();
        let current_key = match self.property(key) {
            Some(property) => match current.get(key)? {
                Some(value) => property.ty().serialize(&value)?,
                None => None,
            },
            None => None,
        };
        Ok(current_key.as_ref() == incoming.get(key))
    }
}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let keys: Vec<&str> = self.properties().map(|(k, _)| k).collect();
        f.debug_struct("ModelType")
            .field("name", &self.schema.name)
            .field("properties", &keys)
            .finish()
    }
}

impl Type for ModelType {
    fn name(&self) -> &str {
        &self.schema.name
    }

    fn kind(&self) -> TypeKind {
        TypeKind::Compound
    }

    fn serialize(&self, value: &FieldValue) -> ModelResult<Option<Value>> {
        match value {
            FieldValue::Model(instance) => self.serialize_instance(instance).map(Some),
            other => Err(ModelError::TypeMismatch {
                type_name: self.name().to_string(),
                expected: "model".to_string(),
                found: other.kind().to_string(),
            }),
        }
    }

    fn deserialize(
        &self,
        snapshot: &Value,
        existing: Option<&FieldValue>,
        context: &Context,
    ) -> ModelResult<Option<FieldValue>> {
        if snapshot.is_null() {
            return Ok(None);
        }
        let existing = existing.and_then(FieldValue::as_model);
        self.deserialize_instance(snapshot, existing, context)
            .map(|instance| Some(FieldValue::Model(instance)))
    }

    fn as_model(&self) -> Option<&ModelType> {
        Some(self)
    }
}
