use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use serde_json::Value;
use tokio::sync::broadcast;

use crate::context::Context;
use crate::error::{ModelError, ModelResult};
use crate::field::{FieldChange, FieldStore};
use crate::property::Property;
use crate::types::{ModelType, Type};
use crate::value::FieldValue;

struct Node {
    model: ModelType,
    context: Context,
    /// `Some` once attached, even when the parent has since been dropped.
    parent: RwLock<Option<Weak<Node>>>,
    fields: Box<dyn FieldStore>,
}

/// Shared handle to a live model instance.
///
/// Clones refer to the same instance; use [`ModelRef::ptr_eq`] to compare
/// identity. The parent link is a non-owning back-reference maintained by
/// [`ModelType::attach`] and [`ModelType::detach`].
#[derive(Clone)]
pub struct ModelRef(Arc<Node>);

impl ModelRef {
    pub(crate) fn new(model: ModelType, context: Context, fields: Box<dyn FieldStore>) -> Self {
        Self(Arc::new(Node {
            model,
            context,
            parent: RwLock::new(None),
            fields,
        }))
    }

    /// Returns `true` if both handles refer to the same instance.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub fn model(&self) -> &ModelType {
        &self.0.model
    }

    pub fn context(&self) -> &Context {
        &self.0.context
    }

    /// The instance's own field store, bypassing any custom accessors.
    pub fn field_store(&self) -> &dyn FieldStore {
        self.0.fields.as_ref()
    }

    /// Read a declared property through its accessor.
    pub fn get(&self, key: &str) -> ModelResult<Option<FieldValue>> {
        let property = self.declared(key)?;
        Ok(match property.accessor() {
            Some(accessor) => accessor.get(self, key),
            None => self.0.fields.get(key),
        })
    }

    /// Write a declared property through its accessor. `None` clears it.
    pub fn set(&self, key: &str, value: Option<FieldValue>) -> ModelResult<()> {
        let property = self.declared(key)?;
        match property.accessor() {
            Some(accessor) => accessor.set(self, key, value),
            None => self.0.fields.set(key, value),
        }
        Ok(())
    }

    /// Shorthand for `set(key, Some(value.into()))`.
    pub fn put(&self, key: &str, value: impl Into<FieldValue>) -> ModelResult<()> {
        self.set(key, Some(value.into()))
    }

    /// Read a string property.
    pub fn get_str(&self, key: &str) -> ModelResult<Option<String>> {
        Ok(self.get(key)?.and_then(|v| v.as_str().map(str::to_string)))
    }

    /// Read a model-valued property.
    pub fn get_model(&self, key: &str) -> ModelResult<Option<ModelRef>> {
        Ok(self.get(key)?.and_then(|v| v.as_model().cloned()))
    }

    /// The parent this instance is attached to, if it is still alive.
    pub fn parent(&self) -> Option<ModelRef> {
        let parent = self.0.parent.read().unwrap_or_else(PoisonError::into_inner);
        parent.as_ref().and_then(Weak::upgrade).map(ModelRef)
    }

    /// Returns `true` if a parent link has been recorded.
    pub fn is_attached(&self) -> bool {
        self.0
            .parent
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    pub(crate) fn set_parent(&self, parent: Option<&ModelRef>) {
        let mut slot = self.0.parent.write().unwrap_or_else(PoisonError::into_inner);
        *slot = parent.map(|p| Arc::downgrade(&p.0));
    }

    /// Subscribe to field writes, when the field store publishes them.
    pub fn subscribe(&self) -> Option<broadcast::Receiver<FieldChange>> {
        self.0.fields.subscribe()
    }

    /// Snapshot of this instance under its own model type.
    pub fn serialize(&self) -> ModelResult<Value> {
        self.model().serialize_instance(self)
    }

    fn declared(&self, key: &str) -> ModelResult<&Property> {
        self.0
            .model
            .property(key)
            .ok_or_else(|| ModelError::UnknownProperty {
                model: self.0.model.name().to_string(),
                key: key.to_string(),
            })
    }
}

impl fmt::Debug for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ModelRef({}@{:p})", self.0.model.name(), Arc::as_ptr(&self.0))
    }
}
