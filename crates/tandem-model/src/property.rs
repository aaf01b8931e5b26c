use std::fmt;
use std::sync::Arc;

use crate::instance::ModelRef;
use crate::types::TypeRef;
use crate::value::FieldValue;

/// Custom read/write path for one property.
///
/// When a property declares an accessor, every read and write of that field
/// goes through it instead of the instance's field store.
pub trait Accessor: Send + Sync {
    fn get(&self, instance: &ModelRef, key: &str) -> Option<FieldValue>;

    fn set(&self, instance: &ModelRef, key: &str, value: Option<FieldValue>);
}

/// A named, typed field of a model.
#[derive(Clone)]
pub struct Property {
    ty: TypeRef,
    accessor: Option<Arc<dyn Accessor>>,
}

impl Property {
    pub fn new(ty: TypeRef) -> Self {
        Self { ty, accessor: None }
    }

    pub fn with_accessor(mut self, accessor: impl Accessor + 'static) -> Self {
        self.accessor = Some(Arc::new(accessor));
        self
    }

    pub fn ty(&self) -> &TypeRef {
        &self.ty
    }

    pub fn accessor(&self) -> Option<&Arc<dyn Accessor>> {
        self.accessor.as_ref()
    }
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("type", &self.ty.name())
            .field("custom_accessor", &self.accessor.is_some())
            .finish()
    }
}

/// Accessor that reads the stored value and, when it is absent, computes one.
/// Writes go straight to the instance's field store.
pub struct Fallback<F> {
    compute: F,
}

/// Build a [`Fallback`] accessor from a compute function.
pub fn fallback<F>(compute: F) -> Fallback<F>
where
    F: Fn(&ModelRef, &str) -> Option<FieldValue> + Send + Sync,
{
    Fallback { compute }
}

impl<F> Accessor for Fallback<F>
where
    F: Fn(&ModelRef, &str) -> Option<FieldValue> + Send + Sync,
{
    fn get(&self, instance: &ModelRef, key: &str) -> Option<FieldValue> {
        instance
            .field_store()
            .get(key)
            .or_else(|| (self.compute)(instance, key))
    }

    fn set(&self, instance: &ModelRef, key: &str, value: Option<FieldValue>) {
        instance.field_store().set(key, value);
    }
}
