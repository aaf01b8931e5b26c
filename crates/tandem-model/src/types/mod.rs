//! Schema descriptors.
//!
//! A [`Type`] knows how to turn a live [`FieldValue`] into its snapshot form
//! and back. Three kinds exist:
//!
//! - **Primitive** ([`PrimitiveType`]): strings, numbers, booleans; both
//!   directions pass the value through.
//! - **Scalar** ([`ScalarType`]): a pair of caller-supplied conversions, such
//!   as a date and its ISO-8601 string.
//! - **Compound** ([`ModelType`]): a record of named properties whose
//!   deserialize reconciles onto an existing instance.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::context::Context;
use crate::error::ModelResult;
use crate::property::Property;
use crate::value::FieldValue;

pub mod model;
pub mod primitive;
pub mod scalar;

pub use model::ModelType;
pub use primitive::{PrimitiveKind, PrimitiveType};
pub use scalar::ScalarType;

/// Shared handle to a schema type.
pub type TypeRef = Arc<dyn Type>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeKind {
    Primitive,
    Scalar,
    Compound,
}

/// A value kind with a snapshot representation.
pub trait Type: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn kind(&self) -> TypeKind;

    /// Whether values of this type are written into snapshots.
    fn is_persistent(&self) -> bool {
        true
    }

    fn is_primitive(&self) -> bool {
        self.kind() == TypeKind::Primitive
    }

    fn is_compound(&self) -> bool {
        self.kind() == TypeKind::Compound
    }

    /// Snapshot form of a live value. `None` means the value serializes to
    /// nothing and the field is omitted.
    fn serialize(&self, value: &FieldValue) -> ModelResult<Option<Value>>;

    /// Live value for a snapshot. `existing` is the field's current value;
    /// compound types reconcile onto it, leaf types overwrite it. `None`
    /// means the field becomes absent.
    fn deserialize(
        &self,
        snapshot: &Value,
        existing: Option<&FieldValue>,
        context: &Context,
    ) -> ModelResult<Option<FieldValue>>;

    /// Downcast to a model type.
    fn as_model(&self) -> Option<&ModelType> {
        None
    }
}

/// Wrap a type as a property with the default accessor.
pub fn prop(ty: TypeRef) -> Property {
    Property::new(ty)
}

pub fn string() -> TypeRef {
    Arc::new(PrimitiveType::new("StringType", PrimitiveKind::String))
}

pub fn number() -> TypeRef {
    Arc::new(PrimitiveType::new("NumberType", PrimitiveKind::Number))
}

pub fn boolean() -> TypeRef {
    Arc::new(PrimitiveType::new("BooleanType", PrimitiveKind::Boolean))
}

/// Calendar date, snapshotted as `YYYY-MM-DD`.
pub fn date() -> TypeRef {
    Arc::new(ScalarType::date())
}

/// Instant, snapshotted as ISO-8601 UTC with milliseconds.
pub fn datetime() -> TypeRef {
    Arc::new(ScalarType::datetime())
}

/// A model type with properties in declaration order.
pub fn model<K, I>(name: impl Into<String>, properties: I) -> ModelType
where
    K: Into<String>,
    I: IntoIterator<Item = (K, Property)>,
{
    ModelType::new(name, properties)
}
