//! Live object graphs described by a schema.
//!
//! A [`ModelType`] declares named, typed properties. Instances are shared
//! [`ModelRef`] handles whose fields live in a [`FieldStore`]. Every type
//! converts between live values and JSON snapshots, and model types
//! reconcile a snapshot onto an existing instance instead of rebuilding it:
//! an instance whose identity key matches the snapshot is updated in place,
//! so handles held elsewhere stay valid.
//!
//! # Modules
//!
//! - [`types`]: the [`Type`] trait, primitive, scalar and model types
//! - [`instance`]: [`ModelRef`] and parent links
//! - [`property`]: [`Property`] and custom [`Accessor`]s
//! - [`field`]: per-instance storage and change notification
//! - [`ops`]: whole-graph helpers such as [`apply_snapshot`]

pub mod context;
pub mod error;
pub mod field;
pub mod instance;
pub mod ops;
pub mod property;
pub mod types;
pub mod value;

pub use context::Context;
pub use error::{ModelError, ModelResult};
pub use field::{FieldChange, FieldStore, ObservableFieldStore};
pub use instance::ModelRef;
pub use ops::{apply_snapshot, serialize};
pub use property::{fallback, Accessor, Fallback, Property};
pub use types::model::{DEFAULT_IDENTIFIER, TYPENAME_KEY};
pub use types::{ModelType, PrimitiveKind, PrimitiveType, ScalarType, Type, TypeKind, TypeRef};
pub use value::{json_kind, FieldValue};
