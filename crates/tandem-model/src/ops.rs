//! Operations on a whole instance graph.

use serde_json::Value;
use tracing::debug;

use crate::error::ModelResult;
use crate::instance::ModelRef;
use crate::types::Type;

/// Snapshot of `instance` under its own model type.
pub fn serialize(instance: &ModelRef) -> ModelResult<Value> {
    instance.serialize()
}

/// Reconcile `snapshot` onto `instance` in its own context and attach the
/// result as a root.
///
/// Returns `instance` itself when the identity key matches, otherwise a new
/// instance (and `instance` is detached).
pub fn apply_snapshot(instance: &ModelRef, snapshot: &Value) -> ModelResult<ModelRef> {
    let model = instance.model();
    debug!(model = %model.name(), "applying snapshot");
    let reconciled = model.deserialize_instance(snapshot, Some(instance), instance.context())?;
    model.attach(&reconciled, None)?;
    Ok(reconciled)
}
