//! Per-instance field storage.
//!
//! Every instance owns a [`FieldStore`]. The default, [`ObservableFieldStore`],
//! publishes a [`FieldChange`] on every write so views can react without the
//! model layer knowing about them.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use tokio::sync::broadcast;

use crate::value::FieldValue;

/// Buffered change events per subscriber before the slowest one lags.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// A write to one field. `value: None` means the field was cleared.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldChange {
    pub key: String,
    pub value: Option<FieldValue>,
}

/// Key/value storage backing an instance's fields.
pub trait FieldStore: Send + Sync {
    fn get(&self, key: &str) -> Option<FieldValue>;

    fn set(&self, key: &str, value: Option<FieldValue>);

    /// Subscribe to writes. Stores that do not publish changes return `None`.
    fn subscribe(&self) -> Option<broadcast::Receiver<FieldChange>> {
        None
    }
}

/// Default [`FieldStore`]: a map plus a broadcast channel of writes.
pub struct ObservableFieldStore {
    values: RwLock<HashMap<String, FieldValue>>,
    changes: broadcast::Sender<FieldChange>,
}

impl ObservableFieldStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            values: RwLock::new(HashMap::new()),
            changes,
        }
    }
}

impl Default for ObservableFieldStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldStore for ObservableFieldStore {
    fn get(&self, key: &str) -> Option<FieldValue> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        values.get(key).cloned()
    }

    fn set(&self, key: &str, value: Option<FieldValue>) {
        {
            let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
            match &value {
                Some(v) => values.insert(key.to_string(), v.clone()),
                None => values.remove(key),
            };
        }
        // No subscribers is not an error.
        let _ = self.changes.send(FieldChange {
            key: key.to_string(),
            value,
        });
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<FieldChange>> {
        Some(self.changes.subscribe())
    }
}
