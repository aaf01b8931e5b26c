//! Request bookkeeping: per-item network state, per-store counters and
//! operation descriptors.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkAction {
    #[default]
    None,
    Loading,
    Creating,
    Committing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkStatus {
    Static,
    Pending,
}

/// What, if anything, an item is waiting on.
#[derive(Debug, Default)]
pub struct NetworkState {
    action: RwLock<NetworkAction>,
}

impl NetworkState {
    pub fn new(action: NetworkAction) -> Self {
        Self {
            action: RwLock::new(action),
        }
    }

    pub fn action(&self) -> NetworkAction {
        *self.action.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_action(&self, action: NetworkAction) {
        *self.action.write().unwrap_or_else(PoisonError::into_inner) = action;
    }

    pub fn status(&self) -> NetworkStatus {
        match self.action() {
            NetworkAction::None => NetworkStatus::Static,
            _ => NetworkStatus::Pending,
        }
    }
}

/// Point-in-time copy of [`NetworkCounts`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub loading: usize,
    pub creating: usize,
    pub committing: usize,
}

/// Requests in flight for one store, by action.
#[derive(Debug, Default)]
pub struct NetworkCounts {
    loading: AtomicUsize,
    creating: AtomicUsize,
    committing: AtomicUsize,
}

impl NetworkCounts {
    pub fn get(&self) -> Counts {
        Counts {
            loading: self.loading.load(Ordering::SeqCst),
            creating: self.creating.load(Ordering::SeqCst),
            committing: self.committing.load(Ordering::SeqCst),
        }
    }

    /// Mark `state` as busy with `action` until the guard drops.
    pub(crate) fn begin<'a>(&'a self, state: &'a NetworkState, action: NetworkAction) -> InFlight<'a> {
        if let Some(counter) = self.counter(action) {
            counter.fetch_add(1, Ordering::SeqCst);
        }
        state.set_action(action);
        InFlight {
            counts: self,
            state,
            action,
        }
    }

    fn counter(&self, action: NetworkAction) -> Option<&AtomicUsize> {
        match action {
            NetworkAction::None => None,
            NetworkAction::Loading => Some(&self.loading),
            NetworkAction::Creating => Some(&self.creating),
            NetworkAction::Committing => Some(&self.committing),
        }
    }
}

/// Resets the item's action and decrements the store counter on drop.
pub(crate) struct InFlight<'a> {
    counts: &'a NetworkCounts,
    state: &'a NetworkState,
    action: NetworkAction,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.state.set_action(NetworkAction::None);
        if let Some(counter) = self.counts.counter(self.action) {
            counter.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// A remote operation: the document sent to the service, the response field
/// it answers under, and the field of that holding the document snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Operation {
    root: String,
    document: String,
    payload: String,
}

impl Operation {
    /// Describe an operation, taking the root field from the document's
    /// operation name.
    pub fn new(document: impl Into<String>, payload: impl Into<String>) -> StoreResult<Self> {
        let document = document.into();
        let root = operation_root(&document)
            .ok_or_else(|| StoreError::InvalidOperation(document.clone()))?
            .to_string();
        Ok(Self {
            root,
            document,
            payload: payload.into(),
        })
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn document(&self) -> &str {
        &self.document
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}

/// Name of the first operation defined in `document`.
///
/// `mutation createPricer($input: ...) { ... }` yields `createPricer`.
pub fn operation_root(document: &str) -> Option<&str> {
    let rest = document.trim_start();
    let rest = ["query", "mutation", "subscription"]
        .iter()
        .find_map(|keyword| rest.strip_prefix(keyword))?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let rest = rest.trim_start();
    let end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    let name = &rest[..end];
    match name.chars().next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => Some(name),
        _ => None,
    }
}
