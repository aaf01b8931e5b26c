use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock, Weak};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::domain::Domain;
use crate::error::{StoreError, StoreResult};
use crate::network::{Counts, NetworkState};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MutabilityType {
    Immutable,
    Creatable,
    Mutable,
}

impl fmt::Display for MutabilityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Immutable => "Immutable",
            Self::Creatable => "Creatable",
            Self::Mutable => "Mutable",
        };
        f.write_str(s)
    }
}

/// A named collection of items, registered with a [`Domain`].
pub trait Store: Send + Sync {
    fn name(&self) -> &str;
    fn mutability(&self) -> MutabilityType;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn has(&self, id: &str) -> bool;
    /// Registered ids, sorted.
    fn ids(&self) -> Vec<String>;
    /// Requests currently in flight.
    fn counts(&self) -> Counts;
    /// Called once by [`Domain::new`].
    fn bind(&self, domain: Weak<Domain>);
    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

/// An item of an immutable or creatable store.
#[derive(Debug)]
pub struct Entry {
    id: String,
    network: NetworkState,
}

impl Entry {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            network: NetworkState::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn network(&self) -> &NetworkState {
        &self.network
    }
}

/// Id-keyed item map shared by every store kind.
pub(crate) struct ItemRegistry<I> {
    items: RwLock<HashMap<String, Arc<I>>>,
}

impl<I> Default for ItemRegistry<I> {
    fn default() -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
        }
    }
}

impl<I> ItemRegistry<I> {
    pub(crate) fn get(&self, id: &str) -> Option<Arc<I>> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub(crate) fn has(&self, id: &str) -> bool {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    pub(crate) fn len(&self) -> usize {
        self.items.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub(crate) fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        ids.sort();
        ids
    }

    pub(crate) fn values(&self) -> Vec<Arc<I>> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Insert, replacing any item under the same id.
    pub(crate) fn insert(&self, id: &str, item: Arc<I>) {
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), item);
    }

    /// Insert unless the id is taken; returns the registered item.
    pub(crate) fn insert_if_absent(&self, id: &str, item: Arc<I>) -> Arc<I> {
        self.items
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id.to_string())
            .or_insert(item)
            .clone()
    }
}

/// A store's back-link to the domain it is registered with.
#[derive(Default)]
pub(crate) struct DomainBinding {
    domain: OnceLock<Weak<Domain>>,
}

impl DomainBinding {
    pub(crate) fn bind(&self, store: &str, domain: Weak<Domain>) {
        if self.domain.set(domain).is_err() {
            warn!(store, "store is already registered with a domain; ignoring");
        }
    }

    pub(crate) fn weak(&self) -> Weak<Domain> {
        self.domain.get().cloned().unwrap_or_default()
    }

    pub(crate) fn get(&self, store: &str) -> StoreResult<Arc<Domain>> {
        self.domain
            .get()
            .and_then(Weak::upgrade)
            .ok_or_else(|| StoreError::Unbound(store.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_basics() {
        let registry: ItemRegistry<u32> = ItemRegistry::default();
        registry.insert("b", Arc::new(2));
        registry.insert("a", Arc::new(1));
        assert_eq!(registry.len(), 2);
        assert!(registry.has("a"));
        assert_eq!(registry.ids(), vec!["a", "b"]);
        assert_eq!(registry.get("b").as_deref(), Some(&2));
        assert!(!registry.has("c"));
    }

    #[test]
    fn insert_if_absent_keeps_first() {
        let registry: ItemRegistry<u32> = ItemRegistry::default();
        let first = Arc::new(1);
        assert!(Arc::ptr_eq(&registry.insert_if_absent("x", first.clone()), &first));
        let kept = registry.insert_if_absent("x", Arc::new(2));
        assert!(Arc::ptr_eq(&kept, &first));
    }

    #[test]
    fn unbound_store() {
        let binding = DomainBinding::default();
        assert!(matches!(binding.get("pricers"), Err(StoreError::Unbound(name)) if name == "pricers"));
    }

    #[test]
    fn mutability_display() {
        assert_eq!(MutabilityType::Creatable.to_string(), "Creatable");
    }
}
