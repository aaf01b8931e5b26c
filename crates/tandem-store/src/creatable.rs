use std::any::Any;
use std::sync::{Arc, Weak};

use tandem_model::{ModelType, Type};

use crate::base::{DomainBinding, Entry, ItemRegistry, MutabilityType, Store};
use crate::domain::Domain;
use crate::network::{Counts, NetworkCounts};

/// Registry of creatable items keyed by id.
pub struct CreatableStore {
    name: String,
    items: ItemRegistry<Entry>,
    counts: NetworkCounts,
    binding: DomainBinding,
}

impl CreatableStore {
    /// A store named after `model`.
    pub fn new(model: &ModelType) -> Self {
        Self::named(model.name())
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: ItemRegistry::default(),
            counts: NetworkCounts::default(),
            binding: DomainBinding::default(),
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<Entry>> {
        self.items.get(id)
    }

    /// Register `id`, returning the existing entry if there is one.
    pub fn insert(&self, id: &str) -> Arc<Entry> {
        self.items.insert_if_absent(id, Arc::new(Entry::new(id)))
    }

    pub fn values(&self) -> Vec<Arc<Entry>> {
        self.items.values()
    }

    /// The domain this store is registered with, while it is alive.
    pub fn domain(&self) -> Option<Arc<Domain>> {
        self.binding.weak().upgrade()
    }
}

impl Store for CreatableStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn mutability(&self) -> MutabilityType {
        MutabilityType::Creatable
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn has(&self, id: &str) -> bool {
        self.items.has(id)
    }

    fn ids(&self) -> Vec<String> {
        self.items.ids()
    }

    fn counts(&self) -> Counts {
        self.counts.get()
    }

    fn bind(&self, domain: Weak<Domain>) {
        self.binding.bind(&self.name, domain);
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}
