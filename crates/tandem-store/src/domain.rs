use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use tracing::info;

use crate::base::Store;
use crate::config::StoreConfig;
use crate::mutable::MutableStore;
use crate::remote::RemoteClient;

/// The remote client, configuration and every store of one application.
pub struct Domain {
    client: Arc<dyn RemoteClient>,
    config: StoreConfig,
    stores: HashMap<String, Arc<dyn Store>>,
}

impl Domain {
    /// Register `stores` under their names and bind each one to the domain.
    /// A later store with a duplicate name replaces the earlier one.
    pub fn new(
        client: Arc<dyn RemoteClient>,
        config: StoreConfig,
        stores: Vec<Arc<dyn Store>>,
    ) -> Arc<Self> {
        let stores: HashMap<String, Arc<dyn Store>> = stores
            .into_iter()
            .map(|store| (store.name().to_string(), store))
            .collect();
        let domain = Arc::new(Self {
            client,
            config,
            stores,
        });
        for store in domain.stores.values() {
            store.bind(Arc::downgrade(&domain));
        }
        info!(stores = domain.stores.len(), author = %domain.config.author, "domain ready");
        domain
    }

    pub fn client(&self) -> &Arc<dyn RemoteClient> {
        &self.client
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn store(&self, name: &str) -> Option<Arc<dyn Store>> {
        self.stores.get(name).cloned()
    }

    /// Store names, sorted.
    pub fn store_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.stores.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Look up a store and downcast it to [`MutableStore`].
    pub fn mutable(&self, name: &str) -> Option<Arc<MutableStore>> {
        self.store(name)?.as_any().downcast::<MutableStore>().ok()
    }
}

impl fmt::Debug for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Domain")
            .field("config", &self.config)
            .field("stores", &self.store_names())
            .finish()
    }
}

/// Context carried by instances a store creates.
#[derive(Clone, Debug)]
pub struct DomainContext {
    domain: Weak<Domain>,
    store: String,
}

impl DomainContext {
    pub(crate) fn new(domain: Weak<Domain>, store: impl Into<String>) -> Self {
        Self {
            domain,
            store: store.into(),
        }
    }

    /// The domain, while it is alive.
    pub fn domain(&self) -> Option<Arc<Domain>> {
        self.domain.upgrade()
    }

    /// Name of the store that created the instance.
    pub fn store(&self) -> &str {
        &self.store
    }
}
