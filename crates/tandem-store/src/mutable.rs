//! Versioned documents confirmed by the remote service.
//!
//! `create` builds the live instance and its repo locally and returns at
//! once; confirmation happens in a spawned task. `get` returns a placeholder
//! for an unknown id and fetches it in a spawned task. Either way the caller
//! gets a [`JoinHandle`] that resolves to the operation's outcome. A failed
//! remote call leaves the local item in place.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use serde_json::{json, Map, Value};
use tandem_model::{apply_snapshot, json_kind, Context, ModelError, ModelRef, ModelType, Type};
use tandem_vcs::Repo;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::base::{DomainBinding, ItemRegistry, MutabilityType, Store};
use crate::domain::{Domain, DomainContext};
use crate::error::{StoreError, StoreResult};
use crate::network::{Counts, NetworkAction, NetworkCounts, NetworkState, Operation};
use crate::remote::RemoteRequest;

/// A document id, its history and its live instance, if there is one yet.
pub struct StoreItem {
    id: String,
    repo: RwLock<Repo>,
    data: RwLock<Option<ModelRef>>,
    network: NetworkState,
}

impl StoreItem {
    /// Bind `id` to `data`, starting a repo from its snapshot. Without data
    /// the repo starts from an empty object.
    pub fn new(id: impl Into<String>, data: Option<ModelRef>, author: &str) -> StoreResult<Self> {
        let id = id.into();
        let initial = match &data {
            Some(instance) => instance.serialize()?,
            None => Value::Object(Map::new()),
        };
        let repo = Repo::new(id.clone(), initial, author)?;
        Ok(Self {
            id,
            repo: RwLock::new(repo),
            data: RwLock::new(data),
            network: NetworkState::default(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// A copy of the item's repo.
    pub fn repo(&self) -> Repo {
        self.repo.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Run `f` against the repo, for example to commit.
    pub fn with_repo<R>(&self, f: impl FnOnce(&mut Repo) -> R) -> R {
        let mut repo = self.repo.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut repo)
    }

    pub fn data(&self) -> Option<ModelRef> {
        self.data.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn set_data(&self, data: ModelRef) {
        *self.data.write().unwrap_or_else(PoisonError::into_inner) = Some(data);
    }

    pub fn network(&self) -> &NetworkState {
        &self.network
    }
}

impl fmt::Debug for StoreItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreItem")
            .field("id", &self.id)
            .field("data", &self.data())
            .field("network", &self.network.action())
            .finish()
    }
}

/// Store of versioned, remotely confirmed documents of one model type.
pub struct MutableStore {
    model: ModelType,
    fetch: Operation,
    create: Operation,
    items: ItemRegistry<StoreItem>,
    /// Placeholders with a fetch outstanding. Only used with
    /// `StoreConfig::dedupe_fetches`.
    in_flight: Mutex<HashMap<String, Arc<StoreItem>>>,
    counts: NetworkCounts,
    binding: DomainBinding,
}

impl MutableStore {
    pub fn new(model: ModelType, fetch: Operation, create: Operation) -> Self {
        Self {
            model,
            fetch,
            create,
            items: ItemRegistry::default(),
            in_flight: Mutex::new(HashMap::new()),
            counts: NetworkCounts::default(),
            binding: DomainBinding::default(),
        }
    }

    pub fn model(&self) -> &ModelType {
        &self.model
    }

    /// A registered item, without fetching.
    pub fn item(&self, id: &str) -> Option<Arc<StoreItem>> {
        self.items.get(id)
    }

    pub fn values(&self) -> Vec<Arc<StoreItem>> {
        self.items.values()
    }

    /// Create a document from `graph` under a fresh id.
    ///
    /// The item is registered and returned before the remote call starts.
    /// Must be called within a Tokio runtime.
    pub fn create(
        self: &Arc<Self>,
        graph: &Value,
    ) -> StoreResult<(Arc<StoreItem>, JoinHandle<StoreResult<()>>)> {
        let domain = self.binding.get(self.name())?;
        let id = Uuid::now_v7().simple().to_string();
        let mut fields = match graph {
            Value::Object(fields) => fields.clone(),
            Value::Null => Map::new(),
            other => {
                return Err(StoreError::Model(ModelError::TypeMismatch {
                    type_name: self.model.name().to_string(),
                    expected: "object".to_string(),
                    found: json_kind(other).to_string(),
                }));
            }
        };
        fields.insert(self.model.identifier().to_string(), Value::String(id.clone()));

        let data = self.model.create(&Value::Object(fields), &self.context())?;
        let item = Arc::new(StoreItem::new(id.clone(), Some(data), &domain.config().author)?);
        self.items.insert(&id, item.clone());
        info!(store = %self.name(), id = %id, "created document");

        let store = Arc::clone(self);
        let pending = Arc::clone(&item);
        let task = tokio::spawn(async move { store.create_remote(&pending).await });
        Ok((item, task))
    }

    /// Send `item`'s repo to the remote service and reconcile the confirmed
    /// snapshot onto its live instance.
    pub async fn create_remote(&self, item: &StoreItem) -> StoreResult<()> {
        let domain = self.binding.get(self.name())?;
        let repo = item.repo().serialize().to_json()?;
        let request = RemoteRequest::new(&self.create, json!({ "input": { "repo": repo } }));

        let response = {
            let _flight = self.counts.begin(item.network(), NetworkAction::Creating);
            domain.client().mutate(request).await
        }?;
        let snapshot = response.payload(&self.create)?;

        if let Some(data) = item.data() {
            let reconciled = apply_snapshot(&data, &snapshot)?;
            if !ModelRef::ptr_eq(&reconciled, &data) {
                debug!(store = %self.name(), id = %item.id(), "confirmed snapshot replaced instance");
                item.set_data(reconciled);
            }
        }
        info!(store = %self.name(), id = %item.id(), "remote confirmed document");
        Ok(())
    }

    /// The item for `id`, fetching it if it is not registered.
    ///
    /// An unknown id yields a placeholder without data and the handle of its
    /// fetch. The placeholder is registered once the fetch succeeds. Unless
    /// fetches are deduplicated, every call made before then starts its own
    /// placeholder and fetch. Must be called within a Tokio runtime.
    pub fn get(
        self: &Arc<Self>,
        id: &str,
    ) -> StoreResult<(Arc<StoreItem>, Option<JoinHandle<StoreResult<()>>>)> {
        if let Some(item) = self.items.get(id) {
            return Ok((item, None));
        }
        let domain = self.binding.get(self.name())?;
        let author = &domain.config().author;

        let placeholder = if domain.config().dedupe_fetches {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(item) = self.items.get(id) {
                return Ok((item, None));
            }
            if let Some(item) = in_flight.get(id) {
                debug!(store = %self.name(), id, "joining outstanding fetch");
                return Ok((Arc::clone(item), None));
            }
            let placeholder = Arc::new(StoreItem::new(id, None, author)?);
            in_flight.insert(id.to_string(), Arc::clone(&placeholder));
            placeholder
        } else {
            Arc::new(StoreItem::new(id, None, author)?)
        };
        info!(store = %self.name(), id, "fetching document");

        let store = Arc::clone(self);
        let pending = Arc::clone(&placeholder);
        let task = tokio::spawn(async move { store.get_remote(&pending).await });
        Ok((placeholder, Some(task)))
    }

    /// Fetch `item`'s document, reconcile it onto the item and register the
    /// item. If another item was registered under the id meanwhile, that one
    /// is kept.
    ///
    /// Whatever the outcome, `item` stops being the outstanding fetch for its
    /// id before this returns, so later `get`s either find it registered or
    /// start a new fetch.
    pub async fn get_remote(&self, item: &Arc<StoreItem>) -> StoreResult<()> {
        let result = self.fetch_into(item).await;
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if result.is_ok() {
            self.register_fetched(item);
        }
        if in_flight.get(item.id()).is_some_and(|pending| Arc::ptr_eq(pending, item)) {
            in_flight.remove(item.id());
        }
        result
    }

    async fn fetch_into(&self, item: &StoreItem) -> StoreResult<()> {
        let domain = self.binding.get(self.name())?;
        let request = RemoteRequest::new(&self.fetch, json!({ "id": item.id() }));

        let response = {
            let _flight = self.counts.begin(item.network(), NetworkAction::Loading);
            domain.client().query(request).await
        }?;
        let snapshot = response.payload(&self.fetch)?;

        let data = match item.data() {
            Some(existing) => apply_snapshot(&existing, &snapshot)?,
            None => self.model.create(&snapshot, &self.context())?,
        };
        item.set_data(data);
        Ok(())
    }

    fn register_fetched(&self, item: &Arc<StoreItem>) {
        let registered = self.items.insert_if_absent(item.id(), Arc::clone(item));
        if Arc::ptr_eq(&registered, item) {
            info!(store = %self.name(), id = %item.id(), "fetched document");
        } else {
            debug!(store = %self.name(), id = %item.id(), "document already registered; keeping existing item");
        }
    }

    fn context(&self) -> Context {
        Context::new(DomainContext::new(self.binding.weak(), self.name()))
    }
}

impl Store for MutableStore {
    fn name(&self) -> &str {
        self.model.name()
    }

    fn mutability(&self) -> MutabilityType {
        MutabilityType::Mutable
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
        self.binding.bind(self.model.name(), domain);
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::network::NetworkStatus;
    use crate::remote::RemoteResponse;
    use crate::testing::MockClient;
    use tandem_model::types::{self, prop};
    use tandem_vcs::HEAD;

    const FETCH: &str = "query pricer($id: ID!) { pricer(id: $id) { state } }";
    const CREATE: &str = "mutation createPricer($input: CreatePricerInput!) { createPricer(input: $input) { pricer } }";

    fn pricer_type() -> ModelType {
        types::model(
            "Pricer",
            [
                ("id", prop(types::string())),
                ("name", prop(types::string())),
                ("margin", prop(types::number())),
            ],
        )
    }

    fn setup(client: MockClient, config: StoreConfig) -> (Arc<Domain>, Arc<MutableStore>, Arc<MockClient>) {
        let store = Arc::new(MutableStore::new(
            pricer_type(),
            Operation::new(FETCH, "state").unwrap(),
            Operation::new(CREATE, "pricer").unwrap(),
        ));
        let client = Arc::new(client);
        let domain = Domain::new(client.clone(), config, vec![store.clone() as Arc<dyn Store>]);
        (domain, store, client)
    }

    /// Confirms a create by echoing back the head snapshot of the sent repo.
    fn echo_create(request: &RemoteRequest) -> StoreResult<RemoteResponse> {
        let text = request.variables["input"]["repo"].as_str().unwrap_or_default();
        let repo: Value = serde_json::from_str(text)?;
        let head = &repo["commits"][0]["snapshot"]["snapshot"];
        Ok(RemoteResponse::with_data(
            json!({ "createPricer": { "pricer": head.to_string() } }),
        ))
    }

    fn fetched(state: Value) -> RemoteResponse {
        RemoteResponse::with_data(json!({ "pricer": { "state": state.to_string() } }))
    }

    #[tokio::test]
    async fn create_is_available_before_confirmation() {
        let (_domain, store, client) = setup(
            MockClient::gated().on_mutate(echo_create),
            StoreConfig::default(),
        );
        let (item, task) = store.create(&json!({ "name": "x" })).unwrap();

        assert!(store.has(item.id()));
        let data = item.data().unwrap();
        assert_eq!(data.get_str("name").unwrap().as_deref(), Some("x"));
        assert_eq!(data.get_str("id").unwrap().as_deref(), Some(item.id()));

        let repo = item.repo();
        assert_eq!(repo.commits().len(), 1);
        assert_eq!(repo.commits()[0].created_by(), "local");
        assert_eq!(
            repo.commits()[0].snapshot().payload(),
            &json!({ "id": item.id(), "name": "x", "__typename": "Pricer" })
        );
        assert_eq!(repo.branches().len(), 1);
        assert_eq!(repo.branches()[0].name(), HEAD);
        assert_eq!(repo.branches()[0].head(), repo.commits()[0].id());

        client.wait_for_calls(1).await;
        assert_eq!(item.network().status(), NetworkStatus::Pending);
        assert_eq!(store.counts().creating, 1);

        client.release(1);
        task.await.unwrap().unwrap();
        assert_eq!(item.network().status(), NetworkStatus::Static);
        assert_eq!(store.counts(), Counts::default());
        assert!(ModelRef::ptr_eq(&item.data().unwrap(), &data));
    }

    #[tokio::test]
    async fn create_sends_serialized_repo() {
        let (_domain, store, client) = setup(
            MockClient::new().on_mutate(echo_create),
            StoreConfig::default(),
        );
        let (item, task) = store.create(&json!({ "name": "x" })).unwrap();
        task.await.unwrap().unwrap();

        let requests = client.mutations();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].document, CREATE);
        let sent = requests[0].variables["input"]["repo"].as_str().unwrap();
        let repo = Repo::from_record(tandem_vcs::RepoRecord::from_json(sent).unwrap()).unwrap();
        assert_eq!(repo.id(), item.id());
        assert_eq!(repo, item.repo());
    }

    #[tokio::test]
    async fn confirmation_reconciles_in_place() {
        let (_domain, store, _client) = setup(
            MockClient::new().on_mutate(|request| {
                let text = request.variables["input"]["repo"].as_str().unwrap_or_default();
                let repo: Value = serde_json::from_str(text)?;
                let id = repo["id"].clone();
                Ok(RemoteResponse::with_data(json!({
                    "createPricer": { "pricer": { "id": id, "name": "confirmed", "margin": 5 } }
                })))
            }),
            StoreConfig::default(),
        );
        let (item, task) = store.create(&json!({ "name": "draft" })).unwrap();
        let data = item.data().unwrap();
        task.await.unwrap().unwrap();

        assert!(ModelRef::ptr_eq(&item.data().unwrap(), &data));
        assert_eq!(data.get_str("name").unwrap().as_deref(), Some("confirmed"));
        assert_eq!(data.get("margin").unwrap().unwrap().as_i64(), Some(5));
    }

    #[tokio::test]
    async fn rejected_create_keeps_local_item() {
        let (_domain, store, _client) = setup(
            MockClient::new().on_mutate(|_| Ok(RemoteResponse::with_errors(["duplicate id"]))),
            StoreConfig::default(),
        );
        let (item, task) = store.create(&json!({ "name": "x" })).unwrap();
        let err = task.await.unwrap().unwrap_err();
        match err {
            StoreError::RemoteRejected { operation, errors } => {
                assert_eq!(operation, "createPricer");
                assert_eq!(errors, vec!["duplicate id"]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(store.has(item.id()));
        assert_eq!(item.network().status(), NetworkStatus::Static);
        assert_eq!(store.counts().creating, 0);
    }

    #[tokio::test]
    async fn empty_create_response() {
        let (_domain, store, _client) = setup(
            MockClient::new().on_mutate(|_| Ok(RemoteResponse::default())),
            StoreConfig::default(),
        );
        let (_item, task) = store.create(&json!({})).unwrap();
        assert!(matches!(
            task.await.unwrap().unwrap_err(),
            StoreError::RemoteEmpty { .. }
        ));
    }

    #[tokio::test]
    async fn transport_failure_resets_network_state() {
        let (_domain, store, _client) = setup(
            MockClient::new().on_mutate(|_| Err(StoreError::Transport("connection refused".into()))),
            StoreConfig::default(),
        );
        let (item, task) = store.create(&json!({})).unwrap();
        assert!(matches!(
            task.await.unwrap().unwrap_err(),
            StoreError::Transport(_)
        ));
        assert_eq!(item.network().action(), NetworkAction::None);
    }

    #[tokio::test]
    async fn create_rejects_non_object_graph() {
        let (_domain, store, _client) = setup(MockClient::new(), StoreConfig::default());
        assert!(matches!(store.create(&json!([1])), Err(StoreError::Model(_))));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn configured_author_is_recorded() {
        let config = StoreConfig {
            author: "briedel".into(),
            ..StoreConfig::default()
        };
        let (_domain, store, _client) = setup(MockClient::new().on_mutate(echo_create), config);
        let (item, _task) = store.create(&json!({})).unwrap();
        assert_eq!(item.repo().commits()[0].created_by(), "briedel");
    }

    #[tokio::test]
    async fn store_instances_carry_domain_context() {
        let (domain, store, _client) = setup(MockClient::new().on_mutate(echo_create), StoreConfig::default());
        let (item, _task) = store.create(&json!({})).unwrap();
        let data = item.data().unwrap();
        let context = data.context().get::<DomainContext>().unwrap();
        assert_eq!(context.store(), "Pricer");
        assert!(Arc::ptr_eq(&context.domain().unwrap(), &domain));
    }

    #[tokio::test]
    async fn get_returns_placeholder_then_fetched_data() {
        let (_domain, store, client) = setup(
            MockClient::gated().on_query(|_| Ok(fetched(json!({ "id": "p1", "name": "remote" })))),
            StoreConfig::default(),
        );
        let (item, task) = store.get("p1").unwrap();
        let task = task.unwrap();

        assert!(item.data().is_none());
        assert!(!store.has("p1"));
        assert_eq!(item.repo().commits()[0].snapshot().payload(), &json!({}));

        client.wait_for_calls(1).await;
        assert_eq!(item.network().action(), NetworkAction::Loading);
        assert_eq!(store.counts().loading, 1);

        client.release(1);
        task.await.unwrap().unwrap();
        let data = item.data().unwrap();
        assert_eq!(data.get_str("name").unwrap().as_deref(), Some("remote"));
        assert!(Arc::ptr_eq(&store.item("p1").unwrap(), &item));
        assert_eq!(client.queries()[0].variables, json!({ "id": "p1" }));

        let (again, task) = store.get("p1").unwrap();
        assert!(Arc::ptr_eq(&again, &item));
        assert!(task.is_none());
        assert_eq!(client.query_count(), 1);
    }

    #[tokio::test]
    async fn concurrent_gets_fetch_twice_by_default() {
        let (_domain, store, client) = setup(
            MockClient::gated().on_query(|_| Ok(fetched(json!({ "id": "p1" })))),
            StoreConfig::default(),
        );
        let (first, first_task) = store.get("p1").unwrap();
        let (second, second_task) = store.get("p1").unwrap();
        assert!(!Arc::ptr_eq(&first, &second));

        client.wait_for_calls(2).await;
        assert_eq!(client.query_count(), 2);
        assert_eq!(store.counts().loading, 2);

        client.release(2);
        first_task.unwrap().await.unwrap().unwrap();
        second_task.unwrap().await.unwrap().unwrap();

        assert_eq!(store.len(), 1);
        let registered = store.item("p1").unwrap();
        assert!(Arc::ptr_eq(&registered, &first) || Arc::ptr_eq(&registered, &second));
    }

    #[tokio::test]
    async fn concurrent_gets_share_fetch_when_deduped() {
        let config = StoreConfig {
            dedupe_fetches: true,
            ..StoreConfig::default()
        };
        let (_domain, store, client) = setup(
            MockClient::gated().on_query(|_| Ok(fetched(json!({ "id": "p1" })))),
            config,
        );
        let (first, first_task) = store.get("p1").unwrap();
        let (second, second_task) = store.get("p1").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(second_task.is_none());

        client.release(1);
        first_task.unwrap().await.unwrap().unwrap();
        assert_eq!(client.query_count(), 1);
        assert!(Arc::ptr_eq(&store.item("p1").unwrap(), &first));
    }

    #[tokio::test]
    async fn failed_fetch_leaves_placeholder_unregistered() {
        let config = StoreConfig {
            dedupe_fetches: true,
            ..StoreConfig::default()
        };
        let (_domain, store, client) = setup(
            MockClient::new().on_query(|_| Ok(RemoteResponse::with_errors(["not found"]))),
            config,
        );
        let (item, task) = store.get("missing").unwrap();
        let err = task.unwrap().await.unwrap().unwrap_err();
        assert!(matches!(err, StoreError::RemoteRejected { .. }));
        assert!(item.data().is_none());
        assert!(!store.has("missing"));

        let (_retry, task) = store.get("missing").unwrap();
        assert!(task.is_some());
        task.unwrap().await.unwrap().unwrap_err();
        assert_eq!(client.query_count(), 2);
    }

    #[tokio::test]
    async fn failed_fetch_clears_outstanding_entry_before_returning() {
        let config = StoreConfig {
            dedupe_fetches: true,
            ..StoreConfig::default()
        };
        let (_domain, store, _client) = setup(
            MockClient::new().on_query(|_| Err(StoreError::Transport("reset".into()))),
            config,
        );
        let placeholder = Arc::new(StoreItem::new("p9", None, "local").unwrap());
        store
            .in_flight
            .lock()
            .unwrap()
            .insert("p9".to_string(), Arc::clone(&placeholder));

        let err = store.get_remote(&placeholder).await.unwrap_err();
        assert!(matches!(err, StoreError::Transport(_)));
        assert!(store.in_flight.lock().unwrap().is_empty());
        assert!(!store.has("p9"));
    }

    #[tokio::test]
    async fn fetched_item_is_registered_when_outstanding_entry_clears() {
        let config = StoreConfig {
            dedupe_fetches: true,
            ..StoreConfig::default()
        };
        let (_domain, store, _client) = setup(
            MockClient::new().on_query(|_| Ok(fetched(json!({ "id": "p8" })))),
            config,
        );
        let placeholder = Arc::new(StoreItem::new("p8", None, "local").unwrap());
        store
            .in_flight
            .lock()
            .unwrap()
            .insert("p8".to_string(), Arc::clone(&placeholder));

        store.get_remote(&placeholder).await.unwrap();
        assert!(store.in_flight.lock().unwrap().is_empty());
        let (item, task) = store.get("p8").unwrap();
        assert!(Arc::ptr_eq(&item, &placeholder));
        assert!(task.is_none());
    }

    #[tokio::test]
    async fn fetch_with_object_payload() {
        let (_domain, store, _client) = setup(
            MockClient::new().on_query(|_| {
                Ok(RemoteResponse::with_data(
                    json!({ "pricer": { "state": { "id": "p2", "margin": 3 } } }),
                ))
            }),
            StoreConfig::default(),
        );
        let (item, task) = store.get("p2").unwrap();
        task.unwrap().await.unwrap().unwrap();
        assert_eq!(item.data().unwrap().get("margin").unwrap().unwrap().as_i64(), Some(3));
    }

    #[tokio::test]
    async fn unregistered_store_cannot_create() {
        let store = Arc::new(MutableStore::new(
            pricer_type(),
            Operation::new(FETCH, "state").unwrap(),
            Operation::new(CREATE, "pricer").unwrap(),
        ));
        assert!(matches!(store.create(&json!({})), Err(StoreError::Unbound(_))));
        assert!(matches!(store.get("x"), Err(StoreError::Unbound(_))));
    }

    #[test]
    fn item_repo_can_be_committed() {
        let item = StoreItem::new("doc", None, "local").unwrap();
        item.with_repo(|repo| repo.commit(json!({ "v": 2 }), "local").map(|_| ()))
            .unwrap();
        let repo = item.repo();
        assert_eq!(repo.commits().len(), 2);
        assert_eq!(repo.commits()[1].parent(), Some(repo.commits()[0].id()));
    }
}
