//! Scripted in-memory [`RemoteClient`] for tests.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::{watch, Semaphore};

use crate::error::{StoreError, StoreResult};
use crate::remote::{RemoteClient, RemoteRequest, RemoteResponse};

type Handler = Box<dyn Fn(&RemoteRequest) -> StoreResult<RemoteResponse> + Send + Sync>;

/// Answers queries and mutations with caller-supplied handlers and records
/// every request.
///
/// A gated client holds each call after recording it until [`release`]
/// admits it, so tests can observe state while a request is outstanding.
///
/// [`release`]: MockClient::release
pub struct MockClient {
    on_query: Option<Handler>,
    on_mutate: Option<Handler>,
    queries: Mutex<Vec<RemoteRequest>>,
    mutations: Mutex<Vec<RemoteRequest>>,
    calls: watch::Sender<usize>,
    gate: Option<Semaphore>,
}

impl Default for MockClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            on_query: None,
            on_mutate: None,
            queries: Mutex::new(Vec::new()),
            mutations: Mutex::new(Vec::new()),
            calls: watch::Sender::new(0),
            gate: None,
        }
    }

    /// A client whose calls wait for [`MockClient::release`].
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub fn on_query<F>(mut self, handler: F) -> Self
    where
        F: Fn(&RemoteRequest) -> StoreResult<RemoteResponse> + Send + Sync + 'static,
    {
        self.on_query = Some(Box::new(handler));
        self
    }

    pub fn on_mutate<F>(mut self, handler: F) -> Self
    where
        F: Fn(&RemoteRequest) -> StoreResult<RemoteResponse> + Send + Sync + 'static,
    {
        self.on_mutate = Some(Box::new(handler));
        self
    }

    /// Let `n` held calls proceed. No-op on an ungated client.
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Wait until at least `n` calls have been received.
    pub async fn wait_for_calls(&self, n: usize) {
        let mut calls = self.calls.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = calls.wait_for(|count| *count >= n).await;
    }

    pub fn queries(&self) -> Vec<RemoteRequest> {
        self.queries.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn mutations(&self) -> Vec<RemoteRequest> {
        self.mutations.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn mutation_count(&self) -> usize {
        self.mutations.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    async fn call(
        &self,
        kind: &str,
        log: &Mutex<Vec<RemoteRequest>>,
        handler: Option<&Handler>,
        request: RemoteRequest,
    ) -> StoreResult<RemoteResponse> {
        log.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        self.calls.send_modify(|count| *count += 1);
        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|e| StoreError::Transport(e.to_string()))?
                .forget();
        }
        match handler {
            Some(handler) => handler(&request),
            None => Err(StoreError::Transport(format!("no {kind} response scripted"))),
        }
    }
}

#[async_trait]
impl RemoteClient for MockClient {
    async fn query(&self, request: RemoteRequest) -> StoreResult<RemoteResponse> {
        self.call("query", &self.queries, self.on_query.as_ref(), request).await
    }

    async fn mutate(&self, request: RemoteRequest) -> StoreResult<RemoteResponse> {
        self.call("mutation", &self.mutations, self.on_mutate.as_ref(), request).await
    }
}
