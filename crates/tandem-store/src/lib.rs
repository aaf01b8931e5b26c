//! Store orchestration for Tandem documents.
//!
//! A [`Domain`] groups the remote client, the [`StoreConfig`] and every
//! store of an application. A [`MutableStore`] pairs each document id with a
//! version-controlled [`Repo`](tandem_vcs::Repo) and a live instance of its
//! model:
//!
//! - `create` builds both locally, returns them immediately and sends the
//!   repo to the remote service in the background; the confirmed snapshot is
//!   reconciled onto the same instance.
//! - `get` returns a placeholder for an unknown id and fills it in once the
//!   fetch returns.
//!
//! Immutable and creatable stores are plain registries of ids.

pub mod base;
pub mod config;
pub mod creatable;
pub mod domain;
pub mod error;
pub mod immutable;
pub mod mutable;
pub mod network;
pub mod remote;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use base::{Entry, MutabilityType, Store};
pub use config::StoreConfig;
pub use creatable::CreatableStore;
pub use domain::{Domain, DomainContext};
pub use error::{StoreError, StoreResult};
pub use immutable::ImmutableStore;
pub use mutable::{MutableStore, StoreItem};
pub use network::{operation_root, Counts, NetworkAction, NetworkState, NetworkStatus, Operation};
pub use remote::{RemoteClient, RemoteErrorDetail, RemoteRequest, RemoteResponse};
