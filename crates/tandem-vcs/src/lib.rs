//! Version control for JSON documents.
//!
//! A [`Repo`] is the per-document history: an append-only list of
//! [`Commit`]s, each wrapping a content-addressed [`Snapshot`] of the
//! document, plus named [`Branch`] pointers into that list.
//!
//! # Architecture
//!
//! - **Snapshots** are immutable. Their id is the digest of the payload, so
//!   equal payloads share an id.
//! - **Commits** form a single parent chain (no merge commits). A commit id
//!   covers parent, author, creation time and payload, so it is not a pure
//!   content address of the document.
//! - **Branches** are named pointers. Every repo has a `HEAD` branch from the
//!   moment it is constructed.
//!
//! # Modules
//!
//! - [`error`]: Error types for history operations
//! - [`snapshot`]: [`Snapshot`]
//! - [`commit`]: [`Commit`]
//! - [`branch`]: [`Branch`] and name validation
//! - [`repo`]: [`Repo`]
//! - [`record`]: Wire/storage shapes of all of the above

pub mod branch;
pub mod commit;
pub mod error;
pub mod record;
pub mod repo;
pub mod snapshot;

pub use branch::{validate_branch_name, Branch, HEAD};
pub use commit::Commit;
pub use error::{VcsError, VcsResult};
pub use record::{BranchRecord, CommitRecord, RepoRecord, SnapshotRecord};
pub use repo::Repo;
pub use snapshot::Snapshot;
