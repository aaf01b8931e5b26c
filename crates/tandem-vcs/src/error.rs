//! Error types for history operations.

use tandem_crypto::{ChainError, HasherError};
use tandem_types::{Digest, TypeError};
use thiserror::Error;

/// Errors that can occur while building, reading or verifying history.
#[derive(Debug, Error)]
pub enum VcsError {
    /// A payload could not be encoded for hashing.
    #[error("hashing failed: {0}")]
    Hashing(#[from] HasherError),

    /// A snapshot's recorded id does not match its payload.
    #[error("snapshot id mismatch: recorded {recorded}, computed {computed}")]
    SnapshotMismatch { recorded: Digest, computed: Digest },

    /// A commit's recorded id does not match its contents.
    #[error("commit id mismatch: recorded {recorded}, computed {computed}")]
    CommitMismatch { recorded: Digest, computed: Digest },

    /// The commit chain is not a valid singly-linked history.
    #[error("commit chain invalid: {0}")]
    Chain(#[from] ChainError),

    /// A commit referenced by a branch is not in the repo.
    #[error("unknown commit: {0}")]
    UnknownCommit(Digest),

    /// The branch was not found.
    #[error("branch not found: {name}")]
    BranchNotFound { name: String },

    /// A branch with this name already exists.
    #[error("branch already exists: {name}")]
    BranchExists { name: String },

    /// The branch name is invalid.
    #[error("invalid branch name: {name}: {reason}")]
    InvalidBranchName { name: String, reason: String },

    /// A record carries no commits, so it cannot be a repo.
    #[error("repo {id} has no commits")]
    EmptyHistory { id: String },

    /// A timestamp in a record could not be parsed.
    #[error("invalid timestamp {value}: {reason}")]
    InvalidTimestamp { value: String, reason: String },

    /// A digest in a record could not be parsed.
    #[error("invalid digest: {0}")]
    Digest(#[from] TypeError),

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for history operations.
pub type VcsResult<T> = std::result::Result<T, VcsError>;
