//! Serialized shapes of history objects.
//!
//! Field names and nesting are the compatibility contract with remote
//! peers; do not rename them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tandem_types::Digest;

/// `{ id, snapshot }`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRecord {
    pub id: Digest,
    pub snapshot: Value,
}

/// `{ id, parent?, createdBy, created, snapshot }`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRecord {
    pub id: Digest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<Digest>,
    pub created_by: String,
    /// ISO-8601 UTC timestamp with millisecond precision.
    pub created: String,
    pub snapshot: SnapshotRecord,
}

/// `{ id, head, history }`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BranchRecord {
    pub id: String,
    pub head: Digest,
    #[serde(default)]
    pub history: Vec<Digest>,
}

/// `{ id, commits, branches }`, commits oldest first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RepoRecord {
    pub id: String,
    pub commits: Vec<CommitRecord>,
    pub branches: Vec<BranchRecord>,
}

impl RepoRecord {
    /// Parse a record from its JSON text.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    /// Compact JSON text of the record.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
