use serde_json::Value;
use tandem_crypto::ContentHasher;
use tandem_types::Digest;

use crate::error::{VcsError, VcsResult};
use crate::record::SnapshotRecord;

/// Immutable, content-addressed wrapper around a document payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    id: Digest,
    payload: Value,
}

impl Snapshot {
    /// Wrap a payload, computing its digest.
    pub fn new(payload: Value) -> VcsResult<Self> {
        let id = ContentHasher::digest_json(&payload)?;
        Ok(Self { id, payload })
    }

    /// Rebuild a snapshot from its record, checking the recorded id.
    pub fn from_record(record: SnapshotRecord) -> VcsResult<Self> {
        let snapshot = Self::new(record.snapshot)?;
        if snapshot.id != record.id {
            return Err(VcsError::SnapshotMismatch {
                recorded: record.id,
                computed: snapshot.id,
            });
        }
        Ok(snapshot)
    }

    pub fn id(&self) -> Digest {
        self.id
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn into_payload(self) -> Value {
        self.payload
    }

    pub fn serialize(&self) -> SnapshotRecord {
        SnapshotRecord {
            id: self.id,
            snapshot: self.payload.clone(),
        }
    }
}
