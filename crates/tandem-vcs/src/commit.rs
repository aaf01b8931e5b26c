use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::Serialize;
use serde_json::Value;
use tandem_crypto::{ContentHasher, HashLinked, HasherError};
use tandem_types::Digest;

use crate::error::{VcsError, VcsResult};
use crate::record::CommitRecord;
use crate::snapshot::Snapshot;

/// Fields covered by a commit id, in encoding order.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CommitDigestInput<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<Digest>,
    created_by: &'a str,
    created: &'a str,
    snapshot: &'a Value,
}

/// Immutable history entry.
///
/// The id is the digest of `{parent, createdBy, created, snapshot}`, so two
/// commits of the same payload made at different times have different ids.
/// Only the nested [`Snapshot`] id is a pure content address.
#[derive(Clone, Debug, PartialEq)]
pub struct Commit {
    id: Digest,
    parent: Option<Digest>,
    created_by: String,
    created: DateTime<Utc>,
    snapshot: Snapshot,
}

impl Commit {
    /// Create a commit stamped with the current time.
    pub fn new(
        payload: Value,
        parent: Option<Digest>,
        created_by: impl Into<String>,
    ) -> VcsResult<Self> {
        Self::at(payload, parent, created_by, Utc::now())
    }

    /// Create a commit with an explicit creation time.
    ///
    /// The time is truncated to milliseconds, the precision of the
    /// serialized form.
    pub fn at(
        payload: Value,
        parent: Option<Digest>,
        created_by: impl Into<String>,
        created: DateTime<Utc>,
    ) -> VcsResult<Self> {
        let created_by = created_by.into();
        let created = created.trunc_subsecs(3);
        let id = Self::compute_id(parent, &created_by, &created, &payload)?;
        let snapshot = Snapshot::new(payload)?;
        Ok(Self {
            id,
            parent,
            created_by,
            created,
            snapshot,
        })
    }

    /// Digest of the fields a commit id covers.
    pub fn compute_id(
        parent: Option<Digest>,
        created_by: &str,
        created: &DateTime<Utc>,
        payload: &Value,
    ) -> Result<Digest, HasherError> {
        let created = format_timestamp(created);
        ContentHasher::digest_json(&CommitDigestInput {
            parent,
            created_by,
            created: &created,
            snapshot: payload,
        })
    }

    /// Rebuild a commit from its record, checking both the snapshot id and
    /// the commit id.
    pub fn from_record(record: CommitRecord) -> VcsResult<Self> {
        let created = parse_timestamp(&record.created)?;
        let snapshot = Snapshot::from_record(record.snapshot)?;
        let computed =
            Self::compute_id(record.parent, &record.created_by, &created, snapshot.payload())?;
        if computed != record.id {
            return Err(VcsError::CommitMismatch {
                recorded: record.id,
                computed,
            });
        }
        Ok(Self {
            id: record.id,
            parent: record.parent,
            created_by: record.created_by,
            created,
            snapshot,
        })
    }

    pub fn id(&self) -> Digest {
        self.id
    }

    pub fn parent(&self) -> Option<Digest> {
        self.parent
    }

    pub fn created_by(&self) -> &str {
        &self.created_by
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn serialize(&self) -> CommitRecord {
        CommitRecord {
            id: self.id,
            parent: self.parent,
            created_by: self.created_by.clone(),
            created: format_timestamp(&self.created),
            snapshot: self.snapshot.serialize(),
        }
    }
}

impl HashLinked for Commit {
    fn link_id(&self) -> Digest {
        self.id
    }

    fn parent_id(&self) -> Option<Digest> {
        self.parent
    }

    fn recompute_id(&self) -> Result<Digest, HasherError> {
        Self::compute_id(
            self.parent,
            &self.created_by,
            &self.created,
            self.snapshot.payload(),
        )
    }
}

/// ISO-8601 in UTC with millisecond precision, e.g. `2024-01-02T03:04:05.006Z`.
pub(crate) fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn parse_timestamp(value: &str) -> VcsResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| VcsError::InvalidTimestamp {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap() + chrono::Duration::milliseconds(6)
    }

    #[test]
    fn id_covers_ordered_fields() {
        let commit = Commit::at(json!({"v": 1}), None, "alice", fixed_time()).unwrap();
        let expected = ContentHasher::digest_str(
            r#"{"createdBy":"alice","created":"2024-01-02T03:04:05.006Z","snapshot":{"v":1}}"#,
        );
        assert_eq!(commit.id(), expected);
    }

    #[test]
    fn parent_participates_in_id() {
        let first = Commit::at(json!({"v": 1}), None, "alice", fixed_time()).unwrap();
        let second =
            Commit::at(json!({"v": 1}), Some(first.id()), "alice", fixed_time()).unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(first.snapshot().id(), second.snapshot().id());
    }

    #[test]
    fn timestamp_participates_in_id() {
        let a = Commit::at(json!({"v": 1}), None, "alice", fixed_time()).unwrap();
        let later = fixed_time() + chrono::Duration::milliseconds(1);
        let b = Commit::at(json!({"v": 1}), None, "alice", later).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a.snapshot().id(), b.snapshot().id());
    }

    #[test]
    fn created_is_truncated_to_millis() {
        let precise = fixed_time() + chrono::Duration::nanoseconds(123_456);
        let commit = Commit::at(json!(1), None, "alice", precise).unwrap();
        assert_eq!(commit.created(), fixed_time());
    }

    #[test]
    fn serialize_shape() {
        let commit = Commit::at(json!({"v": 1}), None, "alice", fixed_time()).unwrap();
        let value = serde_json::to_value(commit.serialize()).unwrap();
        assert_eq!(
            value,
            json!({
                "id": commit.id().to_hex(),
                "createdBy": "alice",
                "created": "2024-01-02T03:04:05.006Z",
                "snapshot": {"id": commit.snapshot().id().to_hex(), "snapshot": {"v": 1}},
            })
        );
    }

    #[test]
    fn record_roundtrip_verifies() {
        let commit = Commit::new(json!({"name": "x"}), None, "alice").unwrap();
        let rebuilt = Commit::from_record(commit.serialize()).unwrap();
        assert_eq!(rebuilt, commit);
    }

    #[test]
    fn from_record_rejects_forged_author() {
        let mut record = Commit::new(json!({"name": "x"}), None, "alice")
            .unwrap()
            .serialize();
        record.created_by = "mallory".into();
        assert!(matches!(
            Commit::from_record(record),
            Err(VcsError::CommitMismatch { .. })
        ));
    }

    #[test]
    fn from_record_rejects_bad_timestamp() {
        let mut record = Commit::new(json!(1), None, "alice").unwrap().serialize();
        record.created = "yesterday".into();
        assert!(matches!(
            Commit::from_record(record),
            Err(VcsError::InvalidTimestamp { .. })
        ));
    }

    #[test]
    fn recompute_matches_link_id() {
        let commit = Commit::new(json!({"a": [1, 2]}), None, "bob").unwrap();
        assert_eq!(commit.recompute_id().unwrap(), commit.link_id());
    }
}
