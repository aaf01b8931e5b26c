use chrono::{DateTime, Utc};
use serde_json::Value;
use tandem_crypto::ChainVerifier;
use tandem_types::Digest;
use tracing::debug;

use crate::branch::{Branch, HEAD};
use crate::commit::Commit;
use crate::error::{VcsError, VcsResult};
use crate::record::RepoRecord;

/// History of one document: commits oldest first, plus named branches.
///
/// A repo is never empty. Construction performs exactly one commit followed
/// by exactly one `HEAD` branch pointing at it, and commits are only ever
/// appended.
#[derive(Clone, Debug, PartialEq)]
pub struct Repo {
    id: String,
    commits: Vec<Commit>,
    branches: Vec<Branch>,
}

impl Repo {
    /// Create a repo seeded with an initial snapshot.
    pub fn new(id: impl Into<String>, initial: Value, author: &str) -> VcsResult<Self> {
        let mut repo = Self {
            id: id.into(),
            commits: Vec::new(),
            branches: Vec::new(),
        };
        let head = repo.commit(initial, author)?.id();
        repo.create_branch(HEAD, head)?;
        Ok(repo)
    }

    /// Rebuild a repo from its wire form, verifying every snapshot id,
    /// every commit id, the parent chain, and every branch head.
    pub fn from_record(record: RepoRecord) -> VcsResult<Self> {
        if record.commits.is_empty() {
            return Err(VcsError::EmptyHistory { id: record.id });
        }
        let commits = record
            .commits
            .into_iter()
            .map(Commit::from_record)
            .collect::<VcsResult<Vec<_>>>()?;
        let branches = record
            .branches
            .into_iter()
            .map(Branch::from_record)
            .collect::<VcsResult<Vec<_>>>()?;
        let repo = Self {
            id: record.id,
            commits,
            branches,
        };
        repo.verify()?;
        Ok(repo)
    }

    /// Append a commit of `payload` authored by `author`.
    pub fn commit(&mut self, payload: Value, author: &str) -> VcsResult<&Commit> {
        self.commit_at(payload, author, Utc::now())
    }

    /// Append a commit with an explicit creation time.
    pub fn commit_at(
        &mut self,
        payload: Value,
        author: &str,
        created: DateTime<Utc>,
    ) -> VcsResult<&Commit> {
        let parent = self.commits.last().map(Commit::id);
        let commit = Commit::at(payload, parent, author, created)?;
        debug!(
            repo = %self.id,
            commit = %commit.id().short_hex(),
            seq = self.commits.len(),
            "appended commit"
        );
        self.commits.push(commit);
        Ok(&self.commits[self.commits.len() - 1])
    }

    /// Record a branch named `name` pointing at the commit `head`.
    pub fn create_branch(&mut self, name: &str, head: Digest) -> VcsResult<&Branch> {
        if self.commit_by_id(&head).is_none() {
            return Err(VcsError::UnknownCommit(head));
        }
        if self.branch(name).is_some() {
            return Err(VcsError::BranchExists {
                name: name.to_string(),
            });
        }
        let branch = Branch::new(name, head)?;
        debug!(repo = %self.id, branch = name, head = %head.short_hex(), "created branch");
        self.branches.push(branch);
        Ok(&self.branches[self.branches.len() - 1])
    }

    /// Sync hook for sending history to a remote. Not wired to any protocol.
    pub fn push(&self) {
        debug!(repo = %self.id, "push requested; remote sync is not implemented");
    }

    /// Sync hook for receiving history from a remote. Not wired to any protocol.
    pub fn pull(&mut self) {
        debug!(repo = %self.id, "pull requested; remote sync is not implemented");
    }

    /// Check chain integrity and that every branch names a known commit.
    pub fn verify(&self) -> VcsResult<()> {
        ChainVerifier::verify_chain(&self.commits)?;
        for branch in &self.branches {
            if self.commit_by_id(&branch.head()).is_none() {
                return Err(VcsError::UnknownCommit(branch.head()));
            }
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// All commits, oldest first.
    pub fn commits(&self) -> &[Commit] {
        &self.commits
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn branch(&self, name: &str) -> Option<&Branch> {
        self.branches.iter().find(|b| b.name() == name)
    }

    pub fn commit_by_id(&self, id: &Digest) -> Option<&Commit> {
        self.commits.iter().find(|c| c.id() == *id)
    }

    /// The commit the `HEAD` branch points at.
    pub fn head(&self) -> VcsResult<&Commit> {
        let branch = self.branch(HEAD).ok_or_else(|| VcsError::BranchNotFound {
            name: HEAD.to_string(),
        })?;
        self.commit_by_id(&branch.head())
            .ok_or(VcsError::UnknownCommit(branch.head()))
    }

    /// The most recently appended commit.
    pub fn latest(&self) -> Option<&Commit> {
        self.commits.last()
    }

    /// Commits newest first.
    pub fn log(&self) -> impl Iterator<Item = &Commit> {
        self.commits.iter().rev()
    }

    pub fn serialize(&self) -> RepoRecord {
        RepoRecord {
            id: self.id.clone(),
            commits: self.commits.iter().map(Commit::serialize).collect(),
            branches: self.branches.iter().map(Branch::serialize).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;
    use tandem_crypto::ChainError;

    #[test]
    fn construction_yields_one_commit_and_head() {
        let repo = Repo::new("doc-1", json!({"name": "x"}), "alice").unwrap();
        assert_eq!(repo.commits().len(), 1);
        assert_eq!(repo.branches().len(), 1);
        let head = &repo.branches()[0];
        assert_eq!(head.name(), "HEAD");
        assert_eq!(head.head(), repo.commits()[0].id());
        assert_eq!(repo.commits()[0].snapshot().payload(), &json!({"name": "x"}));
        assert!(repo.commits()[0].parent().is_none());
    }

    #[test]
    fn commits_link_to_previous() {
        let mut repo = Repo::new("doc-1", json!({"v": 1}), "alice").unwrap();
        repo.commit(json!({"v": 2}), "alice").unwrap();
        let commits = repo.commits();
        assert!(commits[0].parent().is_none());
        assert_eq!(commits[1].parent(), Some(commits[0].id()));
    }

    #[test]
    fn head_does_not_advance_on_commit() {
        let mut repo = Repo::new("doc-1", json!({"v": 1}), "alice").unwrap();
        let first = repo.commits()[0].id();
        repo.commit(json!({"v": 2}), "alice").unwrap();
        assert_eq!(repo.head().unwrap().id(), first);
        assert_ne!(repo.latest().unwrap().id(), first);
    }

    #[test]
    fn create_branch_rejects_unknown_commit() {
        let mut repo = Repo::new("doc-1", json!({}), "alice").unwrap();
        let err = repo
            .create_branch("feature", Digest::from_hash([9; 32]))
            .unwrap_err();
        assert!(matches!(err, VcsError::UnknownCommit(_)));
    }

    #[test]
    fn create_branch_rejects_duplicate() {
        let mut repo = Repo::new("doc-1", json!({}), "alice").unwrap();
        let head = repo.head().unwrap().id();
        let err = repo.create_branch(HEAD, head).unwrap_err();
        assert!(matches!(err, VcsError::BranchExists { .. }));
    }

    #[test]
    fn created_branch_has_empty_history() {
        let mut repo = Repo::new("doc-1", json!({}), "alice").unwrap();
        repo.commit(json!({"v": 2}), "alice").unwrap();
        let latest = repo.latest().unwrap().id();
        let branch = repo.create_branch("draft", latest).unwrap();
        assert!(branch.history().is_empty());
    }

    #[test]
    fn push_and_pull_leave_history_alone() {
        let mut repo = Repo::new("doc-1", json!({}), "alice").unwrap();
        let before = repo.clone();
        repo.push();
        repo.pull();
        assert_eq!(repo, before);
    }

    #[test]
    fn log_is_newest_first() {
        let mut repo = Repo::new("doc-1", json!({"v": 1}), "alice").unwrap();
        repo.commit(json!({"v": 2}), "bob").unwrap();
        let authors: Vec<&str> = repo.log().map(Commit::created_by).collect();
        assert_eq!(authors, vec!["bob", "alice"]);
    }

    #[test]
    fn serialize_shape() {
        let repo = Repo::new("doc-1", json!({"name": "x"}), "alice").unwrap();
        let value = serde_json::to_value(repo.serialize()).unwrap();
        assert_eq!(value["id"], json!("doc-1"));
        assert_eq!(value["commits"].as_array().unwrap().len(), 1);
        assert_eq!(value["commits"][0]["snapshot"]["snapshot"], json!({"name": "x"}));
        assert_eq!(value["branches"][0]["id"], json!("HEAD"));
        assert_eq!(value["branches"][0]["head"], value["commits"][0]["id"]);
    }

    #[test]
    fn record_roundtrip_through_json_text() {
        let mut repo = Repo::new("doc-1", json!({"v": 1}), "alice").unwrap();
        repo.commit(json!({"v": 2}), "alice").unwrap();
        let text = repo.serialize().to_json().unwrap();
        let rebuilt = Repo::from_record(RepoRecord::from_json(&text).unwrap()).unwrap();
        assert_eq!(rebuilt, repo);
    }

    #[test]
    fn from_record_rejects_reordered_commits() {
        let mut repo = Repo::new("doc-1", json!({"v": 1}), "alice").unwrap();
        repo.commit(json!({"v": 2}), "alice").unwrap();
        let mut record = repo.serialize();
        record.commits.reverse();
        let err = Repo::from_record(record).unwrap_err();
        assert!(matches!(err, VcsError::Chain(ChainError::GenesisHasParent)));
    }

    #[test]
    fn from_record_rejects_dangling_branch() {
        let repo = Repo::new("doc-1", json!({}), "alice").unwrap();
        let mut record = repo.serialize();
        record.branches[0].head = Digest::from_hash([3; 32]);
        assert!(matches!(
            Repo::from_record(record),
            Err(VcsError::UnknownCommit(_))
        ));
    }

    #[test]
    fn from_record_rejects_empty_history() {
        let record = RepoRecord {
            id: "doc-1".into(),
            commits: vec![],
            branches: vec![],
        };
        assert!(matches!(
            Repo::from_record(record),
            Err(VcsError::EmptyHistory { .. })
        ));
    }

    proptest! {
        #[test]
        fn chain_integrity_holds(values in proptest::collection::vec(any::<i64>(), 1..12)) {
            let mut repo = Repo::new("doc", json!({"v": values[0]}), "alice").unwrap();
            for v in &values[1..] {
                repo.commit(json!({"v": v}), "alice").unwrap();
            }
            let commits = repo.commits();
            prop_assert!(commits[0].parent().is_none());
            for i in 1..commits.len() {
                prop_assert_eq!(commits[i].parent(), Some(commits[i - 1].id()));
            }
            prop_assert!(repo.verify().is_ok());
        }
    }
}
