use tandem_types::Digest;

use crate::error::{VcsError, VcsResult};
use crate::record::BranchRecord;

/// Name of the branch every repo is created with.
pub const HEAD: &str = "HEAD";

/// Characters that are forbidden anywhere in a branch name.
const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', '~', '^', ':', '?', '*', '[', '\\'];

/// Named pointer into a repo's history.
///
/// `history` is part of the wire shape but nothing records ancestors into it
/// yet; it stays empty for every branch this crate creates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Branch {
    name: String,
    head: Digest,
    history: Vec<Digest>,
}

impl Branch {
    pub fn new(name: impl Into<String>, head: Digest) -> VcsResult<Self> {
        let name = name.into();
        validate_branch_name(&name)?;
        Ok(Self {
            name,
            head,
            history: Vec::new(),
        })
    }

    pub fn from_record(record: BranchRecord) -> VcsResult<Self> {
        validate_branch_name(&record.id)?;
        Ok(Self {
            name: record.id,
            head: record.head,
            history: record.history,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Id of the commit this branch points at.
    pub fn head(&self) -> Digest {
        self.head
    }

    pub fn history(&self) -> &[Digest] {
        &self.history
    }

    pub fn serialize(&self) -> BranchRecord {
        BranchRecord {
            id: self.name.clone(),
            head: self.head,
            history: self.history.clone(),
        }
    }
}

/// Validate a branch name using git-style rules: non-empty, no whitespace
/// or `~^:?*[\`, no `..`, and no leading or trailing `.` or `/`.
pub fn validate_branch_name(name: &str) -> VcsResult<()> {
    let reject = |reason: String| {
        Err(VcsError::InvalidBranchName {
            name: name.to_string(),
            reason,
        })
    };

    if name.is_empty() {
        return reject("branch name must not be empty".into());
    }
    if let Some(ch) = FORBIDDEN_CHARS.iter().find(|ch| name.contains(**ch)) {
        return reject(format!("contains forbidden character: {ch:?}"));
    }
    if name.contains("..") {
        return reject("must not contain '..'".into());
    }
    if name.starts_with('.') || name.ends_with('.') {
        return reject("must not start or end with '.'".into());
    }
    if name.starts_with('/') || name.ends_with('/') {
        return reject("must not start or end with '/'".into());
    }
    Ok(())
}
